//! Bounded breadth-first path search
//!
//! Expands the source level by level through the fetch cache. All distinct
//! terms of a level are fetched concurrently; bookkeeping between levels
//! is synchronous. A path is emitted whenever a hop reaches the target
//! with the queried relation, at every depth up to the bound.

mod arena;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::{StreamExt, stream};
use tracing::{debug, warn};

use crate::cache::FetchCache;
use crate::domain::{Edge, Path, RelationFilter, RelationType, Term};
use crate::error::{Error, FetchError, FetchResult, Result};
use arena::{NodeId, PathTree, TermId};

/// Default cap on fetches in flight for one level
pub const DEFAULT_MAX_CONCURRENT: usize = 16;

/// Edges fetched for one frontier term
struct Expansion {
    /// Edges carrying the queried relation
    matching: FetchResult<Arc<Vec<Edge>>>,
    /// Edges usable as intermediate hops (None at the last level)
    via: Option<FetchResult<Arc<Vec<Edge>>>>,
}

/// Finds justification paths between two terms
#[derive(Debug, Clone)]
pub struct PathExplorer<'c> {
    cache: &'c FetchCache,
    via: RelationFilter,
    max_concurrent: usize,
}

impl<'c> PathExplorer<'c> {
    pub fn new(cache: &'c FetchCache) -> Self {
        Self {
            cache,
            via: RelationFilter::any(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    /// Restrict the relation types allowed on intermediate hops
    pub fn with_via(mut self, via: RelationFilter) -> Self {
        self.via = via;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// All acyclic paths of at most `max_depth` hops from `source` whose
    /// last hop is `relation` into `target`
    ///
    /// Order is unspecified. A failed fetch for an intermediate term drops
    /// that branch; a failed fetch for `source` itself is fatal.
    pub async fn explore(
        &self,
        source: &Term,
        relation: &RelationType,
        target: &Term,
        max_depth: usize,
    ) -> Result<Vec<Path>> {
        if max_depth == 0 {
            return Err(Error::InvalidInput("max_depth must be at least 1".to_string()));
        }

        let matching_filter = RelationFilter::only([relation.clone()]);
        let mut tree = PathTree::new(source);
        let target_id = tree.intern(target);
        let mut frontier: Vec<NodeId> = vec![PathTree::ROOT];
        let mut paths = Vec::new();

        for depth in 1..=max_depth {
            if frontier.is_empty() {
                break;
            }

            let expand_further = depth < max_depth;
            let expansions = self
                .expand_level(&tree, &frontier, &matching_filter, expand_further)
                .await;

            if depth == 1 {
                check_source(source, expansions.get(&tree.term_of(PathTree::ROOT)))?;
            }

            let mut next = Vec::new();
            for &node in &frontier {
                let Some(expansion) = expansions.get(&tree.term_of(node)) else {
                    continue;
                };

                if let Ok(edges) = &expansion.matching {
                    for edge in unique(edges) {
                        if edge.target == *target && edge.relation == *relation {
                            let mut hops = tree.edges_to(node);
                            hops.push(edge.clone());
                            paths.push(Path::from_edges(hops)?);
                        }
                    }
                }

                if let Some(Ok(edges)) = &expansion.via {
                    for edge in unique(edges) {
                        if edge.is_loop() || !self.via.allows(&edge.relation) {
                            continue;
                        }
                        let next_term = tree.intern(&edge.target);
                        if next_term == target_id || tree.on_path(node, next_term) {
                            continue;
                        }
                        next.push(tree.extend(node, edge.clone()));
                    }
                }
            }

            debug!(
                depth,
                frontier = frontier.len(),
                next_frontier = next.len(),
                paths = paths.len(),
                "Explored level"
            );
            frontier = next;
        }

        debug!(
            source = %source,
            target = %target,
            nodes = tree.node_count(),
            terms = tree.term_count(),
            paths = paths.len(),
            "Exploration finished"
        );
        Ok(paths)
    }

    /// Fetch every distinct frontier term concurrently
    async fn expand_level(
        &self,
        tree: &PathTree,
        frontier: &[NodeId],
        matching_filter: &RelationFilter,
        expand_further: bool,
    ) -> HashMap<TermId, Expansion> {
        let mut seen = HashSet::new();
        let terms: Vec<(TermId, Term)> = frontier
            .iter()
            .map(|&node| tree.term_of(node))
            .filter(|id| seen.insert(*id))
            .map(|id| (id, tree.term(id).clone()))
            .collect();

        stream::iter(terms)
            .map(|(id, term)| async move {
                let matching = self.cache.get(&term, matching_filter);
                let expansion = if expand_further {
                    let (matching, via) =
                        futures_util::join!(matching, self.cache.get(&term, &self.via));
                    Expansion {
                        matching,
                        via: Some(via),
                    }
                } else {
                    Expansion {
                        matching: matching.await,
                        via: None,
                    }
                };
                log_branch_failures(&term, &expansion, id == tree.term_of(PathTree::ROOT));
                (id, expansion)
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await
    }
}

/// Edges of a fetch with duplicate (relation, target) pairs removed
fn unique(edges: &[Edge]) -> impl Iterator<Item = &Edge> {
    let mut seen = HashSet::new();
    edges
        .iter()
        .filter(move |e| seen.insert((&e.relation, &e.target)))
}

fn log_branch_failures(term: &Term, expansion: &Expansion, is_source: bool) {
    if is_source {
        return;
    }
    let failures = [Some(&expansion.matching), expansion.via.as_ref()];
    for result in failures.into_iter().flatten() {
        if let Err(e) = result {
            warn!(term = %term, error = %e, "Abandoning branch after fetch failure");
        }
    }
}

/// Failures fetching the literal source end the query
fn check_source(source: &Term, expansion: Option<&Expansion>) -> Result<()> {
    let Some(expansion) = expansion else {
        return Ok(());
    };
    let failures = [Some(&expansion.matching), expansion.via.as_ref()];
    for result in failures.into_iter().flatten() {
        match result {
            Err(FetchError::RemoteError { message, .. }) => {
                return Err(Error::InvalidQuery(format!(
                    "Source term '{}' rejected by the graph service: {}",
                    source, message
                )));
            }
            Err(e) => return Err(Error::Fetch(e.clone())),
            Ok(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{RelationFetcher, StaticGraph};
    use async_trait::async_trait;

    fn cache(edges: Vec<Edge>) -> FetchCache {
        FetchCache::new(Arc::new(StaticGraph::from_edges(edges)))
    }

    fn pizza_graph() -> Vec<Edge> {
        vec![
            Edge::new("pizza", "r_has_part", "topping", 0.8),
            Edge::new("topping", "r_has_part", "mozzarella", 0.6),
            Edge::new("pizza", "r_isa", "plat", 0.7),
            Edge::new("plat", "r_associated", "assiette", 0.4),
        ]
    }

    #[tokio::test]
    async fn test_two_hop_chain_found() {
        let cache = cache(pizza_graph());
        let paths = PathExplorer::new(&cache)
            .explore(
                &Term::new("pizza"),
                &RelationType::new("r_has_part"),
                &Term::new("mozzarella"),
                2,
            )
            .await
            .unwrap();

        assert_eq!(paths.len(), 1);
        assert_eq!(
            paths[0].to_string(),
            "pizza -r_has_part-> topping -r_has_part-> mozzarella"
        );
    }

    #[tokio::test]
    async fn test_all_depths_emitted() {
        let mut edges = pizza_graph();
        edges.push(Edge::new("pizza", "r_has_part", "mozzarella", 0.3));
        let cache = cache(edges);

        let mut paths = PathExplorer::new(&cache)
            .explore(
                &Term::new("pizza"),
                &RelationType::new("r_has_part"),
                &Term::new("mozzarella"),
                2,
            )
            .await
            .unwrap();
        paths.sort_by_key(Path::len);

        assert_eq!(paths.len(), 2);
        assert!(paths[0].is_direct());
        assert_eq!(paths[1].len(), 2);
    }

    #[tokio::test]
    async fn test_depth_bound_respected() {
        let cache = cache(vec![
            Edge::new("a", "r_isa", "b", 0.9),
            Edge::new("b", "r_isa", "c", 0.9),
            Edge::new("c", "r_isa", "d", 0.9),
        ]);
        let explorer = PathExplorer::new(&cache);
        let (a, rel, d) = (Term::new("a"), RelationType::new("r_isa"), Term::new("d"));

        assert!(explorer.explore(&a, &rel, &d, 2).await.unwrap().is_empty());
        let paths = explorer.explore(&a, &rel, &d, 3).await.unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths.iter().all(|p| p.len() <= 3));
    }

    #[tokio::test]
    async fn test_cycles_never_followed() {
        let cache = cache(vec![
            Edge::new("a", "r_syn", "b", 0.9),
            Edge::new("b", "r_syn", "a", 0.9),
            Edge::new("b", "r_syn", "b", 0.9),
            Edge::new("b", "r_isa", "c", 0.5),
            Edge::new("a", "r_isa", "c", 0.2),
        ]);

        let paths = PathExplorer::new(&cache)
            .explore(&Term::new("a"), &RelationType::new("r_isa"), &Term::new("c"), 4)
            .await
            .unwrap();

        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| !p.has_repeated_term()));
    }

    #[tokio::test]
    async fn test_via_filter_restricts_intermediate_hops() {
        let cache = cache(pizza_graph());
        let paths = PathExplorer::new(&cache)
            .with_via(RelationFilter::only(["r_isa"]))
            .explore(
                &Term::new("pizza"),
                &RelationType::new("r_has_part"),
                &Term::new("mozzarella"),
                2,
            )
            .await
            .unwrap();
        assert!(paths.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_source_is_invalid_query() {
        let cache = cache(pizza_graph());
        let err = PathExplorer::new(&cache)
            .explore(
                &Term::new("zzz"),
                &RelationType::new("r_isa"),
                &Term::new("pizza"),
                2,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_zero_depth_rejected() {
        let cache = cache(pizza_graph());
        let err = PathExplorer::new(&cache)
            .explore(&Term::new("pizza"), &RelationType::new("r_isa"), &Term::new("plat"), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    /// Static graph where one term is always unreachable
    struct Broken {
        graph: StaticGraph,
        broken: Term,
    }

    #[async_trait]
    impl RelationFetcher for Broken {
        async fn fetch(&self, term: &Term, filter: &RelationFilter) -> FetchResult<Vec<Edge>> {
            if term == &self.broken {
                return Err(FetchError::RemoteUnavailable("connection reset".to_string()));
            }
            self.graph.fetch(term, filter).await
        }
    }

    #[tokio::test]
    async fn test_mid_path_failure_abandons_branch() {
        let mut edges = pizza_graph();
        edges.push(Edge::new("pizza", "r_has_part", "fromage", 0.9));
        edges.push(Edge::new("fromage", "r_has_part", "mozzarella", 0.9));
        let cache = FetchCache::new(Arc::new(Broken {
            graph: StaticGraph::from_edges(edges),
            broken: Term::new("fromage"),
        }));

        let paths = PathExplorer::new(&cache)
            .explore(
                &Term::new("pizza"),
                &RelationType::new("r_has_part"),
                &Term::new("mozzarella"),
                2,
            )
            .await
            .unwrap();

        assert_eq!(paths.len(), 1);
        assert!(paths[0].via().any(|t| t.as_str() == "topping"));
    }

    #[tokio::test]
    async fn test_unavailable_source_is_fatal() {
        let cache = FetchCache::new(Arc::new(Broken {
            graph: StaticGraph::from_edges(pizza_graph()),
            broken: Term::new("pizza"),
        }));

        let err = PathExplorer::new(&cache)
            .explore(
                &Term::new("pizza"),
                &RelationType::new("r_has_part"),
                &Term::new("mozzarella"),
                2,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch(FetchError::RemoteUnavailable(_))));
    }
}
