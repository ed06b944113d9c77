//! In-memory relation graph
//!
//! Serves edges from a fixed edge list. Used for offline queries against a
//! graph file and as the remote stand-in in tests.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path as FsPath;

use async_trait::async_trait;

use super::RelationFetcher;
use crate::domain::{Direction, Edge, RelationFilter, RelationType, Term};
use crate::error::{Error, FetchError, FetchResult, Result};

/// Fixed graph answering fetches from memory
#[derive(Debug, Clone, Default)]
pub struct StaticGraph {
    outgoing: HashMap<Term, Vec<Edge>>,
    incoming: HashMap<Term, Vec<Edge>>,
    terms: HashSet<Term>,
    limit: Option<usize>,
}

impl StaticGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges(edges: impl IntoIterator<Item = Edge>) -> Self {
        let mut graph = Self::new();
        for edge in edges {
            graph.add_edge(edge);
        }
        graph
    }

    /// Load a JSON array of `{source, relation, target, weight}` records
    pub fn from_json_file(path: impl AsRef<FsPath>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let edges: Vec<Edge> = serde_json::from_str(&contents).map_err(|e| {
            Error::InvalidInput(format!("Invalid graph file {}: {}", path.display(), e))
        })?;
        // Round-trip through the constructor so weights get clamped
        Ok(Self::from_edges(edges.into_iter().map(|e| {
            Edge::new(e.source, e.relation, e.target, e.weight)
        })))
    }

    /// Cap the number of edges returned per fetch, like the remote page limit
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn add_edge(&mut self, edge: Edge) {
        self.terms.insert(edge.source.clone());
        self.terms.insert(edge.target.clone());
        self.incoming
            .entry(edge.target.clone())
            .or_default()
            .push(edge.clone());
        self.outgoing.entry(edge.source.clone()).or_default().push(edge);
    }

    /// Register a term that has no edges
    pub fn add_term(&mut self, term: impl Into<Term>) {
        self.terms.insert(term.into());
    }

    pub fn contains(&self, term: &Term) -> bool {
        self.terms.contains(term)
    }

    /// Distinct relation types present, sorted
    pub fn relation_types(&self) -> Vec<RelationType> {
        let types: BTreeSet<&RelationType> = self
            .outgoing
            .values()
            .flatten()
            .map(|e| &e.relation)
            .collect();
        types.into_iter().cloned().collect()
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(Vec::len).sum()
    }

    fn unknown(term: &Term) -> FetchError {
        FetchError::RemoteError {
            status: 404,
            message: format!("Term '{}' not found", term),
        }
    }
}

#[async_trait]
impl RelationFetcher for StaticGraph {
    async fn fetch(&self, term: &Term, filter: &RelationFilter) -> FetchResult<Vec<Edge>> {
        if !self.contains(term) {
            return Err(Self::unknown(term));
        }

        let index = match filter.direction {
            Direction::Outgoing => &self.outgoing,
            Direction::Incoming => &self.incoming,
        };

        let mut edges: Vec<Edge> = index
            .get(term)
            .map(|edges| {
                edges
                    .iter()
                    .filter(|e| filter.allows(&e.relation))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        // Strongest first, as the remote service pages them
        edges.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| a.target.cmp(&b.target))
                .then_with(|| a.relation.cmp(&b.relation))
        });
        if let Some(limit) = self.limit {
            edges.truncate(limit);
        }

        Ok(edges)
    }

    async fn resolve(&self, term: &Term) -> FetchResult<Term> {
        if self.contains(term) {
            Ok(term.clone())
        } else {
            Err(Self::unknown(term))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn graph() -> StaticGraph {
        StaticGraph::from_edges([
            Edge::new("pizza", "r_has_part", "topping", 0.8),
            Edge::new("pizza", "r_isa", "plat", 0.9),
            Edge::new("topping", "r_has_part", "mozzarella", 0.6),
        ])
    }

    #[tokio::test]
    async fn test_fetch_outgoing_sorted_by_weight() {
        let edges = graph()
            .fetch(&Term::new("pizza"), &RelationFilter::any())
            .await
            .unwrap();
        let targets: Vec<&str> = edges.iter().map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["plat", "topping"]);
    }

    #[tokio::test]
    async fn test_fetch_filtered_and_incoming() {
        let graph = graph();
        let edges = graph
            .fetch(&Term::new("pizza"), &RelationFilter::only(["r_has_part"]))
            .await
            .unwrap();
        assert_eq!(edges.len(), 1);

        let incoming = graph
            .fetch(
                &Term::new("mozzarella"),
                &RelationFilter::any().with_direction(Direction::Incoming),
            )
            .await
            .unwrap();
        assert_eq!(incoming[0].source.as_str(), "topping");
    }

    #[tokio::test]
    async fn test_leaf_term_has_no_edges() {
        let edges = graph()
            .fetch(&Term::new("mozzarella"), &RelationFilter::any())
            .await
            .unwrap();
        assert!(edges.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_term_is_remote_error() {
        let graph = graph();
        let err = graph.resolve(&Term::new("zzz")).await.unwrap_err();
        assert!(matches!(err, FetchError::RemoteError { status: 404, .. }));
        assert!(graph.fetch(&Term::new("zzz"), &RelationFilter::any()).await.is_err());
    }

    #[tokio::test]
    async fn test_limit_truncates() {
        let edges = graph()
            .with_limit(1)
            .fetch(&Term::new("pizza"), &RelationFilter::any())
            .await
            .unwrap();
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"source": "chat", "relation": "r_isa", "target": "animal", "weight": 1.5}}]"#
        )
        .unwrap();

        let graph = StaticGraph::from_json_file(file.path()).unwrap();
        assert!(graph.contains(&Term::new("animal")));
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.relation_types(), vec![RelationType::new("r_isa")]);
        assert_eq!(graph.outgoing[&Term::new("chat")][0].weight, 1.0);
    }

    #[test]
    fn test_from_json_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            StaticGraph::from_json_file(file.path()),
            Err(Error::InvalidInput(_))
        ));
    }
}
