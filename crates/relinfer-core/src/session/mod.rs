//! Inference session
//!
//! The single entry point presentation layers call. Validates a query,
//! resolves both endpoints, explores, ranks and truncates, all under one
//! query-level deadline. Holds no state of its own beyond the shared cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::cache::FetchCache;
use crate::config::{Config, SearchConfig};
use crate::domain::{InferenceResult, RelationFilter, RelationType, Term};
use crate::error::{Error, FetchError, FetchResult, Result};
use crate::explore::PathExplorer;
use crate::fetcher::RelationFetcher;
use crate::rank::{CertaintyRanker, model_by_name};

/// Deepest search a query may ask for
pub const MAX_DEPTH_LIMIT: usize = 6;

/// Per-query overrides of the session settings
#[derive(Debug, Clone, Default)]
pub struct InferOptions {
    pub max_depth: Option<usize>,
    /// Relation types allowed on intermediate hops
    pub via: Option<Vec<RelationType>>,
    /// Keep only the best `top_k` results (0 = all)
    pub top_k: Option<usize>,
    pub deadline: Option<Duration>,
}

impl InferOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn with_via(mut self, via: Vec<RelationType>) -> Self {
        self.via = Some(via);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Defaults applied when a query leaves an option unset
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub max_depth: usize,
    pub via: Vec<RelationType>,
    pub top_k: usize,
    pub query_timeout: Duration,
    pub max_concurrent_fetches: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for SessionSettings {
    fn from(config: &SearchConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            via: config.relation_filter.iter().map(RelationType::new).collect(),
            top_k: config.top_k,
            query_timeout: config.query_timeout(),
            max_concurrent_fetches: config.max_concurrent_fetches,
        }
    }
}

/// Answers "why does `source` hold `relation` with `target`?"
#[derive(Debug)]
pub struct InferenceSession {
    cache: Arc<FetchCache>,
    ranker: CertaintyRanker,
    settings: SessionSettings,
}

impl InferenceSession {
    pub fn new(cache: Arc<FetchCache>, ranker: CertaintyRanker, settings: SessionSettings) -> Self {
        Self {
            cache,
            ranker,
            settings,
        }
    }

    /// Build a session with its own cache from configuration
    pub fn from_config(fetcher: Arc<dyn RelationFetcher>, config: &Config) -> Result<Self> {
        let cache = Arc::new(FetchCache::from_config(fetcher, &config.cache));
        let ranker = CertaintyRanker::new(model_by_name(&config.search.certainty_model)?);
        Ok(Self::new(cache, ranker, SessionSettings::from(&config.search)))
    }

    pub fn cache(&self) -> &Arc<FetchCache> {
        &self.cache
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Ranked justifications, best first
    ///
    /// An empty list means no path was found within the depth bound; every
    /// failure is an error. Exceeding the deadline returns `QueryTimeout`
    /// and discards whatever was found so far.
    pub async fn infer(
        &self,
        source: &Term,
        relation: &RelationType,
        target: &Term,
        options: &InferOptions,
    ) -> Result<Vec<InferenceResult>> {
        validate(source, relation, target)?;

        let max_depth = options.max_depth.unwrap_or(self.settings.max_depth);
        if !(1..=MAX_DEPTH_LIMIT).contains(&max_depth) {
            return Err(Error::InvalidInput(format!(
                "max depth must be between 1 and {}, got {}",
                MAX_DEPTH_LIMIT, max_depth
            )));
        }
        let deadline = options.deadline.unwrap_or(self.settings.query_timeout);
        let top_k = options.top_k.unwrap_or(self.settings.top_k);
        let via = options.via.as_ref().unwrap_or(&self.settings.via);

        let query_id = Uuid::new_v4();
        let span = info_span!(
            "infer",
            query_id = %query_id,
            source = %source,
            relation = %relation,
            target = %target,
            max_depth
        );

        self.cache.begin_query();
        let started = Instant::now();
        let run = self
            .run(source, relation, target, max_depth, via, top_k)
            .instrument(span.clone());

        match tokio::time::timeout(deadline, run).await {
            Ok(Ok(results)) => {
                span.in_scope(|| {
                    info!(
                        results = results.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Inference complete"
                    )
                });
                Ok(results)
            }
            Ok(Err(e)) => {
                span.in_scope(|| warn!(code = e.code(), error = %e, "Inference failed"));
                Err(e)
            }
            Err(_) => {
                span.in_scope(|| {
                    warn!(deadline_ms = deadline.as_millis() as u64, "Inference timed out")
                });
                Err(Error::QueryTimeout(deadline))
            }
        }
    }

    async fn run(
        &self,
        source: &Term,
        relation: &RelationType,
        target: &Term,
        max_depth: usize,
        via: &[RelationType],
        top_k: usize,
    ) -> Result<Vec<InferenceResult>> {
        let relation = self.cache.canonical_relation(relation);
        let via = RelationFilter::only(via.iter().map(|r| self.cache.canonical_relation(r)));

        let (resolved_source, resolved_target) =
            tokio::join!(self.cache.resolve(source), self.cache.resolve(target));
        let source = endpoint("source", source, resolved_source)?;
        let target = endpoint("target", target, resolved_target)?;

        let paths = PathExplorer::new(&self.cache)
            .with_via(via)
            .with_max_concurrent(self.settings.max_concurrent_fetches)
            .explore(&source, &relation, &target, max_depth)
            .await?;

        let mut results = self.ranker.rank(paths, &relation);
        if top_k > 0 {
            results.truncate(top_k);
        }
        Ok(results)
    }
}

fn validate(source: &Term, relation: &RelationType, target: &Term) -> Result<()> {
    if source.is_empty() || target.is_empty() {
        return Err(Error::InvalidInput("source and target terms must not be empty".to_string()));
    }
    if relation.is_empty() {
        return Err(Error::InvalidInput("relation type must not be empty".to_string()));
    }
    if source == target {
        return Err(Error::InvalidQuery(format!(
            "source and target are the same term '{}'",
            source
        )));
    }
    Ok(())
}

fn endpoint(role: &str, term: &Term, resolved: FetchResult<Term>) -> Result<Term> {
    match resolved {
        Ok(term) => Ok(term),
        Err(FetchError::RemoteError { .. }) => Err(Error::InvalidQuery(format!(
            "unknown {} term '{}'",
            role, term
        ))),
        Err(e) => Err(Error::Fetch(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Edge, InferenceKind};
    use crate::fetcher::StaticGraph;
    use async_trait::async_trait;

    fn session(edges: Vec<Edge>) -> InferenceSession {
        InferenceSession::from_config(
            Arc::new(StaticGraph::from_edges(edges)),
            &Config::default(),
        )
        .unwrap()
    }

    fn pizza_graph() -> Vec<Edge> {
        vec![
            Edge::new("pizza", "r_has_part", "topping", 0.8),
            Edge::new("topping", "r_has_part", "mozzarella", 0.6),
            Edge::new("pizza", "r_isa", "plat", 0.7),
        ]
    }

    async fn ask(session: &InferenceSession, s: &str, r: &str, t: &str) -> Result<Vec<InferenceResult>> {
        session
            .infer(&Term::new(s), &RelationType::new(r), &Term::new(t), &InferOptions::default())
            .await
    }

    #[tokio::test]
    async fn test_pizza_has_part_mozzarella() {
        let session = session(pizza_graph());
        let results = ask(&session, "pizza", "r_has_part", "mozzarella").await.unwrap();

        assert_eq!(results.len(), 1);
        assert!((results[0].certainty - 0.3).abs() < 1e-12);
        assert_eq!(results[0].hops(), 2);
        assert_eq!(results[0].kind, InferenceKind::Transitivity);
    }

    #[tokio::test]
    async fn test_no_path_is_empty_success() {
        let session = session(pizza_graph());
        let results = ask(&session, "mozzarella", "r_isa", "pizza").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_endpoints_are_invalid_query() {
        let session = session(pizza_graph());
        let err = ask(&session, "zzz", "r_isa", "pizza").await.unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(ref m) if m.contains("source")));

        let err = ask(&session, "pizza", "r_isa", "zzz").await.unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(ref m) if m.contains("target")));
    }

    #[tokio::test]
    async fn test_input_validation() {
        let session = session(pizza_graph());
        assert!(matches!(
            ask(&session, " ", "r_isa", "pizza").await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            ask(&session, "pizza", "", "plat").await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            ask(&session, "pizza", "r_isa", "pizza").await,
            Err(Error::InvalidQuery(_))
        ));

        let err = session
            .infer(
                &Term::new("pizza"),
                &RelationType::new("r_isa"),
                &Term::new("plat"),
                &InferOptions::default().with_max_depth(MAX_DEPTH_LIMIT + 1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_options_override_settings() {
        let session = session(pizza_graph());
        let (s, r, t) = (
            Term::new("pizza"),
            RelationType::new("r_has_part"),
            Term::new("mozzarella"),
        );

        let shallow = InferOptions::default().with_max_depth(1);
        assert!(session.infer(&s, &r, &t, &shallow).await.unwrap().is_empty());

        let isa_only = InferOptions::default().with_via(vec![RelationType::new("r_isa")]);
        assert!(session.infer(&s, &r, &t, &isa_only).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_top_k_truncates() {
        let mut edges = pizza_graph();
        for i in 0..5 {
            let mid = format!("ingredient{}", i);
            edges.push(Edge::new("pizza", "r_has_part", mid.as_str(), 0.5));
            edges.push(Edge::new(mid.as_str(), "r_has_part", "mozzarella", 0.5));
        }
        let session = session(edges);
        let (s, r, t) = (
            Term::new("pizza"),
            RelationType::new("r_has_part"),
            Term::new("mozzarella"),
        );

        let all = session.infer(&s, &r, &t, &InferOptions::default()).await.unwrap();
        assert_eq!(all.len(), 6);

        let top = session
            .infer(&s, &r, &t, &InferOptions::default().with_top_k(2))
            .await
            .unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0], all[0]);
    }

    struct Stalled;

    #[async_trait]
    impl RelationFetcher for Stalled {
        async fn fetch(&self, _term: &Term, _filter: &RelationFilter) -> FetchResult<Vec<Edge>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_yields_query_timeout() {
        let session = InferenceSession::from_config(Arc::new(Stalled), &Config::default()).unwrap();
        let err = session
            .infer(
                &Term::new("pizza"),
                &RelationType::new("r_has_part"),
                &Term::new("mozzarella"),
                &InferOptions::default().with_deadline(Duration::from_secs(2)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::QueryTimeout(d) if d == Duration::from_secs(2)));
        assert_eq!(err.code(), "E900");
    }
}
