//! HTTP client for the JeuxDeMots-style graph API
//!
//! Provides async access to:
//! - `relations/from/{term}` and `relations/to/{term}` (edges of a term)
//! - `node_by_name/{term}` (term existence)
//! - `relations_types` (relation-type registry)

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Url};
use tracing::debug;

use super::RelationFetcher;
use super::registry::RelationTypeRegistry;
use super::retry::RetryPolicy;
use super::types::{FetchParams, NodeDto, RelationTypeDto, RelationsResponse};
use crate::config::{DEFAULT_BASE_URL, RemoteConfig};
use crate::domain::{Direction, Edge, RelationFilter, RelationType, Term};
use crate::error::{Error, FetchError, FetchResult, Result};

/// Remote graph client
///
/// Stateless apart from the relation-type registry, which is loaded once
/// by [`JdmFetcherBuilder::connect`]. Only that load is retried here; wrap
/// the client in [`super::Retrying`] for relation calls.
#[derive(Clone)]
pub struct JdmFetcher {
    http_client: HttpClient,
    base_url: Url,
    api_key: Option<String>,
    timeout: Duration,
    base_params: FetchParams,
    weight_scale: f64,
    registry: Arc<RelationTypeRegistry>,
}

impl std::fmt::Debug for JdmFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JdmFetcher")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("relation_types", &self.registry.len())
            .field("api_key", &self.api_key.is_some())
            .finish()
    }
}

/// Builder for creating a JdmFetcher
pub struct JdmFetcherBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
    params: FetchParams,
    weight_scale: f64,
    registry: Option<RelationTypeRegistry>,
    retry: RetryPolicy,
}

impl Default for JdmFetcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl JdmFetcherBuilder {
    pub fn new() -> Self {
        let defaults = RemoteConfig::default();
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: None,
            params: FetchParams {
                min_weight: Some(defaults.min_weight),
                limit: Some(defaults.page_limit),
                ..Default::default()
            },
            weight_scale: defaults.weight_scale,
            registry: None,
            retry: RetryPolicy::none(),
        }
    }

    /// Take endpoint, timeout, paging and retry policy from the remote config
    pub fn config(mut self, config: &RemoteConfig) -> Self {
        self.base_url = Some(config.base_url.clone());
        self.retry = RetryPolicy::from(config);
        self.timeout_secs = Some(config.timeout_secs);
        self.params.min_weight = Some(config.min_weight);
        self.params.limit = Some(config.page_limit);
        self.weight_scale = config.weight_scale;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn weight_scale(mut self, scale: f64) -> Self {
        self.weight_scale = scale;
        self
    }

    /// Retry policy for the registry load in [`JdmFetcherBuilder::connect`]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Use a preloaded registry instead of fetching one
    pub fn registry(mut self, registry: RelationTypeRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build without contacting the service
    pub fn build(self) -> Result<JdmFetcher> {
        let timeout = Duration::from_secs(self.timeout_secs.unwrap_or(RemoteConfig::default().timeout_secs));
        if self.weight_scale <= 0.0 {
            return Err(Error::ConfigError("weight scale must be positive".to_string()));
        }

        let raw_url = self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(raw_url.trim_end_matches('/'))
            .map_err(|e| Error::ConfigError(format!("Invalid base URL '{}': {}", raw_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::ConfigError(format!("Base URL '{}' cannot hold paths", raw_url)));
        }

        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::NetworkError)?;

        Ok(JdmFetcher {
            http_client,
            base_url,
            api_key: self.api_key,
            timeout,
            base_params: self.params,
            weight_scale: self.weight_scale,
            registry: Arc::new(self.registry.unwrap_or_default()),
        })
    }

    /// Build and load the relation-type registry from the service
    pub async fn connect(self) -> Result<JdmFetcher> {
        let preloaded = self.registry.is_some();
        let retry = self.retry;
        let mut fetcher = self.build()?;
        if !preloaded {
            let registry = retry
                .run("relations_types", "registry", || fetcher.fetch_relation_types())
                .await?;
            debug!(relation_types = registry.len(), "Loaded relation-type registry");
            fetcher.registry = Arc::new(registry);
        }
        Ok(fetcher)
    }
}

impl JdmFetcher {
    pub fn builder() -> JdmFetcherBuilder {
        JdmFetcherBuilder::new()
    }

    pub fn registry(&self) -> &RelationTypeRegistry {
        &self.registry
    }

    /// Fetch the relation-type table
    pub async fn fetch_relation_types(&self) -> FetchResult<RelationTypeRegistry> {
        let url = self.endpoint(&["relations_types"])?;
        let response = self.send(url, &[]).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(relation_status_error(status.as_u16(), "relations_types"));
        }

        let dtos: Vec<RelationTypeDto> = response.json().await.map_err(|e| FetchError::RemoteError {
            status: status.as_u16(),
            message: format!("Failed to parse relation types: {}", e),
        })?;
        Ok(RelationTypeRegistry::from_dtos(dtos))
    }

    fn endpoint(&self, segments: &[&str]) -> FetchResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::RemoteUnavailable(format!("invalid base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a GET, enforcing the per-call deadline
    async fn send(&self, url: Url, query: &[(&'static str, String)]) -> FetchResult<reqwest::Response> {
        debug!(url = %url, params = query.len(), "Sending graph request");

        let mut request = self.http_client.get(url).query(query);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        match tokio::time::timeout(self.timeout, request.send()).await {
            Err(_) => Err(FetchError::RemoteTimeout(self.timeout)),
            Ok(Err(e)) if e.is_timeout() => Err(FetchError::RemoteTimeout(self.timeout)),
            Ok(Err(e)) => Err(FetchError::RemoteUnavailable(e.to_string())),
            Ok(Ok(response)) => Ok(response),
        }
    }

    /// Query parameters for a filtered fetch
    ///
    /// Returns `None` for the type list when some requested type is not in
    /// the registry; the caller then fetches unfiltered and filters locally.
    fn params_for(&self, filter: &RelationFilter) -> FetchParams {
        let mut params = self.base_params.clone();
        if let Some(types) = &filter.types {
            let ids: Option<Vec<i64>> = types.iter().map(|t| self.registry.id_of(t)).collect();
            if let Some(ids) = ids {
                params = params.with_types(ids);
            }
        }
        params
    }

    /// Turn a response body into edges
    fn edges_from_response(&self, body: RelationsResponse, filter: &RelationFilter) -> Vec<Edge> {
        let names: HashMap<i64, &NodeDto> = body.nodes.iter().map(|n| (n.id, n)).collect();
        let allowed: Option<BTreeSet<RelationType>> = filter
            .types
            .as_ref()
            .map(|types| types.iter().map(|t| self.registry.canonical(t.as_str())).collect());

        body.relations
            .iter()
            .filter(|rel| rel.w > 0.0)
            .filter_map(|rel| {
                let (Some(source), Some(target)) = (names.get(&rel.node1), names.get(&rel.node2)) else {
                    debug!(relation_id = rel.id, "Dropping relation with unknown node");
                    return None;
                };
                Some(Edge::new(
                    source.name.as_str(),
                    self.registry.name_of(rel.type_id),
                    target.name.as_str(),
                    rel.w / self.weight_scale,
                ))
            })
            .filter(|edge| allowed.as_ref().is_none_or(|types| types.contains(&edge.relation)))
            .collect()
    }
}

#[async_trait]
impl RelationFetcher for JdmFetcher {
    async fn fetch(&self, term: &Term, filter: &RelationFilter) -> FetchResult<Vec<Edge>> {
        let side = match filter.direction {
            Direction::Outgoing => "from",
            Direction::Incoming => "to",
        };
        let url = self.endpoint(&["relations", side, term.as_str()])?;
        let params = self.params_for(filter);

        let response = self.send(url, &params.to_query_pairs()).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(relation_status_error(status.as_u16(), &body));
        }

        let body: RelationsResponse = response.json().await.map_err(|e| FetchError::RemoteError {
            status: status.as_u16(),
            message: format!("Failed to parse relations of '{}': {}", term, e),
        })?;

        let edges = self.edges_from_response(body, filter);
        debug!(term = %term, filter = %filter, edges = edges.len(), "Fetched relations");
        Ok(edges)
    }

    fn canonical_relation(&self, relation: &RelationType) -> RelationType {
        self.registry.canonical(relation.as_str())
    }

    async fn resolve(&self, term: &Term) -> FetchResult<Term> {
        let url = self.endpoint(&["node_by_name", term.as_str()])?;
        let response = self.send(url, &[]).await?;
        let status = response.status().as_u16();

        match status {
            200 => {
                let node: NodeDto = response.json().await.map_err(|e| FetchError::RemoteError {
                    status,
                    message: format!("Failed to parse node '{}': {}", term, e),
                })?;
                Ok(Term::new(node.name))
            }
            // The service answers 500 for some unknown terms
            404 | 500 => Err(FetchError::RemoteError {
                status,
                message: format!("Term '{}' not found", term),
            }),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(relation_status_error(status, &body))
            }
        }
    }
}

/// Map a non-success status on a relation endpoint to a fetch error
fn relation_status_error(status: u16, body: &str) -> FetchError {
    match status {
        429 | 500..=599 => FetchError::RemoteUnavailable(format!("HTTP {}: {}", status, truncate(body))),
        _ => FetchError::RemoteError {
            status,
            message: truncate(body),
        },
    }
}

fn truncate(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{NodeDto, RelationDto, RelationTypeInfo};
    use crate::domain::RelationType;

    fn registry() -> RelationTypeRegistry {
        RelationTypeRegistry::new([
            RelationTypeInfo {
                id: 6,
                name: RelationType::new("r_isa"),
                alias: None,
                help: None,
            },
            RelationTypeInfo {
                id: 9,
                name: RelationType::new("r_has_part"),
                alias: Some("has-part".to_string()),
                help: None,
            },
        ])
    }

    fn fetcher() -> JdmFetcher {
        JdmFetcher::builder()
            .base_url("https://example.com/v0/")
            .registry(registry())
            .build()
            .unwrap()
    }

    fn node(id: i64, name: &str) -> NodeDto {
        NodeDto {
            id,
            name: name.to_string(),
            node_type: Some(1),
            w: None,
        }
    }

    fn relation(node1: i64, node2: i64, type_id: i64, w: f64) -> RelationDto {
        RelationDto {
            id: node1 * 100 + node2,
            node1,
            node2,
            type_id,
            w,
        }
    }

    #[test]
    fn test_builder_defaults() {
        let fetcher = JdmFetcher::builder().build().unwrap();
        assert_eq!(fetcher.base_url.as_str(), DEFAULT_BASE_URL);
        assert_eq!(fetcher.timeout, Duration::from_secs(10));
        assert!(fetcher.registry().is_empty());
    }

    #[test]
    fn test_config_sets_registry_retry() {
        let config = RemoteConfig {
            max_retries: 5,
            ..RemoteConfig::default()
        };
        let builder = JdmFetcher::builder().config(&config);
        assert_eq!(builder.retry, RetryPolicy::from(&config));
        assert_eq!(JdmFetcher::builder().retry, RetryPolicy::none());
    }

    #[tokio::test]
    async fn test_connect_unreachable_is_unavailable() {
        let policy = RetryPolicy {
            max_retries: 2,
            backoff_base: Duration::from_millis(1),
            backoff_max: Duration::from_millis(1),
        };
        let err = JdmFetcher::builder()
            .base_url("http://127.0.0.1:1/v0")
            .retry(policy)
            .connect()
            .await
            .unwrap_err();
        assert_eq!(err.code(), "E100");
    }

    #[test]
    fn test_builder_rejects_bad_url() {
        assert!(JdmFetcher::builder().base_url("not a url").build().is_err());
        assert!(JdmFetcher::builder().weight_scale(0.0).build().is_err());
    }

    #[test]
    fn test_endpoint_escapes_term() {
        let url = fetcher()
            .endpoint(&["relations", "from", "pomme de terre"])
            .unwrap();
        assert_eq!(url.as_str(), "https://example.com/v0/relations/from/pomme%20de%20terre");
    }

    #[test]
    fn test_params_translate_known_types() {
        let params = fetcher().params_for(&RelationFilter::only(["has-part"]));
        assert_eq!(params.types_ids, Some(vec![9]));

        let params = fetcher().params_for(&RelationFilter::only(["r_has_part", "r_isa"]));
        assert_eq!(params.types_ids, Some(vec![9, 6]));
        assert_eq!(params.min_weight, Some(1));
        assert_eq!(params.limit, Some(100));
    }

    #[test]
    fn test_params_unknown_type_fetches_unfiltered() {
        let params = fetcher().params_for(&RelationFilter::only(["r_isa", "r_mystery"]));
        assert!(params.types_ids.is_none());
    }

    #[test]
    fn test_edges_from_response() {
        let body = RelationsResponse {
            nodes: vec![node(1, "pizza"), node(2, "mozzarella"), node(3, "italie")],
            relations: vec![
                relation(1, 2, 9, 80.0),
                relation(1, 3, 42, 250.0),
                relation(1, 3, 6, -20.0),
                relation(1, 99, 9, 50.0),
            ],
        };

        let edges = fetcher().edges_from_response(body, &RelationFilter::any());
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0], Edge::new("pizza", "r_has_part", "mozzarella", 0.8));
        assert_eq!(edges[1].relation.as_str(), "type:42");
        assert_eq!(edges[1].weight, 1.0);
    }

    #[test]
    fn test_edges_filtered_locally() {
        let body = RelationsResponse {
            nodes: vec![node(1, "pizza"), node(2, "mozzarella"), node(3, "plat")],
            relations: vec![relation(1, 2, 9, 80.0), relation(1, 3, 6, 60.0)],
        };
        let edges = fetcher().edges_from_response(body, &RelationFilter::only(["r_isa"]));
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target.as_str(), "plat");
    }

    #[test]
    fn test_alias_filter_keeps_canonical_edges() {
        let body = RelationsResponse {
            nodes: vec![node(1, "pizza"), node(2, "mozzarella")],
            relations: vec![relation(1, 2, 9, 80.0)],
        };
        let edges = fetcher().edges_from_response(body, &RelationFilter::only(["has-part"]));
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].relation.as_str(), "r_has_part");
    }

    #[test]
    fn test_canonical_relation_uses_registry() {
        let fetcher = fetcher();
        assert_eq!(
            fetcher.canonical_relation(&RelationType::new("has-part")).as_str(),
            "r_has_part"
        );
        assert_eq!(
            fetcher.canonical_relation(&RelationType::new("r_new")).as_str(),
            "r_new"
        );
    }

    #[test]
    fn test_relation_status_error_mapping() {
        assert!(relation_status_error(503, "down").is_transient());
        assert!(relation_status_error(429, "slow down").is_transient());
        assert_eq!(
            relation_status_error(404, "unknown"),
            FetchError::RemoteError {
                status: 404,
                message: "unknown".to_string()
            }
        );
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(500);
        let truncated = truncate(&body);
        assert_eq!(truncated.len(), 203);
        assert_eq!(truncate("short"), "short");
    }

    #[test]
    fn test_debug_hides_api_key() {
        let fetcher = JdmFetcher::builder().api_key("secret-key").build().unwrap();
        let debug = format!("{:?}", fetcher);
        assert!(debug.contains("JdmFetcher"));
        assert!(!debug.contains("secret-key"));
    }

    #[test]
    fn test_fetcher_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<JdmFetcher>();
    }
}
