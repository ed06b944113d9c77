//! Relation fetching from the remote lexical graph
//!
//! This module provides:
//! - The [`RelationFetcher`] boundary trait used by the fetch cache
//! - An HTTP client for the JeuxDeMots-style graph API
//! - A retry decorator with exponential backoff for transient failures
//! - An in-memory graph for offline use and tests

mod http;
mod registry;
mod retry;
mod static_graph;
mod types;

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Edge, RelationFilter, RelationType, Term};
use crate::error::FetchResult;

pub use http::{JdmFetcher, JdmFetcherBuilder};
pub use registry::{RelationTypeInfo, RelationTypeRegistry};
pub use retry::{RetryPolicy, Retrying};
pub use static_graph::StaticGraph;
pub use types::{FetchParams, NodeDto, RelationDto, RelationTypeDto, RelationsResponse};

/// Remote graph service boundary
///
/// One network round trip per call and no local state. Implementations
/// report failures with the three [`crate::FetchError`] kinds.
#[async_trait]
pub trait RelationFetcher: Send + Sync {
    /// Fetch the edges attached to `term` that pass `filter`
    async fn fetch(&self, term: &Term, filter: &RelationFilter) -> FetchResult<Vec<Edge>>;

    /// Confirm that `term` exists, returning the service's spelling of it
    async fn resolve(&self, term: &Term) -> FetchResult<Term> {
        Ok(term.clone())
    }

    /// Canonical spelling of a relation name (aliases resolved)
    fn canonical_relation(&self, relation: &RelationType) -> RelationType {
        relation.clone()
    }
}

#[async_trait]
impl<F: RelationFetcher + ?Sized> RelationFetcher for Arc<F> {
    async fn fetch(&self, term: &Term, filter: &RelationFilter) -> FetchResult<Vec<Edge>> {
        (**self).fetch(term, filter).await
    }

    async fn resolve(&self, term: &Term) -> FetchResult<Term> {
        (**self).resolve(term).await
    }

    fn canonical_relation(&self, relation: &RelationType) -> RelationType {
        (**self).canonical_relation(relation)
    }
}
