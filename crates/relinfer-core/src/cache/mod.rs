//! Fetch cache
//!
//! Memoizes relation fetches keyed by (term, relation filter). Concurrent
//! requests for one key share a single remote call; distinct keys proceed
//! independently. Failures are remembered for a short window within the
//! current query and retried by the next one.

mod singleflight;
mod snapshot;

pub use singleflight::EntryState;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CacheConfig;
use crate::domain::{Edge, RelationFilter, RelationType, Term};
use crate::error::FetchResult;
use crate::fetcher::RelationFetcher;
use singleflight::{Freshness, Served, SingleFlight};

/// Key of one cached fetch
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub term: Term,
    pub filter: RelationFilter,
}

impl CacheKey {
    pub fn new(term: Term, filter: RelationFilter) -> Self {
        Self { term, filter }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.term, self.filter)
    }
}

/// Eviction and negative-caching settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Ready entries older than this are re-fetched (None = never)
    pub expiry: Option<Duration>,
    /// How long a failure is replayed within the same query
    pub negative_ttl: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for CacheOptions {
    fn from(config: &CacheConfig) -> Self {
        Self {
            expiry: config.expiry(),
            negative_ttl: config.negative_ttl(),
        }
    }
}

/// Cache counters since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from a ready entry
    pub hits: u64,
    /// Lookups that found no usable ready entry
    pub misses: u64,
    /// Calls made to the underlying fetcher
    pub fetches: u64,
    /// Underlying calls that failed
    pub failures: u64,
    /// Keys currently tracked
    pub entries: usize,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries, {} hits, {} misses, {} remote calls ({} failed)",
            self.entries, self.hits, self.misses, self.fetches, self.failures
        )
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    failures: AtomicU64,
}

impl Counters {
    fn record<T>(&self, served: Served, result: &FetchResult<T>) {
        match served {
            Served::Hit => {
                self.hits.fetch_add(1, Ordering::Relaxed);
            }
            Served::NegativeHit => {
                self.misses.fetch_add(1, Ordering::Relaxed);
            }
            Served::Filled => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.fetches.fetch_add(1, Ordering::Relaxed);
                if result.is_err() {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}

/// Deduplicating cache in front of a [`RelationFetcher`]
///
/// The only mutable state shared between concurrent explorations. Every
/// other component reads relation data through [`FetchCache::get`].
pub struct FetchCache {
    fetcher: Arc<dyn RelationFetcher>,
    edges: SingleFlight<CacheKey, Arc<Vec<Edge>>>,
    terms: SingleFlight<Term, Term>,
    options: CacheOptions,
    generation: AtomicU64,
    counters: Counters,
}

impl fmt::Debug for FetchCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchCache")
            .field("options", &self.options)
            .field("entries", &self.edges.len())
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl FetchCache {
    pub fn new(fetcher: Arc<dyn RelationFetcher>) -> Self {
        Self::with_options(fetcher, CacheOptions::default())
    }

    pub fn with_options(fetcher: Arc<dyn RelationFetcher>, options: CacheOptions) -> Self {
        Self {
            fetcher,
            edges: SingleFlight::new(),
            terms: SingleFlight::new(),
            options,
            generation: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    pub fn from_config(fetcher: Arc<dyn RelationFetcher>, config: &CacheConfig) -> Self {
        Self::with_options(fetcher, CacheOptions::from(config))
    }

    pub fn options(&self) -> CacheOptions {
        self.options
    }

    fn freshness(&self) -> Freshness {
        Freshness {
            expiry: self.options.expiry,
            negative_ttl: self.options.negative_ttl,
            generation: self.generation.load(Ordering::Acquire),
        }
    }

    /// Start a new logical query
    ///
    /// Failures recorded by earlier queries stop being replayed.
    pub fn begin_query(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Edges of `term` allowed by `filter`
    ///
    /// Errors are the fetcher's, passed through unchanged.
    pub async fn get(&self, term: &Term, filter: &RelationFilter) -> FetchResult<Arc<Vec<Edge>>> {
        let key = CacheKey::new(term.clone(), filter.clone());
        let (result, served) = self
            .edges
            .get_or_fill(&key, self.freshness(), || async {
                debug!(term = %term, filter = %filter, "Fetching relations");
                self.fetcher.fetch(term, filter).await.map(Arc::new)
            })
            .await;

        self.counters.record(served, &result);
        if let (Ok(edges), Served::Filled) = (&result, served) {
            debug!(term = %term, filter = %filter, edges = edges.len(), "Cached relations");
        }
        result
    }

    /// Confirm a term exists, memoized like [`FetchCache::get`]
    pub async fn resolve(&self, term: &Term) -> FetchResult<Term> {
        let (result, served) = self
            .terms
            .get_or_fill(term, self.freshness(), || async {
                debug!(term = %term, "Resolving term");
                self.fetcher.resolve(term).await
            })
            .await;

        self.counters.record(served, &result);
        result
    }

    pub fn canonical_relation(&self, relation: &RelationType) -> RelationType {
        self.fetcher.canonical_relation(relation)
    }

    pub fn entry_state(&self, term: &Term, filter: &RelationFilter) -> EntryState {
        self.edges
            .state(&CacheKey::new(term.clone(), filter.clone()))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            entries: self.edges.len(),
        }
    }

    /// Number of tracked relation keys
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.len() == 0
    }
}
