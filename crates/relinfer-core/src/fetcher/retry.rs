//! Bounded retry with exponential backoff for transient fetch failures

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use super::RelationFetcher;
use crate::config::RemoteConfig;
use crate::domain::{Edge, RelationFilter, RelationType, Term};
use crate::error::FetchResult;

/// How often and how patiently to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RemoteConfig::default())
    }
}

impl From<&RemoteConfig> for RetryPolicy {
    fn from(config: &RemoteConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
        }
    }
}

impl RetryPolicy {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff_base: Duration::ZERO,
            backoff_max: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based), without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base.saturating_mul(factor).min(self.backoff_max)
    }

    /// Delay with up to 10% random jitter added
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter_ms = (base.as_millis() / 10) as u64;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }

    /// Run `op` until it succeeds, fails authoritatively, or retries run out
    pub async fn run<T, Op, Fut>(&self, what: &str, subject: &str, mut op: Op) -> FetchResult<T>
    where
        Op: FnMut() -> Fut,
        Fut: std::future::Future<Output = FetchResult<T>>,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempts <= self.max_retries => {
                    let backoff = self.delay(attempts);
                    warn!(
                        term = subject,
                        op = what,
                        attempt = attempts,
                        wait_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Transient fetch failure, retrying after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Wraps a fetcher and retries `RemoteUnavailable` / `RemoteTimeout`
///
/// `RemoteError` is authoritative and returned immediately.
#[derive(Debug, Clone)]
pub struct Retrying<F> {
    inner: F,
    policy: RetryPolicy,
}

impl<F> Retrying<F> {
    pub fn new(inner: F, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

#[async_trait]
impl<F: RelationFetcher> RelationFetcher for Retrying<F> {
    async fn fetch(&self, term: &Term, filter: &RelationFilter) -> FetchResult<Vec<Edge>> {
        self.policy
            .run("fetch", term.as_str(), || self.inner.fetch(term, filter))
            .await
    }

    async fn resolve(&self, term: &Term) -> FetchResult<Term> {
        self.policy
            .run("resolve", term.as_str(), || self.inner.resolve(term))
            .await
    }

    fn canonical_relation(&self, relation: &RelationType) -> RelationType {
        self.inner.canonical_relation(relation)
    }
}
