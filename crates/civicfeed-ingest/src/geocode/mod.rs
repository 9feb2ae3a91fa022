//! Address → coordinate resolution with a process-wide TTL cache.

mod google;

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;

pub use google::GoogleGeocoder;

use crate::error::GeocodeError;
use crate::sanity::SanityCheck;
use crate::types::{GeocodeQuery, GeocodeResult};

/// Default lifetime of a cached geocode result: 30 days.
pub const DEFAULT_GEOCODE_CACHE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// An external address → coordinate service.
pub trait GeocodeProvider: Send + Sync {
    /// Whether the provider is configured well enough to make requests.
    fn has_credentials(&self) -> bool;

    fn lookup(
        &self,
        query: &GeocodeQuery,
    ) -> impl Future<Output = Result<GeocodeResult, GeocodeError>> + Send;
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone)]
struct CacheEntry {
    result: GeocodeResult,
    stored_at: DateTime<Utc>,
}

/// Resolves normalized queries through a provider, caching successes.
///
/// One resolver is meant to live for the whole process (held in an `Arc`)
/// so every source shares the cache. Failures are never cached.
pub struct GeocodeResolver<P> {
    provider: P,
    cache: Mutex<HashMap<GeocodeQuery, CacheEntry>>,
    ttl: TimeDelta,
    clock: Clock,
}

impl<P: GeocodeProvider> GeocodeResolver<P> {
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            cache: Mutex::new(HashMap::new()),
            ttl: TimeDelta::from_std(DEFAULT_GEOCODE_CACHE_TTL).unwrap_or(TimeDelta::MAX),
            clock: Arc::new(Utc::now),
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        self
    }

    /// Replace the wall clock used for cache expiry.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.provider.has_credentials()
    }

    /// Unexpired cached result for `query`. Expired entries are evicted.
    pub async fn cached(&self, query: &GeocodeQuery) -> Option<GeocodeResult> {
        let now = (self.clock)();
        let mut cache = self.cache.lock().await;
        let entry = cache.get(query)?;
        if now.signed_duration_since(entry.stored_at) < self.ttl {
            return Some(entry.result.clone());
        }
        cache.remove(query);
        None
    }

    /// Resolve one query, consulting the cache first. The provider is called
    /// at most once per miss.
    ///
    /// # Errors
    ///
    /// Returns the provider's [`GeocodeError`]; an empty query is
    /// [`GeocodeError::NoResult`] without a provider call.
    pub async fn resolve(&self, query: &GeocodeQuery) -> Result<GeocodeResult, GeocodeError> {
        if query.is_empty() {
            return Err(GeocodeError::NoResult {
                query: String::new(),
            });
        }
        if let Some(hit) = self.cached(query).await {
            tracing::debug!(%query, "geocode cache hit");
            return Ok(hit);
        }

        let result = self.provider.lookup(query).await?;
        let entry = CacheEntry {
            result: result.clone(),
            stored_at: (self.clock)(),
        };
        self.cache.lock().await.insert(query.clone(), entry);
        Ok(result)
    }

    /// Resolve a set of queries through a bounded worker pool.
    ///
    /// Queries are deduplicated first, so the provider sees each distinct
    /// query at most once. With a [`SanityCheck`], results outside the
    /// source's expected area are retried in a second pooled pass (see
    /// [`SanityCheck::correct_distant`]). Failures are logged and left out of
    /// the returned map.
    pub async fn resolve_all(
        &self,
        queries: impl IntoIterator<Item = GeocodeQuery>,
        concurrency: usize,
        sanity: Option<&SanityCheck>,
    ) -> HashMap<GeocodeQuery, GeocodeResult> {
        let unique: BTreeSet<GeocodeQuery> =
            queries.into_iter().filter(|q| !q.is_empty()).collect();

        let mut resolved = HashMap::with_capacity(unique.len());
        for (query, outcome) in self.resolve_pooled(unique.iter().cloned(), concurrency).await {
            match outcome {
                Ok(result) => {
                    resolved.insert(query, result);
                }
                Err(e) => {
                    tracing::warn!(%query, error = %e, "geocode failed; dropping affected records");
                }
            }
        }

        if let Some(check) = sanity {
            check
                .correct_distant(self, &unique, &mut resolved, concurrency)
                .await;
        }
        resolved
    }

    /// Run `resolve` over already-deduplicated queries, at most
    /// `concurrency` at a time.
    pub(crate) async fn resolve_pooled(
        &self,
        queries: impl IntoIterator<Item = GeocodeQuery>,
        concurrency: usize,
    ) -> Vec<(GeocodeQuery, Result<GeocodeResult, GeocodeError>)> {
        stream::iter(queries)
            .map(|query| async move {
                let outcome = self.resolve(&query).await;
                (query, outcome)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }
}

#[cfg(test)]
#[path = "geocode_test.rs"]
mod tests;
