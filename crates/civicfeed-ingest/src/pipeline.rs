//! Per-source orchestration: fetch → parse → extract → geocode → merge.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use civicfeed_core::{CanonicalPlace, FeedBatch, SourceConfig};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::sync::Mutex;

use crate::address::normalize_query;
use crate::error::{GeocodeError, PipelineError};
use crate::extract::extract_records;
use crate::fetch::{looks_like_bot_challenge, HttpGet};
use crate::formats::parse_feed;
use crate::geocode::{GeocodeProvider, GeocodeResolver};
use crate::sanity::SanityCheck;
use crate::types::{GeocodeQuery, IntermediateRecord};

/// Width of the geocode worker pool.
pub const DEFAULT_GEOCODE_CONCURRENCY: usize = 5;

/// Turns one source's upstream feed into a [`FeedBatch`].
///
/// The resolver (and with it the geocode cache) is shared; construct it once
/// per process and hand every pipeline a clone of the `Arc`.
pub struct FeedPipeline<H, P> {
    fetcher: H,
    resolver: Arc<GeocodeResolver<P>>,
    rng: Mutex<Box<dyn RngCore + Send>>,
    concurrency: usize,
}

impl<H: HttpGet, P: GeocodeProvider> FeedPipeline<H, P> {
    #[must_use]
    pub fn new(fetcher: H, resolver: Arc<GeocodeResolver<P>>) -> Self {
        Self {
            fetcher,
            resolver,
            rng: Mutex::new(Box::new(StdRng::from_os_rng())),
            concurrency: DEFAULT_GEOCODE_CONCURRENCY,
        }
    }

    /// Replace the RNG backing random record ids.
    #[must_use]
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Mutex::new(Box::new(rng));
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<GeocodeResolver<P>> {
        &self.resolver
    }

    /// Fetch the source's feed and process it.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::UpstreamFetch`] on transport failure.
    /// - [`PipelineError::UpstreamStatus`] on a non-2xx response.
    /// - [`PipelineError::UpstreamChallenge`] when a 2xx body is an anti-bot
    ///   page.
    /// - Anything [`FeedPipeline::process`] returns.
    pub async fn run(&self, source: &SourceConfig) -> Result<FeedBatch, PipelineError> {
        let response = self
            .fetcher
            .get(&source.url, &source.headers)
            .await
            .map_err(|e| PipelineError::UpstreamFetch {
                url: source.url.clone(),
                source: e,
            })?;

        if !response.is_success() {
            return Err(PipelineError::UpstreamStatus {
                status: response.status,
                url: source.url.clone(),
            });
        }
        if looks_like_bot_challenge(&response.body) {
            return Err(PipelineError::UpstreamChallenge {
                url: source.url.clone(),
            });
        }

        self.process(source, &response.body).await
    }

    /// Process an already-fetched feed body.
    ///
    /// Records whose coordinates cannot be established are dropped silently;
    /// only a missing geocoding credential aborts the batch.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Geocode`] with [`GeocodeError::MissingApiKey`]
    /// when at least one record needs geocoding and the provider has no
    /// credentials.
    pub async fn process(
        &self,
        source: &SourceConfig,
        bytes: &[u8],
    ) -> Result<FeedBatch, PipelineError> {
        let fetched_at = Utc::now();

        let rows = parse_feed(bytes, source.format);
        let parsed = rows.len();

        let records = {
            let mut rng = self.rng.lock().await;
            extract_records(rows, source, &mut **rng)
        };

        let queries: Vec<Option<GeocodeQuery>> = records
            .iter()
            .map(|record| geocode_query(record, source))
            .collect();
        let unique: HashSet<&GeocodeQuery> = queries.iter().flatten().collect();

        if !unique.is_empty() && !self.resolver.has_credentials() {
            return Err(PipelineError::Geocode {
                slug: source.slug.clone(),
                source: GeocodeError::MissingApiKey,
            });
        }

        let sanity = SanityCheck::from_source(source);
        let unique_count = unique.len();
        let resolved = self
            .resolver
            .resolve_all(unique.into_iter().cloned(), self.concurrency, sanity.as_ref())
            .await;

        let extracted = records.len();
        let mut native = 0_usize;
        let places: Vec<CanonicalPlace> = records
            .into_iter()
            .zip(queries)
            .filter_map(|(record, query)| {
                let point = match record.native {
                    Some(point) => {
                        native += 1;
                        point
                    }
                    None => resolved.get(query.as_ref()?)?.point(),
                };
                CanonicalPlace::coordinates_valid(point.lat, point.lon).then(|| CanonicalPlace {
                    id: record.id,
                    name: record.name,
                    category: record.category,
                    lat: point.lat,
                    lon: point.lon,
                    address: record.display_address,
                    call_time_received: record.call_time_received,
                    updated_at: record.updated_at,
                    extras: record.extras,
                })
            })
            .collect();

        tracing::info!(
            source = %source.slug,
            parsed,
            extracted,
            native,
            queries = unique_count,
            geocoded = resolved.len(),
            dropped = extracted - places.len(),
            places = places.len(),
            "feed processed"
        );

        Ok(FeedBatch {
            source: source.slug.clone(),
            label: source.label.clone(),
            fetched_at,
            places,
        })
    }
}

/// The geocode query for a record, when it needs one.
fn geocode_query(record: &IntermediateRecord, source: &SourceConfig) -> Option<GeocodeQuery> {
    if record.native.is_some() || !source.geocode {
        return None;
    }
    let query = normalize_query(&record.display_address);
    (!query.is_empty()).then_some(query)
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
