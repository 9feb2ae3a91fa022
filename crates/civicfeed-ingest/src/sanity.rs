//! Geographic sanity check for geocoded results.
//!
//! Ambiguous street names geocode to the wrong city often enough that every
//! geocoded point is compared against the source's expected center. A point
//! outside the radius is retried once with the source's own city forced into
//! the query.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use civicfeed_core::{GeoPoint, SourceConfig};

use crate::address::normalize_query;
use crate::error::GeocodeError;
use crate::geocode::{GeocodeProvider, GeocodeResolver};
use crate::types::{GeocodeQuery, GeocodeResult};

/// Mean Earth radius in statute miles.
const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Great-circle distance between two points, in miles.
#[must_use]
pub fn haversine_miles(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().min(1.0).asin()
}

/// Expected area of one source.
#[derive(Debug, Clone, PartialEq)]
pub struct SanityCheck {
    pub center: GeoPoint,
    pub radius_miles: f64,
    pub city: String,
    pub region_abbr: String,
}

impl SanityCheck {
    /// `None` for sources without a configured center.
    #[must_use]
    pub fn from_source(source: &SourceConfig) -> Option<Self> {
        source.center.map(|center| Self {
            center,
            radius_miles: source.sanity_radius_miles,
            city: source.city.clone(),
            region_abbr: source.region_abbr.clone(),
        })
    }

    #[must_use]
    pub fn within_radius(&self, point: GeoPoint) -> bool {
        haversine_miles(self.center, point) <= self.radius_miles
    }

    /// Rewrite an address so it names this source's city.
    ///
    /// A trailing `", <other>, <ABBR>"` has `<other>` replaced; a trailing
    /// `", <ABBR>"` gets the city inserted; anything else gets
    /// `", <City>, <ABBR>"` appended.
    #[must_use]
    pub fn force_regional_suffix(&self, address: &str) -> String {
        let suffix = format!("{}, {}", self.city, self.region_abbr);
        let parts: Vec<&str> = address
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let ends_with_abbr = parts
            .last()
            .is_some_and(|last| last.eq_ignore_ascii_case(self.region_abbr.trim()));
        let keep = match parts.len() {
            0 => return suffix,
            n if ends_with_abbr && n >= 3 => n - 2,
            n if ends_with_abbr => n - 1,
            n => n,
        };
        if keep == 0 {
            return suffix;
        }
        format!("{}, {suffix}", parts[..keep].join(", "))
    }

    /// The retry key for `query`, or `None` when forcing the suffix does not
    /// change it.
    #[must_use]
    pub fn retry_query(&self, query: &GeocodeQuery) -> Option<GeocodeQuery> {
        let retry = normalize_query(&self.force_regional_suffix(query.as_str()));
        (retry != *query).then_some(retry)
    }

    /// Keep `result` when it lies inside the radius; otherwise retry with the
    /// forced regional suffix and take the retry only if it lands inside.
    /// A failed or still-distant retry keeps the original.
    pub async fn validate<P: GeocodeProvider>(
        &self,
        resolver: &GeocodeResolver<P>,
        query: &GeocodeQuery,
        result: GeocodeResult,
    ) -> GeocodeResult {
        if self.within_radius(result.point()) {
            return result;
        }

        let distance = haversine_miles(self.center, result.point());
        let Some(retry_query) = self.retry_query(query) else {
            tracing::debug!(%query, distance, "geocode outside radius; no distinct retry");
            return result;
        };

        match resolver.resolve(&retry_query).await {
            Ok(retry) if self.within_radius(retry.point()) => {
                tracing::debug!(%query, %retry_query, distance, "geocode corrected by regional retry");
                retry
            }
            Ok(_) => {
                tracing::debug!(%query, %retry_query, distance, "regional retry still outside radius");
                result
            }
            Err(e) => {
                tracing::debug!(%query, %retry_query, error = %e, "regional retry failed");
                result
            }
        }
    }

    /// Batch form of [`SanityCheck::validate`] over the results of one pooled
    /// pass.
    ///
    /// Retry keys are deduplicated, and a retry key that was already part of
    /// `looked_up` reuses that lookup's outcome instead of calling the
    /// provider again. The remaining retries run as a second pooled pass.
    /// Entries of `resolved` are replaced only by in-radius retries.
    pub async fn correct_distant<P: GeocodeProvider>(
        &self,
        resolver: &GeocodeResolver<P>,
        looked_up: &BTreeSet<GeocodeQuery>,
        resolved: &mut HashMap<GeocodeQuery, GeocodeResult>,
        concurrency: usize,
    ) {
        let mut retries: BTreeMap<GeocodeQuery, Vec<GeocodeQuery>> = BTreeMap::new();
        for (query, result) in resolved.iter() {
            if self.within_radius(result.point()) {
                continue;
            }
            let distance = haversine_miles(self.center, result.point());
            match self.retry_query(query) {
                Some(retry) => retries.entry(retry).or_default().push(query.clone()),
                None => {
                    tracing::debug!(%query, distance, "geocode outside radius; no distinct retry");
                }
            }
        }
        if retries.is_empty() {
            return;
        }

        let mut outcomes: HashMap<GeocodeQuery, GeocodeResult> = HashMap::new();
        let mut pending = Vec::new();
        for retry in retries.keys() {
            if !looked_up.contains(retry) {
                pending.push(retry.clone());
            } else if let Some(hit) = resolved.get(retry) {
                outcomes.insert(retry.clone(), hit.clone());
            }
        }
        for (retry, outcome) in resolver.resolve_pooled(pending, concurrency).await {
            match outcome {
                Ok(hit) => {
                    outcomes.insert(retry, hit);
                }
                Err(e) => {
                    tracing::debug!(retry_query = %retry, error = %e, "regional retry failed");
                }
            }
        }

        for (retry, originals) in retries {
            let Some(hit) = outcomes.get(&retry) else {
                continue;
            };
            if !self.within_radius(hit.point()) {
                tracing::debug!(retry_query = %retry, "regional retry still outside radius");
                continue;
            }
            for query in originals {
                tracing::debug!(%query, retry_query = %retry, "geocode corrected by regional retry");
                resolved.insert(query, hit.clone());
            }
        }
    }

    /// Resolve `query` and run it through [`SanityCheck::validate`].
    ///
    /// # Errors
    ///
    /// Returns the [`GeocodeError`] of the initial lookup; retry failures
    /// are not surfaced.
    pub async fn resolve_validated<P: GeocodeProvider>(
        &self,
        resolver: &GeocodeResolver<P>,
        query: &GeocodeQuery,
    ) -> Result<GeocodeResult, GeocodeError> {
        let result = resolver.resolve(query).await?;
        Ok(self.validate(resolver, query, result).await)
    }
}

#[cfg(test)]
#[path = "sanity_test.rs"]
mod tests;
