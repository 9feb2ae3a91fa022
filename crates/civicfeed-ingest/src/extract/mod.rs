//! Field extraction: maps loosely-typed source rows onto the canonical field
//! set through per-source fallback chains.
//!
//! Every canonical field resolves through a [`FieldChain`], an ordered list of
//! [`FieldSource`]s evaluated in order; the first one yielding a present value
//! wins. Sources override the key lists in their YAML profile.

pub mod description;
mod value;

use std::collections::BTreeMap;

use civicfeed_core::{GeoPoint, ScalarValue, SourceConfig};
use rand::RngCore;
use serde_json::Value;

use crate::address::{canonicalize_display, DisplayContext};
use crate::types::{IntermediateRecord, SourceRow};

/// Derives a field value from the whole row when no single key holds it.
pub type Derivation = fn(&SourceRow) -> Option<Value>;

/// One candidate in a fallback chain.
#[derive(Clone)]
pub enum FieldSource {
    /// A key or dotted path into the row.
    Key(String),
    /// A named function over the row.
    Derived { name: &'static str, derive: Derivation },
}

impl std::fmt::Debug for FieldSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldSource::Key(key) => write!(f, "Key({key})"),
            FieldSource::Derived { name, .. } => write!(f, "Derived({name})"),
        }
    }
}

/// Ordered fallback chain for one canonical field.
#[derive(Debug, Clone, Default)]
pub struct FieldChain {
    sources: Vec<FieldSource>,
}

impl FieldChain {
    #[must_use]
    pub fn keys(keys: &[&str]) -> Self {
        Self {
            sources: keys
                .iter()
                .map(|k| FieldSource::Key((*k).to_string()))
                .collect(),
        }
    }

    #[must_use]
    pub fn from_keys(keys: &[String]) -> Self {
        Self {
            sources: keys.iter().cloned().map(FieldSource::Key).collect(),
        }
    }

    #[must_use]
    pub fn then_derived(mut self, name: &'static str, derive: Derivation) -> Self {
        self.sources.push(FieldSource::Derived { name, derive });
        self
    }

    #[must_use]
    pub fn sources(&self) -> &[FieldSource] {
        &self.sources
    }

    /// First present value along the chain.
    #[must_use]
    pub fn resolve(&self, row: &SourceRow) -> Option<Value> {
        self.resolve_with(row, |v| Some(v.clone()))
    }

    /// First present value along the chain that `convert` accepts. A value of
    /// the wrong shape (an object where text was expected) falls through to
    /// the next candidate.
    #[must_use]
    pub fn resolve_with<T>(
        &self,
        row: &SourceRow,
        convert: impl Fn(&Value) -> Option<T>,
    ) -> Option<T> {
        self.sources.iter().find_map(|source| {
            let candidate = match source {
                FieldSource::Key(key) => row.lookup(key).cloned(),
                FieldSource::Derived { derive, .. } => derive(row),
            };
            candidate
                .filter(value::is_present)
                .and_then(|v| convert(&v))
        })
    }

    #[must_use]
    pub fn text(&self, row: &SourceRow) -> Option<String> {
        self.resolve_with(row, value::as_text)
    }

    #[must_use]
    pub fn number(&self, row: &SourceRow) -> Option<f64> {
        self.resolve_with(row, value::as_f64)
    }

    #[must_use]
    pub fn timestamp(&self, row: &SourceRow) -> Option<chrono::DateTime<chrono::Utc>> {
        self.resolve_with(row, value::as_timestamp)
    }
}

/// The complete set of chains used to extract one source.
#[derive(Debug, Clone)]
pub struct FieldChains {
    pub id: FieldChain,
    pub name: FieldChain,
    pub category: FieldChain,
    pub address: FieldChain,
    pub region: FieldChain,
    pub updated_at: FieldChain,
    pub call_time_received: FieldChain,
    pub lat: FieldChain,
    pub lon: FieldChain,
}

impl Default for FieldChains {
    fn default() -> Self {
        Self {
            id: FieldChain::keys(&[
                "GlobalID",
                "OBJECTID",
                "IncidentNumber",
                "CallID",
                "incident_id",
                "incident_number",
                "id",
            ]),
            name: FieldChain::keys(&["name", "Problem", "problem", "CallType", "type", "title"]),
            category: FieldChain::keys(&[
                "category", "CallType", "Problem", "problem", "type", "nature",
            ]),
            address: FieldChain::keys(&[
                "address",
                "Address",
                "Location",
                "location_text",
                "block_address",
                "street",
            ]),
            region: FieldChain::keys(&["precinct", "Precinct", "district", "neighborhood", "city"]),
            updated_at: FieldChain::keys(&[
                "updated_at",
                "LastUpdated",
                "EditDate",
                "last_updated",
                "UpdateTime",
            ]),
            call_time_received: FieldChain::keys(&[
                "CallTimeReceived",
                "call_received",
                "received",
                "ReceivedTime",
                "datetime",
                "call_time",
            ]),
            lat: FieldChain::keys(&[
                "lat",
                "latitude",
                "Latitude",
                "LAT",
                "location.latitude",
                "location_1.latitude",
                "geometry.y",
                "geometry.coordinates.1",
            ])
            .then_derived("wkt_point_lat", |row| wkt_point(row).map(|(_, lat)| lat.into())),
            lon: FieldChain::keys(&[
                "lon",
                "lng",
                "longitude",
                "Longitude",
                "LON",
                "location.longitude",
                "location_1.longitude",
                "geometry.x",
                "geometry.coordinates.0",
            ])
            .then_derived("wkt_point_lon", |row| wkt_point(row).map(|(lon, _)| lon.into())),
        }
    }
}

impl FieldChains {
    /// Default chains with the source's overrides applied. An override
    /// replaces the key list; derivations are dropped with it.
    #[must_use]
    pub fn for_source(source: &SourceConfig) -> Self {
        let mut chains = Self::default();
        let overrides = &source.fields;
        let apply = |chain: &mut FieldChain, keys: Option<&Vec<String>>| {
            if let Some(keys) = keys {
                *chain = FieldChain::from_keys(keys);
            }
        };
        apply(&mut chains.id, overrides.id.as_ref());
        apply(&mut chains.name, overrides.name.as_ref());
        apply(&mut chains.category, overrides.category.as_ref());
        apply(&mut chains.address, overrides.address.as_ref());
        apply(&mut chains.region, overrides.region.as_ref());
        apply(&mut chains.updated_at, overrides.updated_at.as_ref());
        apply(
            &mut chains.call_time_received,
            overrides.call_time_received.as_ref(),
        );
        apply(&mut chains.lat, overrides.lat.as_ref());
        apply(&mut chains.lon, overrides.lon.as_ref());
        chains
    }
}

/// `POINT (lon lat)` strings, as Socrata and some ArcGIS exports emit.
fn wkt_point(row: &SourceRow) -> Option<(f64, f64)> {
    ["location", "point", "the_geom", "shape"]
        .iter()
        .filter_map(|key| row.get(key).and_then(Value::as_str))
        .find_map(parse_wkt_point)
}

fn parse_wkt_point(text: &str) -> Option<(f64, f64)> {
    let trimmed = text.trim();
    let upper = trimmed.get(..5)?;
    if !upper.eq_ignore_ascii_case("point") {
        return None;
    }
    let inner = trimmed[5..]
        .trim()
        .strip_prefix('(')?
        .strip_suffix(')')?;
    let mut parts = inner.split_whitespace();
    let lon = parts.next()?.parse::<f64>().ok()?;
    let lat = parts.next()?.parse::<f64>().ok()?;
    Some((lon, lat))
}

/// Map every row of one fetch onto an [`IntermediateRecord`].
///
/// `rng` backs the random identifier used when no id key is present; such
/// identifiers are not stable across fetches.
pub fn extract_records<R: RngCore + ?Sized>(
    rows: Vec<SourceRow>,
    source: &SourceConfig,
    rng: &mut R,
) -> Vec<IntermediateRecord> {
    let chains = FieldChains::for_source(source);
    let display = DisplayContext::from_source(source);
    rows.into_iter()
        .map(|row| extract_record(row, source, &chains, &display, rng))
        .collect()
}

fn extract_record<R: RngCore + ?Sized>(
    row: SourceRow,
    source: &SourceConfig,
    chains: &FieldChains,
    display: &DisplayContext<'_>,
    rng: &mut R,
) -> IntermediateRecord {
    let id = chains.id.text(&row).unwrap_or_else(|| random_id(rng));
    let category = chains.category.text(&row);
    let name = chains
        .name
        .text(&row)
        .or_else(|| category.clone())
        .unwrap_or_else(|| "Incident".to_string());
    let raw_address = chains.address.text(&row);
    let region_label = chains.region.text(&row);
    let display_address =
        canonicalize_display(raw_address.as_deref(), region_label.as_deref(), display);

    let native = match (chains.lat.number(&row), chains.lon.number(&row)) {
        (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
            Some(GeoPoint { lat, lon })
        }
        _ => None,
    };

    let extras: BTreeMap<String, ScalarValue> = source
        .extras
        .iter()
        .filter_map(|key| {
            row.lookup(key)
                .and_then(ScalarValue::from_json)
                .map(|v| (key.clone(), v))
        })
        .collect();

    IntermediateRecord {
        id,
        name,
        category,
        raw_address,
        display_address,
        updated_at: chains.updated_at.timestamp(&row),
        call_time_received: chains.call_time_received.timestamp(&row),
        extras,
        native,
        row,
    }
}

fn random_id<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .to_string()
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
