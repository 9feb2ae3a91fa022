//! Intermediate types flowing between parsers, the extractor and the
//! geocode resolver.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use civicfeed_core::{GeoPoint, ScalarValue};
use serde_json::{Map, Value};

/// One loosely-typed record as delivered by a feed.
///
/// Shape varies per source and per record. Parsers that synthesize rows
/// (KML, HTML tables) use well-known keys such as `address` or `lat`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct SourceRow(Map<String, Value>);

impl SourceRow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Resolve a key or a dotted path (`location.latitude`,
    /// `geometry.coordinates.1`). An exact key match wins over path
    /// traversal, since some providers put dots in field names.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        if let Some(v) = self.0.get(path) {
            return Some(v);
        }
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Normalized address text used as the geocode dedup and cache key.
///
/// Only [`crate::address::normalize_query`] constructs one, so every value
/// is trimmed, whitespace-collapsed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeocodeQuery(pub(crate) String);

impl GeocodeQuery {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for GeocodeQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Top hit returned by the geocoding provider.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    pub lat: f64,
    pub lon: f64,
    /// Provider-formatted label. Kept for logging; never displayed.
    pub formatted: String,
}

impl GeocodeResult {
    #[must_use]
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

/// A source row mapped onto the canonical field set, before coordinates
/// are resolved.
#[derive(Debug, Clone)]
pub struct IntermediateRecord {
    pub row: SourceRow,
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub raw_address: Option<String>,
    /// Never empty; degrades to the source's city label.
    pub display_address: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub call_time_received: Option<DateTime<Utc>>,
    pub extras: BTreeMap<String, ScalarValue>,
    /// Coordinates carried by the feed itself, when present and finite.
    pub native: Option<GeoPoint>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn row(value: Value) -> SourceRow {
        match value {
            Value::Object(map) => SourceRow::from_map(map),
            _ => panic!("test rows must be objects"),
        }
    }

    #[test]
    fn lookup_walks_objects_and_arrays() {
        let r = row(json!({
            "geometry": { "type": "Point", "coordinates": [-122.6, 45.5] },
            "location": { "latitude": "47.6" }
        }));
        assert_eq!(r.lookup("geometry.coordinates.0"), Some(&json!(-122.6)));
        assert_eq!(r.lookup("geometry.coordinates.1"), Some(&json!(45.5)));
        assert_eq!(r.lookup("location.latitude"), Some(&json!("47.6")));
        assert!(r.lookup("geometry.coordinates.2").is_none());
        assert!(r.lookup("geometry.type.x").is_none());
    }

    #[test]
    fn lookup_prefers_exact_dotted_key() {
        let r = row(json!({ "a.b": 1, "a": { "b": 2 } }));
        assert_eq!(r.lookup("a.b"), Some(&json!(1)));
    }
}
