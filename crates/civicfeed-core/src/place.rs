//! Canonical incident records shared by every feed source.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A provider-specific scalar preserved verbatim in [`CanonicalPlace::extras`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ScalarValue {
    /// Converts a JSON value into a scalar. Arrays, objects and `null` have
    /// no scalar form.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

/// One normalized incident, the only record type exposed outside the
/// ingestion core.
///
/// `lat` and `lon` are always finite and within WGS84 bounds; records that
/// cannot satisfy this are dropped before a [`FeedBatch`] is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPlace {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub lat: f64,
    pub lon: f64,
    /// Display address built by the source's display policy, never the
    /// geocoder's formatted label.
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_time_received: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub extras: BTreeMap<String, ScalarValue>,
}

impl CanonicalPlace {
    /// Returns `true` when `lat`/`lon` are finite and inside WGS84 bounds.
    #[must_use]
    pub fn coordinates_valid(lat: f64, lon: f64) -> bool {
        lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon)
    }
}

/// The result of one pipeline invocation for one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedBatch {
    /// Source slug.
    pub source: String,
    /// Human-readable source label.
    pub label: String,
    /// Stamped once per batch, not per record.
    pub fetched_at: DateTime<Utc>,
    pub places: Vec<CanonicalPlace>,
}
