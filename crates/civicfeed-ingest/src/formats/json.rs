//! JSON feed parser: bare arrays, `{incidents}`, GeoJSON and ArcGIS
//! feature collections.

use serde_json::{Map, Value};

use crate::types::SourceRow;

/// Envelope keys holding the record array, tried in order.
const ARRAY_KEYS: &[&str] = &["incidents", "features", "data", "results"];

pub(crate) fn parse_json(text: &str) -> Vec<SourceRow> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "JSON feed did not parse");
            return Vec::new();
        }
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => ARRAY_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(SourceRow::from_map(flatten_feature(map))),
            _ => None,
        })
        .collect()
}

/// Merge GeoJSON `properties` or ArcGIS `attributes` over the feature object
/// so provider fields sit at the top level beside `geometry`.
fn flatten_feature(mut feature: Map<String, Value>) -> Map<String, Value> {
    for nested in ["properties", "attributes"] {
        if let Some(Value::Object(fields)) = feature.remove(nested) {
            for (key, value) in fields {
                feature.insert(key, value);
            }
        }
    }
    feature
}
