use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Default maximum distance, in miles, between a geocoded point and a
/// source's expected center.
pub const DEFAULT_SANITY_RADIUS_MILES: f64 = 40.0;

/// Region labels that name a precinct or direction rather than a place.
/// Feeds that report these get the source's city substituted.
pub const DEFAULT_DIRECTIONAL_LABELS: &[&str] = &[
    "NORTH",
    "SOUTH",
    "EAST",
    "WEST",
    "CENTRAL",
    "DOWNTOWN",
    "NORTHEAST",
    "NORTHWEST",
    "SOUTHEAST",
    "SOUTHWEST",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    Kml,
    Json,
    Html,
}

impl std::fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedFormat::Kml => write!(f, "kml"),
            FeedFormat::Json => write!(f, "json"),
            FeedFormat::Html => write!(f, "html"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// How a source turns a street plus region label into a display address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayPolicy {
    /// Substitute the city for directional/precinct labels, title-case others.
    #[default]
    Directional,
    /// Append `", <City>, <Abbr>"` to any address that does not mention the
    /// city or region already.
    FixedSuffix,
}

/// Per-source replacements for the default field fallback chains.
///
/// Each list is tried in order; the first key holding a usable value wins.
/// Keys may be dotted paths into nested objects (`location.latitude`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldOverrides {
    pub id: Option<Vec<String>>,
    pub name: Option<Vec<String>>,
    pub category: Option<Vec<String>>,
    pub address: Option<Vec<String>>,
    pub region: Option<Vec<String>>,
    pub updated_at: Option<Vec<String>>,
    pub call_time_received: Option<Vec<String>>,
    pub lat: Option<Vec<String>>,
    pub lon: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub slug: String,
    pub label: String,
    pub url: String,
    /// Used only when content sniffing cannot identify the payload.
    pub format: Option<FeedFormat>,
    pub city: String,
    /// Full region name, e.g. `Oregon`.
    pub region: String,
    /// Region abbreviation, e.g. `OR`.
    pub region_abbr: String,
    /// Expected center of the source's coverage area. Enables the
    /// geographic sanity check for geocoded records.
    pub center: Option<GeoPoint>,
    #[serde(default = "default_sanity_radius")]
    pub sanity_radius_miles: f64,
    /// Whether records without native coordinates are geocoded.
    #[serde(default = "default_true")]
    pub geocode: bool,
    #[serde(default)]
    pub display_policy: DisplayPolicy,
    #[serde(default = "default_directional_labels")]
    pub directional_labels: Vec<String>,
    #[serde(default)]
    pub fields: FieldOverrides,
    /// Provider keys copied untyped into each record's extras.
    #[serde(default)]
    pub extras: Vec<String>,
    /// Extra request headers sent with the upstream fetch.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl SourceConfig {
    /// City-level fallback label, e.g. `"Portland, OR"`.
    #[must_use]
    pub fn city_label(&self) -> String {
        format!("{}, {}", self.city, self.region_abbr)
    }
}

fn default_sanity_radius() -> f64 {
    DEFAULT_SANITY_RADIUS_MILES
}

fn default_true() -> bool {
    true
}

fn default_directional_labels() -> Vec<String> {
    DEFAULT_DIRECTIONAL_LABELS
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct SourcesFile {
    pub sources: Vec<SourceConfig>,
}

impl SourcesFile {
    /// Look up a source by slug (case-insensitive).
    #[must_use]
    pub fn find(&self, slug: &str) -> Option<&SourceConfig> {
        self.sources
            .iter()
            .find(|s| s.slug.eq_ignore_ascii_case(slug))
    }
}

/// Load and validate the source profiles from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_sources(path: &Path) -> Result<SourcesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SourcesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_sources(&content)
}

/// Parse and validate source profiles from YAML text.
///
/// # Errors
///
/// Returns `ConfigError` if the text cannot be parsed or fails validation.
pub fn parse_sources(content: &str) -> Result<SourcesFile, ConfigError> {
    let sources_file: SourcesFile = serde_yaml::from_str(content)?;
    validate_sources(&sources_file)?;
    Ok(sources_file)
}

fn validate_sources(sources_file: &SourcesFile) -> Result<(), ConfigError> {
    let mut seen_slugs = HashSet::new();

    for source in &sources_file.sources {
        let slug = source.slug.trim();
        if slug.is_empty() {
            return Err(ConfigError::Validation(
                "source slug must be non-empty".to_string(),
            ));
        }

        if !seen_slugs.insert(slug.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source slug: '{slug}'"
            )));
        }

        if source.url.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{slug}' has an empty url"
            )));
        }

        for (field, value) in [
            ("city", &source.city),
            ("region", &source.region),
            ("region_abbr", &source.region_abbr),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "source '{slug}' has an empty {field}"
                )));
            }
        }

        if !(source.sanity_radius_miles.is_finite() && source.sanity_radius_miles > 0.0) {
            return Err(ConfigError::Validation(format!(
                "source '{slug}' has invalid sanity_radius_miles {}; must be positive",
                source.sanity_radius_miles
            )));
        }

        if let Some(center) = source.center {
            let lat_ok = center.lat.is_finite() && (-90.0..=90.0).contains(&center.lat);
            let lon_ok = center.lon.is_finite() && (-180.0..=180.0).contains(&center.lon);
            if !(lat_ok && lon_ok) {
                return Err(ConfigError::Validation(format!(
                    "source '{slug}' has an out-of-range center ({}, {})",
                    center.lat, center.lon
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "sources_test.rs"]
mod tests;
