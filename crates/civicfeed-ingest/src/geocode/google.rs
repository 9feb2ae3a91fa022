//! Google Geocoding API provider.

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::Client;
use serde::Deserialize;

use super::GeocodeProvider;
use crate::error::GeocodeError;
use crate::types::{GeocodeQuery, GeocodeResult};

const DEFAULT_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeHit>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeHit {
    #[serde(default)]
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

/// Client for the Google Geocoding JSON API.
///
/// Use [`GoogleGeocoder::new`] for production or
/// [`GoogleGeocoder::with_base_url`] to point at a mock server in tests.
pub struct GoogleGeocoder {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl std::fmt::Debug for GoogleGeocoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleGeocoder")
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl GoogleGeocoder {
    /// Creates a geocoder pointed at the production endpoint. A missing key
    /// is allowed here; lookups then fail with
    /// [`GeocodeError::MissingApiKey`].
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        api_key: Option<String>,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, GeocodeError> {
        Self::with_base_url(api_key, timeout_secs, user_agent, DEFAULT_ENDPOINT)
    }

    /// Creates a geocoder with a custom endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the `reqwest::Client` cannot be built.
    pub fn with_base_url(
        api_key: Option<String>,
        timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
    ) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            endpoint: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn build_url(&self, address: &str, key: &str) -> String {
        format!(
            "{}?address={}&key={}",
            self.endpoint,
            utf8_percent_encode(address, NON_ALPHANUMERIC),
            utf8_percent_encode(key, NON_ALPHANUMERIC)
        )
    }
}

impl GeocodeProvider for GoogleGeocoder {
    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn lookup(&self, query: &GeocodeQuery) -> Result<GeocodeResult, GeocodeError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(GeocodeError::MissingApiKey);
        };

        let url = self.build_url(query.as_str(), key);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body = response.text().await?;
        let parsed: GeocodeResponse =
            serde_json::from_str(&body).map_err(|e| GeocodeError::Deserialize {
                context: format!("geocode({query})"),
                source: e,
            })?;

        match parsed.status.as_str() {
            "OK" => parsed
                .results
                .into_iter()
                .next()
                .map(|hit| GeocodeResult {
                    lat: hit.geometry.location.lat,
                    lon: hit.geometry.location.lng,
                    formatted: hit.formatted_address,
                })
                .ok_or_else(|| GeocodeError::NoResult {
                    query: query.to_string(),
                }),
            "ZERO_RESULTS" => Err(GeocodeError::NoResult {
                query: query.to_string(),
            }),
            other => {
                tracing::debug!(
                    status = other,
                    message = parsed.error_message.as_deref().unwrap_or_default(),
                    "geocoding provider rejected request"
                );
                Err(GeocodeError::Upstream {
                    query: query.to_string(),
                    status: other.to_string(),
                })
            }
        }
    }
}
