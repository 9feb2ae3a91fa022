//! Upstream feed transport.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;

use crate::error::FetchError;

/// Status and raw body of one upstream GET.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The HTTP capability the pipeline needs from its host.
///
/// Non-2xx statuses are returned as responses, not errors; only transport
/// failures are errors.
pub trait HttpGet: Send + Sync {
    fn get(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<HttpResponse, FetchError>> + Send;
}

/// [`HttpGet`] backed by `reqwest`. Redirects are followed.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    /// Build a fetcher with a request timeout and `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, FetchError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| FetchError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| FetchError::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

impl HttpGet for ReqwestFetcher {
    async fn get(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<HttpResponse, FetchError> {
        let headers = header_map(headers)?;
        let response = self.client.get(url).headers(headers).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        tracing::debug!(url, status, bytes = body.len(), "upstream feed fetched");
        Ok(HttpResponse { status, body })
    }
}

/// Whether a 2xx body is actually an anti-bot interstitial rather than the
/// feed.
pub(crate) fn looks_like_bot_challenge(body: &[u8]) -> bool {
    let head = &body[..body.len().min(4096)];
    let lowered = String::from_utf8_lossy(head).to_ascii_lowercase();
    lowered.contains("attention required! | cloudflare")
        || lowered.contains("/cdn-cgi/challenge-platform/")
        || lowered.contains("cf-chl-")
        || (lowered.contains("just a moment...") && lowered.contains("<html"))
}
