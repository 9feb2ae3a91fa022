use thiserror::Error;

/// Transport-level failure talking to an upstream feed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid request header \"{name}\": {reason}")]
    InvalidHeader { name: String, reason: String },
}

/// Failure resolving one address to coordinates.
///
/// The pipeline swallows these per query; only [`GeocodeError::MissingApiKey`]
/// is fatal, and only for sources that need geocoding.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("no geocoding API key configured")]
    MissingApiKey,

    #[error("no geocode result for \"{query}\"")]
    NoResult { query: String },

    #[error("geocoding provider returned status {status} for \"{query}\"")]
    Upstream { query: String, status: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Fatal failure of one pipeline invocation.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("upstream fetch failed for {url}: {source}")]
    UpstreamFetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    UpstreamStatus { status: u16, url: String },

    #[error("upstream {url} served a bot challenge page instead of the feed")]
    UpstreamChallenge { url: String },

    #[error("source '{slug}' requires geocoding: {source}")]
    Geocode {
        slug: String,
        #[source]
        source: GeocodeError,
    },
}
