pub mod app_config;
pub mod config;
pub mod place;
pub mod sources;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use place::{CanonicalPlace, FeedBatch, ScalarValue};
pub use sources::{
    load_sources, parse_sources, DisplayPolicy, FeedFormat, FieldOverrides, GeoPoint,
    SourceConfig, SourcesFile, DEFAULT_DIRECTIONAL_LABELS, DEFAULT_SANITY_RADIUS_MILES,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read sources file {path}: {source}")]
    SourcesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sources file: {0}")]
    SourcesFileParse(#[from] serde_yaml::Error),

    #[error("sources validation failed: {0}")]
    Validation(String),
}
