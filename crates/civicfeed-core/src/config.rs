use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Thirty days, the default lifetime of a cached geocode result.
const DEFAULT_GEOCODE_CACHE_TTL_SECS: &str = "2592000";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does not load `.env` files. Use it from tests
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a pure
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let env = parse_environment(&or_default("CIVICFEED_ENV", "development"))?;
    let log_level = or_default("CIVICFEED_LOG_LEVEL", "info");
    let sources_path = PathBuf::from(or_default(
        "CIVICFEED_SOURCES_PATH",
        "./config/sources.yaml",
    ));
    let geocode_api_key = optional("GEOCODE_API_KEY");
    let geocode_base_url = optional("CIVICFEED_GEOCODE_BASE_URL");

    let geocode_cache_ttl_secs = parse_u64(
        "CIVICFEED_GEOCODE_CACHE_TTL_SECS",
        DEFAULT_GEOCODE_CACHE_TTL_SECS,
    )?;
    let geocode_concurrency = parse_usize("CIVICFEED_GEOCODE_CONCURRENCY", "5")?;
    if geocode_concurrency == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "CIVICFEED_GEOCODE_CONCURRENCY".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let fetch_timeout_secs = parse_u64("CIVICFEED_FETCH_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("CIVICFEED_USER_AGENT", "civicfeed/0.1 (incident-ingest)");

    Ok(AppConfig {
        env,
        log_level,
        sources_path,
        geocode_api_key,
        geocode_base_url,
        geocode_cache_ttl_secs,
        geocode_concurrency,
        fetch_timeout_secs,
        user_agent,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "CIVICFEED_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
