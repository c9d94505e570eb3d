//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `COPPERLEAF_API_URL` - Service base path (default: `http://localhost:5000/api`)
//! - `COPPERLEAF_TIMEOUT_SECS` - Fixed per-request timeout (default: 10)
//! - `COPPERLEAF_STATE_DIR` - Durable state directory (default: `.copperleaf`)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:5000/api";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STATE_DIR: &str = ".copperleaf";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base path of the storefront service, e.g. `https://shop.example.com/api`.
    pub api_base: Url,
    /// Fixed timeout applied uniformly to every request.
    pub request_timeout: Duration,
    /// Directory holding the persisted snapshot and credential key.
    pub state_dir: PathBuf,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a set variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base = get_env_or_default("COPPERLEAF_API_URL", DEFAULT_API_URL)
            .parse::<Url>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("COPPERLEAF_API_URL".to_string(), e.to_string())
            })?;
        let timeout_secs = get_env_or_default(
            "COPPERLEAF_TIMEOUT_SECS",
            &DEFAULT_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("COPPERLEAF_TIMEOUT_SECS".to_string(), e.to_string())
        })?;
        let state_dir = PathBuf::from(get_env_or_default(
            "COPPERLEAF_STATE_DIR",
            DEFAULT_STATE_DIR,
        ));

        Ok(Self {
            api_base,
            request_timeout: Duration::from_secs(timeout_secs),
            state_dir,
        })
    }

    /// Build a configuration pointing at an explicit base URL and state
    /// directory, with the default timeout. Primarily for tests.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `api_base` is not a valid URL.
    pub fn with_base(api_base: &str, state_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base: api_base.parse::<Url>().map_err(|e| {
                ConfigError::InvalidEnvVar("api_base".to_string(), e.to_string())
            })?,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            state_dir: state_dir.into(),
        })
    }
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_with_base_parses_url() {
        let config = ClientConfig::with_base("http://127.0.0.1:9000/api", "/tmp/state").unwrap();
        assert_eq!(config.api_base.as_str(), "http://127.0.0.1:9000/api");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_with_base_rejects_garbage() {
        assert!(ClientConfig::with_base("not a url", "/tmp/state").is_err());
    }
}
