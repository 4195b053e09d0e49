//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional:
//! - `NURSERY_API_URL` - Backend base URL (default: `http://localhost:5000`)
//! - `NURSERY_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `NURSERY_SEARCH_DEBOUNCE_MS` - Quiet period before a suggestion search (default: 300)
//! - `NURSERY_SEARCH_LIMIT` - Maximum suggestions requested (default: 8)
//! - `NURSERY_SESSION_FILE` - Session file path (default: `<data dir>/nursery/session.json`)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:5000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DEBOUNCE_MS: u64 = 300;
const DEFAULT_SEARCH_LIMIT: usize = 8;
const SESSION_FILE_NAME: &str = "session.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Backend base URL; API paths are joined onto it
    pub api_base_url: Url,
    /// Timeout applied to every backend request
    pub request_timeout: Duration,
    /// Suggestion search tuning
    pub search: SearchConfig,
    /// Where the persisted session lives
    pub session_file: PathBuf,
}

/// Search suggestion tuning.
#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    /// Quiet period after the last edit before a request is issued
    pub quiet_period: Duration,
    /// Maximum number of suggestions requested
    pub limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_base_url = parse_base_url(
            "NURSERY_API_URL",
            &lookup("NURSERY_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        )?;
        let request_timeout = Duration::from_secs(parse_or_default(
            &lookup,
            "NURSERY_REQUEST_TIMEOUT_SECS",
            DEFAULT_TIMEOUT_SECS,
        )?);
        let search = SearchConfig {
            quiet_period: Duration::from_millis(parse_or_default(
                &lookup,
                "NURSERY_SEARCH_DEBOUNCE_MS",
                DEFAULT_DEBOUNCE_MS,
            )?),
            limit: parse_or_default(&lookup, "NURSERY_SEARCH_LIMIT", DEFAULT_SEARCH_LIMIT)?,
        };
        let session_file = lookup("NURSERY_SESSION_FILE")
            .map_or_else(default_session_file, PathBuf::from);

        Ok(Self {
            api_base_url,
            request_timeout,
            search,
            session_file,
        })
    }

    /// Configuration pointing at `api_base_url` with every other setting at its default.
    #[must_use]
    pub fn for_base_url(api_base_url: Url) -> Self {
        Self {
            api_base_url: with_trailing_slash(api_base_url),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            search: SearchConfig::default(),
            session_file: default_session_file(),
        }
    }

    /// Replace the backend base URL, keeping every other setting.
    #[must_use]
    pub fn with_base_url(mut self, api_base_url: Url) -> Self {
        self.api_base_url = with_trailing_slash(api_base_url);
        self
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the base URL, normalizing it to end with `/` so joins keep its path.
fn parse_base_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url =
        Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    Ok(with_trailing_slash(url))
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_or_default<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

fn default_session_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("nursery")
        .join(SESSION_FILE_NAME)
}
