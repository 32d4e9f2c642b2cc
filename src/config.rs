//! Client configuration parsed from environment variables.

use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_STATE_DIR: &str = ".postfeed";
pub const DEFAULT_PAGE_LIMIT: u32 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Errors produced while building a [`ClientConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("page limit must be at least 1")]
    ZeroPageLimit,

    #[error("base URL must not be empty")]
    EmptyBaseUrl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub state_dir: PathBuf,
    pub page_limit: u32,
    pub timeouts: HttpTimeouts,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            page_limit: DEFAULT_PAGE_LIMIT,
            timeouts: HttpTimeouts::default(),
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `POSTFEED_BASE_URL`: backend origin, default `http://localhost:3000`
    /// - `POSTFEED_STATE_DIR`: durable storage directory, default `.postfeed`
    /// - `POSTFEED_PAGE_LIMIT`: posts per page, default 5
    /// - `POSTFEED_REQUEST_TIMEOUT_SECS`: default 30
    /// - `POSTFEED_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error if the page limit is zero or the base URL is blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("POSTFEED_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let state_dir = std::env::var("POSTFEED_STATE_DIR").unwrap_or_else(|_| DEFAULT_STATE_DIR.to_owned());
        let page_limit = env_parse("POSTFEED_PAGE_LIMIT", DEFAULT_PAGE_LIMIT);
        let timeouts = HttpTimeouts {
            request_secs: env_parse("POSTFEED_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("POSTFEED_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        Self::build(base_url, PathBuf::from(state_dir), page_limit, timeouts)
    }

    /// Validate and normalize an explicit set of values.
    ///
    /// # Errors
    ///
    /// Returns an error if the page limit is zero or the base URL is blank.
    pub fn build(
        base_url: String,
        state_dir: PathBuf,
        page_limit: u32,
        timeouts: HttpTimeouts,
    ) -> Result<Self, ConfigError> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        if page_limit == 0 {
            return Err(ConfigError::ZeroPageLimit);
        }
        Ok(Self { base_url, state_dir, page_limit, timeouts })
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
