use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::CollectError;

pub const DEFAULT_RATE_LIMIT: f64 = 1.0;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STORE_DIR: &str = "db";

/// The four developer credentials of the Twitter/X legacy API.
#[derive(Clone)]
pub struct TwitterCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl std::fmt::Debug for TwitterCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitterCredentials")
            .field("api_key", &redact(&self.api_key))
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct BlueskyCredentials {
    pub handle: String,
    pub password: String,
}

impl std::fmt::Debug for BlueskyCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlueskyCredentials")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Application configuration loaded from environment variables.
///
/// Provider credentials are optional: a provider whose credentials are absent is
/// simply not collected from.
#[derive(Debug, Clone)]
pub struct Config {
    pub twitter: Option<TwitterCredentials>,
    pub bluesky: Option<BlueskyCredentials>,

    pub twitter_api_base: Option<String>,
    pub bluesky_service: Option<String>,

    /// Outbound requests per second, per collector instance.
    pub rate_limit: f64,
    pub request_timeout: Duration,

    pub store_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            twitter: None,
            bluesky: None,
            twitter_api_base: None,
            bluesky_service: None,
            rate_limit: DEFAULT_RATE_LIMIT,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, CollectError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup. Used by tests so they
    /// don't have to touch the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CollectError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let twitter = match (
            get("TWITTER_API_KEY"),
            get("TWITTER_API_KEY_SECRET"),
            get("TWITTER_ACCESS_TOKEN"),
            get("TWITTER_ACCESS_TOKEN_SECRET"),
        ) {
            (Some(api_key), Some(api_secret), Some(access_token), Some(access_token_secret)) => {
                Some(TwitterCredentials {
                    api_key,
                    api_secret,
                    access_token,
                    access_token_secret,
                })
            }
            (None, None, None, None) => None,
            _ => {
                warn!("Twitter credentials are only partially set; Twitter collection disabled");
                None
            }
        };

        let bluesky = match (get("BLUESKY_HANDLE"), get("BLUESKY_PASSWORD")) {
            (Some(handle), Some(password)) => Some(BlueskyCredentials { handle, password }),
            (None, None) => None,
            _ => {
                warn!("Bluesky credentials are only partially set; Bluesky collection disabled");
                None
            }
        };

        let rate_limit = match get("POSTPULSE_RATE_LIMIT") {
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|r| r.is_finite() && *r > 0.0)
                .ok_or_else(|| {
                    CollectError::Configuration(format!(
                        "POSTPULSE_RATE_LIMIT must be a positive number, got {raw:?}"
                    ))
                })?,
            None => DEFAULT_RATE_LIMIT,
        };

        let timeout_secs = match get("POSTPULSE_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().ok().filter(|s| *s > 0).ok_or_else(|| {
                CollectError::Configuration(format!(
                    "POSTPULSE_TIMEOUT_SECS must be a positive integer, got {raw:?}"
                ))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            twitter,
            bluesky,
            twitter_api_base: get("TWITTER_API_BASE"),
            bluesky_service: get("BLUESKY_SERVICE"),
            rate_limit,
            request_timeout: Duration::from_secs(timeout_secs),
            store_dir: get("POSTPULSE_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR)),
        })
    }

    /// Log which providers are configured, without secrets.
    pub fn log_redacted(&self) {
        info!(
            twitter = self.twitter.is_some(),
            bluesky = self.bluesky.as_ref().map(|b| b.handle.as_str()).unwrap_or("-"),
            rate_limit = self.rate_limit,
            timeout_secs = self.request_timeout.as_secs(),
            store_dir = %self.store_dir.display(),
            "Configuration loaded"
        );
    }
}

fn redact(value: &str) -> String {
    let shown: String = value.chars().take(4).collect();
    format!("{shown}…")
}
