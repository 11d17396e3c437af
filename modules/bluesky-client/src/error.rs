use thiserror::Error;

pub type Result<T> = std::result::Result<T, BlueskyError>;

#[derive(Debug, Error)]
pub enum BlueskyError {
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx XRPC answer. `error` is the XRPC error name when the body had one
    /// (e.g. `ExpiredToken`, `InvalidRequest`).
    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        error: Option<String>,
        message: String,
    },

    #[error("No active session")]
    NoSession,

    #[error("Parse error: {0}")]
    Parse(String),
}

impl BlueskyError {
    pub fn xrpc_error(&self) -> Option<&str> {
        match self {
            BlueskyError::Api { error, .. } => error.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BlueskyError {
    fn from(err: reqwest::Error) -> Self {
        BlueskyError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for BlueskyError {
    fn from(err: serde_json::Error) -> Self {
        BlueskyError::Parse(err.to_string())
    }
}
