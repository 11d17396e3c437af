use thiserror::Error;

/// Result type alias for collection operations.
pub type Result<T> = std::result::Result<T, CollectError>;

/// Longest provider body excerpt carried in a [`CollectError::Provider`].
pub const BODY_EXCERPT_LEN: usize = 300;

#[derive(Debug, Clone, Error)]
pub enum CollectError {
    /// Missing or invalid credentials/settings. Raised at construction.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Login or session rejected by the provider.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Target user/handle does not exist or has no visible content.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success answer from the provider, or a transport failure
    /// (`status` is `None` when no response was received).
    #[error("Provider error (status {status:?}): {detail}")]
    Provider { status: Option<u16>, detail: String },
}

/// How a route layer should present a [`CollectError`] to end users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotConfigured,
    Unauthorized,
    NotFound,
    Upstream,
}

impl ErrorKind {
    /// Suggested HTTP status for a front-end mapping.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::NotConfigured => 503,
            ErrorKind::Unauthorized => 503,
            ErrorKind::NotFound => 404,
            ErrorKind::Upstream => 502,
        }
    }
}

impl CollectError {
    pub fn provider(status: Option<u16>, body: &str) -> Self {
        CollectError::Provider {
            status,
            detail: excerpt(body),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CollectError::Configuration(_) => ErrorKind::NotConfigured,
            CollectError::Authentication(_) => ErrorKind::Unauthorized,
            CollectError::NotFound(_) => ErrorKind::NotFound,
            CollectError::Provider { .. } => ErrorKind::Upstream,
        }
    }

    /// Message safe to show end users. Never includes provider bodies.
    pub fn public_message(&self) -> String {
        match self {
            CollectError::Configuration(_) => "This provider is not configured on the server.".into(),
            CollectError::Authentication(_) => {
                "The server could not authenticate with this provider.".into()
            }
            CollectError::NotFound(target) => format!("'{target}' not found or has no public posts."),
            CollectError::Provider { .. } => "The upstream provider failed. Try again later.".into(),
        }
    }

    /// Whether the collector that produced this error should be treated as unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CollectError::Configuration(_) | CollectError::Authentication(_)
        )
    }
}

/// Per-item extraction failure. Never escapes the item parser: it is logged and
/// counted as a skipped item.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("missing field `{0}`")]
    Missing(&'static str),

    #[error("field `{field}` is not a {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("field `{0}` is empty")]
    Empty(&'static str),

    #[error("{0}")]
    Invalid(String),
}

/// Truncate a provider body to [`BODY_EXCERPT_LEN`] characters.
pub fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= BODY_EXCERPT_LEN {
        return body.to_string();
    }
    let cut: String = body.chars().take(BODY_EXCERPT_LEN).collect();
    format!("{cut}…")
}
