use thiserror::Error;

/// Typed store failures enabling retry and abort classification.
///
/// Only rate limits, server errors and connection failures are worth another
/// attempt. Authentication failures and malformed payloads end the run since
/// nothing later in the run can succeed against a store that rejects us or
/// speaks an unknown protocol.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Authentication rejected (HTTP {status}) for {url}")]
    Authentication { status: u16, url: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited by {0}")]
    RateLimited(String),

    #[error("Server error {status} from {url}")]
    Transient { status: u16, url: String },

    #[error("Connection error for {url}: {source}")]
    Connection {
        source: reqwest::Error,
        url: String,
    },

    #[error("Unexpected response from {url}: {reason}")]
    UnexpectedResponse { url: String, reason: String },

    #[error("Local I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Classify a non-success HTTP status returned for `url`.
    pub fn from_status(status: u16, url: &str) -> Self {
        match status {
            401 | 403 => StoreError::Authentication {
                status,
                url: url.to_string(),
            },
            404 | 410 => StoreError::NotFound(url.to_string()),
            429 => StoreError::RateLimited(url.to_string()),
            s if s >= 500 => StoreError::Transient {
                status,
                url: url.to_string(),
            },
            _ => StoreError::UnexpectedResponse {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            },
        }
    }

    pub fn unexpected(url: &str, reason: impl std::fmt::Display) -> Self {
        StoreError::UnexpectedResponse {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::RateLimited(_)
            | StoreError::Transient { .. }
            | StoreError::Connection { .. } => true,
            StoreError::Authentication { .. }
            | StoreError::NotFound(_)
            | StoreError::UnexpectedResponse { .. }
            | StoreError::Io(_) => false,
        }
    }

    /// Whether this error must abort the whole run instead of a single unit.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::Authentication { .. } | StoreError::UnexpectedResponse { .. }
        )
    }
}
