use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Store query failed: {0}")]
    Query(String),

    #[error("Query generation failed: {0}")]
    Generation(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Upstream failures that may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::RateLimited(_) | Error::Network(_))
    }

    /// Classify a failed HTTP response; unrecognised statuses go to `other`.
    pub fn from_status(status: u16, body: &str, other: fn(String) -> Error) -> Error {
        let msg = format!("HTTP {status}: {}", body.trim());
        match status {
            401 | 403 => Error::Auth(msg),
            429 => Error::RateLimited(msg),
            500..=599 => Error::Network(msg),
            _ => other(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
