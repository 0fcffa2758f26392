//! Common error types for cloudstore.

use thiserror::Error;

/// Top-level error type for store operations.
///
/// The first three variants form the taxonomy callers are expected to match
/// on for control flow. Everything else is a failure that should terminate
/// the calling operation.
#[derive(Debug, Error)]
pub enum Error {
    /// Target resource, or a required parent, does not exist.
    #[error("No entry: {0}")]
    NoEntry(String),

    /// Target already exists where uniqueness is required.
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Provider reported quota exhaustion.
    #[error("Disk full: {0}")]
    DiskFull(String),

    /// Provider rejected the request with an unrecognized reason.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Transport failure or unreadable response.
    #[error("Network error: {0}")]
    Network(String),

    /// Missing, rejected, or unrefreshable credentials.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error belongs to the shared taxonomy rather than being
    /// an unclassified failure.
    pub fn is_classified(&self) -> bool {
        matches!(
            self,
            Error::NoEntry(_) | Error::DuplicateEntry(_) | Error::DiskFull(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
