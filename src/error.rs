//! genvault error types

use std::fmt::Display;
use thiserror::Error;

/// genvault error type
#[derive(Error, Debug)]
pub enum Error {
    /// Application configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// A requestor configuration field was rejected
    #[error("Invalid configuration: `{field}` {reason}")]
    InvalidConfiguration { field: String, reason: String },

    /// The generator has no credentials for its provider
    #[error("Missing credentials for provider '{0}'")]
    MissingCredentials(String),

    /// Network failure reported by the generator layer
    #[error("Network error: {0}")]
    Network(String),

    /// The generator returned a payload of the wrong shape
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Reading, writing, or stat-ing a stored file failed
    #[error("File operation failed: {0}")]
    FileOperation(String),

    /// Neither inline content nor a file reference is available
    #[error("No content available: {0}")]
    MissingContent(String),

    /// Binary payload did not match its declared layout
    #[error("Decode error: {0}")]
    Decode(String),

    /// A value could not be encoded in the selected format
    #[error("Encode error: {0}")]
    Encode(String),

    /// A reserved serialization format was selected
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// The request was cancelled before it completed
    #[error("Request cancelled: {0}")]
    Cancelled(String),

    /// Requestor registration failed
    #[error("Registry error: {0}")]
    Registry(String),

    /// Record store operation failed
    #[error("Store error: {0}")]
    Store(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Configuration error for a bounded field, naming the value and the
    /// inclusive valid range.
    pub fn out_of_range(
        field: impl Into<String>,
        value: impl Display,
        min: impl Display,
        max: impl Display,
    ) -> Self {
        Error::InvalidConfiguration {
            field: field.into(),
            reason: format!("= {} is outside the valid range [{}, {}]", value, min, max),
        }
    }

    /// Configuration error for a field that is not range-bounded.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Only transport failures are worth retrying; everything else is
    /// deterministic for the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}

/// Result type alias for genvault operations
pub type Result<T> = std::result::Result<T, Error>;
