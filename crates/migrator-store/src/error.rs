//! Store error types
//!
//! Errors carry a transient/configuration classification so the validator
//! can decide between retrying at the same cursor and stopping the run.

use thiserror::Error;

/// Error returned by a store adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The call did not complete before its deadline.
    #[error("store call timed out")]
    Timeout,

    /// The store cannot be reached right now.
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    /// The store rejected or failed the statement.
    #[error("database error: {message}")]
    Database { message: String },

    /// The store does not match what the adapter expects (missing table,
    /// missing column, unknown type). Retrying cannot help.
    #[error("invalid store configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl StoreError {
    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Deadline expiry.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Errors that may clear up on their own.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Unavailable { .. })
    }

    /// Errors that no amount of retrying will fix.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration { .. })
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
