//! Error Types

use thiserror::Error;

/// Errors raised while parsing or validating core types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Write pattern name is not one of the four known patterns.
    #[error("unknown write pattern: {0}")]
    UnknownPattern(String),

    /// Direction is neither `SRC` nor `DST`.
    #[error("unknown validation direction: {0}")]
    UnknownDirection(String),

    /// Inconsistency kind is not recognised.
    #[error("unknown inconsistency kind: {0}")]
    UnknownKind(String),
}

/// Type alias for Results using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            CoreError::UnknownPattern("both".to_string()).to_string(),
            "unknown write pattern: both"
        );
        assert_eq!(
            CoreError::UnknownDirection("UP".to_string()).to_string(),
            "unknown validation direction: UP"
        );
    }
}
