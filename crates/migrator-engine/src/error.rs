//! Engine error types.

use migrator_store::StoreError;
use thiserror::Error;

/// Errors that stop a validation run.
///
/// Transient store failures never surface here; the scan loops retry or
/// skip them.
#[derive(Debug, Clone, Error)]
pub enum ValidateError {
    /// The validator was built with unusable parameters.
    #[error("Invalid validator configuration: {0}")]
    InvalidConfig(String),

    /// A store reported that it cannot serve the scan at all.
    #[error("Store {store} cannot be validated: {source}")]
    Store {
        store: String,
        #[source]
        source: StoreError,
    },
}

impl ValidateError {
    /// Returns true if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        match self {
            Self::InvalidConfig(_) => true,
            Self::Store { source, .. } => source.is_configuration(),
        }
    }
}

/// Errors returned by a single repair.
#[derive(Debug, Clone, Error)]
pub enum FixError {
    /// A store call failed.
    #[error("Failed to {op} record {id} in {store}: {source}")]
    Store {
        op: &'static str,
        id: i64,
        store: String,
        #[source]
        source: StoreError,
    },

    /// The repair did not finish before its deadline.
    #[error("Repair of record {id} timed out")]
    Timeout { id: i64 },
}

impl FixError {
    /// Returns true if redelivering the event may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store { source, .. } => source.is_transient(),
            Self::Timeout { .. } => true,
        }
    }
}

/// Errors returned by scheduler operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The requested run cannot be configured; no run was started.
    #[error("Invalid run configuration: {0}")]
    InvalidConfig(String),

    /// The scheduler no longer accepts runs.
    #[error("Scheduler is shut down")]
    ShutDown,
}

impl From<ValidateError> for SchedulerError {
    fn from(err: ValidateError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_error_classification() {
        let err = ValidateError::Store {
            store: "source".to_string(),
            source: StoreError::invalid_configuration("column utime missing"),
        };
        assert!(err.is_config_error());

        let err = ValidateError::Store {
            store: "source".to_string(),
            source: StoreError::database("deadlock"),
        };
        assert!(!err.is_config_error());
        assert!(ValidateError::InvalidConfig("batch".to_string()).is_config_error());
    }

    #[test]
    fn test_fix_error_transient() {
        assert!(FixError::Timeout { id: 1 }.is_transient());

        let err = FixError::Store {
            op: "upsert",
            id: 1,
            store: "target".to_string(),
            source: StoreError::database("duplicate key"),
        };
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "Failed to upsert record 1 in target: database error: duplicate key"
        );
    }

    #[test]
    fn test_scheduler_error_from_validate_error() {
        let err: SchedulerError = ValidateError::InvalidConfig("batch_size must be positive".into()).into();
        assert_eq!(
            err,
            SchedulerError::InvalidConfig(
                "Invalid validator configuration: batch_size must be positive".to_string()
            )
        );
    }
}
