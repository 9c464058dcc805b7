//! Batch error types
//!
//! Error codes:
//! - BATCH_EXECUTION_FAILED (ERROR severity)
//! - BATCH_UNKNOWN_ROOT_TYPE (ERROR severity)
//! - BATCH_DISCARDED (FATAL severity)
//! - BATCH_CONFIG_INVALID (FATAL severity)

use std::fmt;

use thiserror::Error;

use super::request::RootType;

/// Severity levels for batch errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The failing operation is rejected, the transaction may roll back and continue
    Error,
    /// Caller misuse, the owning transaction cannot continue
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Failure reported by the store substrate.
///
/// `succeeded` counts the statements of the submitted batch that the store
/// completed before it failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("store rejected statement after {succeeded} succeeded: {message}")]
pub struct StoreError {
    pub succeeded: usize,
    pub message: String,
}

impl StoreError {
    pub fn new(succeeded: usize, message: impl Into<String>) -> Self {
        Self {
            succeeded,
            message: message.into(),
        }
    }
}

/// Batch errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// The store rejected (or partially executed) a batched group.
    #[error("Batch execution failed on '{statement}' after {succeeded} statements: {message}")]
    Execution {
        statement: String,
        succeeded: usize,
        message: String,
    },

    #[error("No descriptor registered for root type '{0}'")]
    UnknownRootType(RootType),

    #[error("Transaction has ended; batch is discarded")]
    Discarded,

    #[error("Invalid batch configuration: {0}")]
    Config(String),
}

impl BatchError {
    /// Wrap a store failure, adding the statements known to have completed
    /// earlier in the same flush.
    pub fn execution(statement: impl Into<String>, earlier: usize, source: StoreError) -> Self {
        Self::Execution {
            statement: statement.into(),
            succeeded: earlier + source.succeeded,
            message: source.message,
        }
    }

    /// Count `earlier` more statements as completed before this failure.
    pub fn after(self, earlier: usize) -> Self {
        match self {
            Self::Execution {
                statement,
                succeeded,
                message,
            } => Self::Execution {
                statement,
                succeeded: succeeded + earlier,
                message,
            },
            other => other,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stable string code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Execution { .. } => "BATCH_EXECUTION_FAILED",
            Self::UnknownRootType(_) => "BATCH_UNKNOWN_ROOT_TYPE",
            Self::Discarded => "BATCH_DISCARDED",
            Self::Config(_) => "BATCH_CONFIG_INVALID",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Execution { .. } | Self::UnknownRootType(_) => Severity::Error,
            Self::Discarded | Self::Config(_) => Severity::Fatal,
        }
    }

    /// Statements known to have succeeded before the failure, if this is an
    /// execution failure.
    pub fn succeeded(&self) -> Option<usize> {
        match self {
            Self::Execution { succeeded, .. } => Some(*succeeded),
            _ => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Result type for batch operations
pub type BatchResult<T> = Result<T, BatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = BatchError::execution("insert into a", 0, StoreError::new(1, "boom"));
        assert_eq!(err.code(), "BATCH_EXECUTION_FAILED");
        assert_eq!(BatchError::Discarded.code(), "BATCH_DISCARDED");
        assert_eq!(
            BatchError::UnknownRootType(RootType::new("a")).code(),
            "BATCH_UNKNOWN_ROOT_TYPE"
        );
        assert_eq!(BatchError::config("x").code(), "BATCH_CONFIG_INVALID");
    }

    #[test]
    fn test_execution_adds_earlier_successes() {
        let err = BatchError::execution("update b", 3, StoreError::new(2, "constraint"));
        assert_eq!(err.succeeded(), Some(5));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_after_shifts_only_execution_failures() {
        let err = BatchError::execution("update b", 0, StoreError::new(1, "x")).after(4);
        assert_eq!(err.succeeded(), Some(5));
        assert_eq!(BatchError::Discarded.after(4), BatchError::Discarded);
    }

    #[test]
    fn test_misuse_is_fatal() {
        assert!(BatchError::Discarded.is_fatal());
        assert_eq!(BatchError::Discarded.severity(), Severity::Fatal);
    }

    #[test]
    fn test_display_contains_statement_and_count() {
        let err = BatchError::execution("delete from c", 1, StoreError::new(0, "locked"));
        let display = err.to_string();
        assert!(display.contains("delete from c"));
        assert!(display.contains("after 1 statements"));
        assert!(display.contains("locked"));
    }
}
