//! CLI-specific error types
//!
//! All CLI errors end the process with a non-zero status.

use std::fmt;
use std::io;

use crate::batch::BatchError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// Script file unreadable or malformed
    ScriptError,
    /// Batch engine rejected an operation outside the replayed script
    BatchFailed,
    /// I/O error (stdout)
    IoError,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "GRAPHBATCH_CLI_CONFIG_ERROR",
            Self::ScriptError => "GRAPHBATCH_CLI_SCRIPT_ERROR",
            Self::BatchFailed => "GRAPHBATCH_CLI_BATCH_ERROR",
            Self::IoError => "GRAPHBATCH_CLI_IO_ERROR",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// Script error on a 1-based line
    pub fn script_error(line: usize, msg: impl Into<String>) -> Self {
        Self::new(
            CliErrorCode::ScriptError,
            format!("line {}: {}", line, msg.into()),
        )
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<BatchError> for CliError {
    fn from(e: BatchError) -> Self {
        let message = format!("{}: {}", e.code(), e);
        match e {
            BatchError::Config(_) => Self::config_error(message),
            _ => Self::new(CliErrorCode::BatchFailed, message),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes_code() {
        let err = CliError::script_error(3, "unknown op");
        assert_eq!(err.code(), &CliErrorCode::ScriptError);
        assert_eq!(
            err.to_string(),
            "GRAPHBATCH_CLI_SCRIPT_ERROR: line 3: unknown op"
        );
    }

    #[test]
    fn test_batch_errors_keep_their_code() {
        let config = CliError::from(BatchError::config("batch_size must be > 0"));
        assert_eq!(config.code(), &CliErrorCode::ConfigError);
        assert!(config.message().starts_with("BATCH_CONFIG_INVALID"));

        let discarded = CliError::from(BatchError::Discarded);
        assert_eq!(discarded.code(), &CliErrorCode::BatchFailed);
        assert_eq!(discarded.code_str(), "GRAPHBATCH_CLI_BATCH_ERROR");
        assert!(discarded.message().starts_with("BATCH_DISCARDED"));
    }
}
