//! Error types for the test harness
//!
//! Every stage of a case returns a `TestHarnessResult`. The executor tags a
//! failure with the stage it happened in and folds it into a `CaseResult`;
//! only `ConnectionError` is allowed to abort a whole suite run.

use std::fmt;
use std::io;

/// Main error type for test harness operations
#[derive(Debug, Clone)]
pub enum TestHarnessError {
    /// Case configuration missing, malformed or incomplete
    ConfigError { message: String, path: String },

    /// Custom prepare/cleanup hook failed
    HookError { hook: String, message: String },

    /// DDL statement failed while setting up the target schema
    SchemaError { statement: String, message: String },

    /// Store query failed outside of schema setup
    StoreError { statement: String, message: String },

    /// Importer exit code differs from the expected one
    ExecutionMismatch {
        expected: i32,
        actual: i32,
        output: String,
    },

    /// Importer output is missing a required fragment or contains a forbidden one
    UnexpectedOutput {
        message: String,
        pattern: String,
        output: String,
    },

    /// Process did not finish within its time bound and was killed
    Timeout {
        operation: String,
        timeout_ms: u64,
        output: String,
    },

    /// Process could not be started or waited on
    ProcessError { command: String, message: String },

    /// Table contents differ from the expected data set
    ValidationMismatch {
        message: String,
        identifier: Option<String>,
        field: Option<usize>,
        expected: String,
        actual: String,
        mismatches: usize,
    },

    /// Store unreachable after the bounded retry loop
    ConnectionError {
        host: String,
        port: u16,
        attempts: u32,
        message: String,
    },

    /// IO error (file operations)
    IoError { message: String, path: String },
}

impl TestHarnessError {
    /// Whether this error must abort the whole suite instead of a single case
    pub fn is_fatal(&self) -> bool {
        matches!(self, TestHarnessError::ConnectionError { .. })
    }

    /// Short kind name used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            TestHarnessError::ConfigError { .. } => "ConfigError",
            TestHarnessError::HookError { .. } => "HookError",
            TestHarnessError::SchemaError { .. } => "SchemaError",
            TestHarnessError::StoreError { .. } => "StoreError",
            TestHarnessError::ExecutionMismatch { .. } => "ExecutionMismatch",
            TestHarnessError::UnexpectedOutput { .. } => "UnexpectedOutput",
            TestHarnessError::Timeout { .. } => "Timeout",
            TestHarnessError::ProcessError { .. } => "ProcessError",
            TestHarnessError::ValidationMismatch { .. } => "ValidationMismatch",
            TestHarnessError::ConnectionError { .. } => "ConnectionError",
            TestHarnessError::IoError { .. } => "IoError",
        }
    }
}

impl fmt::Display for TestHarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestHarnessError::ConfigError { message, path } => {
                if path.is_empty() {
                    write!(f, "Configuration error: {}", message)
                } else {
                    write!(f, "Configuration error in {}: {}", path, message)
                }
            }
            TestHarnessError::HookError { hook, message } => {
                write!(f, "Hook '{}' failed: {}", hook, message)
            }
            TestHarnessError::SchemaError { statement, message } => {
                write!(f, "Schema setup failed at '{}': {}", statement, message)
            }
            TestHarnessError::StoreError { statement, message } => {
                write!(f, "Store query '{}' failed: {}", statement, message)
            }
            TestHarnessError::ExecutionMismatch {
                expected,
                actual,
                output,
            } => {
                write!(
                    f,
                    "Importer exit code mismatch (expected: {}, actual: {})",
                    expected, actual
                )?;
                if !output.trim().is_empty() {
                    write!(f, "\n{}", output.trim_end())?;
                }
                Ok(())
            }
            TestHarnessError::UnexpectedOutput {
                message, pattern, ..
            } => {
                write!(f, "Unexpected importer output: {} '{}'", message, pattern)
            }
            TestHarnessError::Timeout {
                operation,
                timeout_ms,
                ..
            } => {
                write!(f, "Timeout after {}ms during '{}'", timeout_ms, operation)
            }
            TestHarnessError::ProcessError { command, message } => {
                write!(f, "Failed to run '{}': {}", command, message)
            }
            TestHarnessError::ValidationMismatch {
                message,
                expected,
                actual,
                mismatches,
                ..
            } => {
                write!(
                    f,
                    "Validation failed: {} (expected: {}, actual: {})",
                    message, expected, actual
                )?;
                if *mismatches > 1 {
                    write!(f, " [{} mismatches]", mismatches)?;
                }
                Ok(())
            }
            TestHarnessError::ConnectionError {
                host,
                port,
                attempts,
                message,
            } => {
                write!(
                    f,
                    "Could not connect to {}:{} after {} attempts: {}",
                    host, port, attempts, message
                )
            }
            TestHarnessError::IoError { message, path } => {
                write!(f, "IO error for '{}': {}", path, message)
            }
        }
    }
}

impl std::error::Error for TestHarnessError {}

impl From<io::Error> for TestHarnessError {
    fn from(err: io::Error) -> Self {
        TestHarnessError::IoError {
            message: err.to_string(),
            path: String::new(),
        }
    }
}

impl From<serde_yaml::Error> for TestHarnessError {
    fn from(err: serde_yaml::Error) -> Self {
        TestHarnessError::ConfigError {
            message: err.to_string(),
            path: String::new(),
        }
    }
}

impl From<serde_json::Error> for TestHarnessError {
    fn from(err: serde_json::Error) -> Self {
        TestHarnessError::ConfigError {
            message: err.to_string(),
            path: String::new(),
        }
    }
}

impl From<mysql_async::Error> for TestHarnessError {
    fn from(err: mysql_async::Error) -> Self {
        TestHarnessError::StoreError {
            statement: String::new(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for test harness operations
pub type TestHarnessResult<T> = Result<T, TestHarnessError>;
