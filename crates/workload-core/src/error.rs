//! Error types for the workload engine.

use std::fmt;
use thiserror::Error;

/// Errors that abort a run before or while it is being set up.
#[derive(Error, Debug)]
pub enum WorkloadError {
    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The backend could not be reached at startup.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// A worker task panicked or was aborted.
    #[error("Worker error: {0}")]
    Worker(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A raw backend failure as seen across the connection provider seam.
///
/// Drivers convert their own error types into this so the classifier can
/// inspect the message and server code without knowing the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbError {
    /// Human-readable error text, as reported by the driver.
    pub message: String,
    /// Server error code (e.g. MySQL `1290`), when the server sent one.
    pub code: Option<u16>,
}

impl DbError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for DbError {}
