//! Error handling
//!
//! Error types shared by the graph, the managed context and the stores.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Graph error type
#[derive(Error, Debug)]
pub enum GraphError {
    /// Rejected input at the API boundary (empty type, bad key, non-finite float)
    #[error("validation failed: {0}")]
    Validation(String),

    /// Node does not exist (never created, or deleted)
    #[error("node not found: {0}")]
    NotFound(String),

    /// Mutation attempted while a read snapshot is open on the same thread
    #[error("managed context is busy: {0}")]
    ContextBusy(String),

    /// Durable store failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for GraphError {
    fn from(e: std::io::Error) -> Self {
        GraphError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(e: serde_json::Error) -> Self {
        GraphError::Serialization(e.to_string())
    }
}

impl From<figment::Error> for GraphError {
    fn from(e: figment::Error) -> Self {
        GraphError::Config(e.to_string())
    }
}

impl GraphError {
    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            GraphError::Validation(_) => "VALIDATION",
            GraphError::NotFound(_) => "NOT_FOUND",
            GraphError::ContextBusy(_) => "CONTEXT_BUSY",
            GraphError::Storage(_) => "STORAGE",
            GraphError::Serialization(_) => "SERIALIZATION",
            GraphError::Config(_) => "CONFIG",
            GraphError::Io(_) => "IO",
            GraphError::Internal(_) => "INTERNAL",
        }
    }
}

/// Serializable error report, printed by the binary and logged on failed saves
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error code
    pub code: String,
    /// Error message
    pub message: String,
    /// Extra detail
    pub details: Option<String>,
}

impl ErrorReport {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
        }
    }

    /// Attach detail text
    pub fn with_details(mut self, details: &str) -> Self {
        self.details = Some(details.to_string());
        self
    }
}

impl From<&GraphError> for ErrorReport {
    fn from(err: &GraphError) -> Self {
        ErrorReport::new(err.code(), &err.to_string())
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(GraphError::Validation("x".into()).code(), "VALIDATION");
        assert_eq!(GraphError::ContextBusy("x".into()).code(), "CONTEXT_BUSY");
        assert_eq!(GraphError::Storage("x".into()).code(), "STORAGE");
    }

    #[test]
    fn test_error_report_from_error() {
        let err = GraphError::NotFound("entity 42".into());
        let report = ErrorReport::from(&err).with_details("deleted before save");

        assert_eq!(report.code, "NOT_FOUND");
        assert_eq!(report.message, "node not found: entity 42");
        assert_eq!(report.details.as_deref(), Some("deleted before save"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: GraphError = io.into();
        assert!(matches!(err, GraphError::Io(_)));
    }
}
