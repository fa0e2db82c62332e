//! Error types for adaptor operations

use serde_json::Value;
use thiserror::Error;

/// Result type alias for adaptor operations
pub type Result<T> = std::result::Result<T, AdaptorError>;

/// Error a pipeline step fails with.
///
/// Nothing is retried below the job: whichever step produces one of these
/// fails the whole composed operation.
#[derive(Error, Debug)]
pub enum AdaptorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("File already exists: {path}")]
    AlreadyExists { path: String },

    #[error("Server responded with {status}: {message}")]
    Status {
        status: u16,
        message: String,
        url: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Load job {job_id} failed with {} error(s): {}", .errors.len(), summarize(.errors))]
    LoadJob { job_id: String, errors: Vec<Value> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation error: {0}")]
    Operation(String),
}

/// Coarse classification of [`AdaptorError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network failures and non-success HTTP statuses
    Transport,
    /// Existing files, permissions, missing directories
    Filesystem,
    /// Malformed CSV, XML or JSON input
    Parse,
    /// Warehouse load job finished with errors
    LoadJob,
    /// Invalid runtime or job configuration
    Config,
    /// Failure raised by job code itself
    Operation,
}

impl AdaptorError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an operation error
    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AdaptorError::Io(_) | AdaptorError::AlreadyExists { .. } => ErrorKind::Filesystem,
            AdaptorError::Serialization(_) | AdaptorError::Parse(_) => ErrorKind::Parse,
            AdaptorError::Status { .. } | AdaptorError::Transport(_) => ErrorKind::Transport,
            AdaptorError::LoadJob { .. } => ErrorKind::LoadJob,
            AdaptorError::Config(_) => ErrorKind::Config,
            AdaptorError::Operation(_) => ErrorKind::Operation,
        }
    }

    /// HTTP status code, when the failure came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            AdaptorError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn summarize(errors: &[Value]) -> String {
    errors
        .iter()
        .map(|e| match e.get("message").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None => e.to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}
