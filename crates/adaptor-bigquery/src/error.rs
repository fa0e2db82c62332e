//! Errors raised by the collaborators behind each operation
//!
//! Collaborators return [`ConnectorError`]; operations convert it into
//! [`AdaptorError`] with `?` when they hand the failure back to the job.

use adaptor_common::AdaptorError;
use serde_json::Value;
use thiserror::Error;

/// Result type alias for collaborator calls
pub type Result<T> = std::result::Result<T, ConnectorError>;

#[derive(Error, Debug)]
pub enum ConnectorError {
    /// Request could not be sent or the response could not be read
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a status the operation does not accept
    #[error("Server responded with {status}: {message}")]
    Status {
        status: u16,
        message: String,
        url: String,
    },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Archive entry whose path would land outside the destination
    #[error("Refusing to extract '{0}': path escapes the destination directory")]
    UnsafeEntry(String),

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to parse XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not sign service account token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid credentials: {0}")]
    Credentials(String),

    #[error("Invalid load options: {0}")]
    InvalidOptions(String),

    /// Load job reached `DONE` but reported errors
    #[error("Load job {job_id} failed")]
    LoadJob { job_id: String, errors: Vec<Value> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ConnectorError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::Credentials(msg.into())
    }

    pub fn invalid_options(msg: impl Into<String>) -> Self {
        Self::InvalidOptions(msg.into())
    }
}

impl From<ConnectorError> for AdaptorError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::Http(e) => match e.status() {
                Some(status) => AdaptorError::Status {
                    status: status.as_u16(),
                    message: e.to_string(),
                    url: e.url().map(|u| u.to_string()).unwrap_or_default(),
                },
                None => AdaptorError::Transport(e.to_string()),
            },
            ConnectorError::Status {
                status,
                message,
                url,
            } => AdaptorError::Status {
                status,
                message,
                url,
            },
            ConnectorError::Url(e) => AdaptorError::Transport(e.to_string()),
            ConnectorError::AlreadyExists(path) => AdaptorError::AlreadyExists { path },
            ConnectorError::Io(e) => AdaptorError::Io(e),
            ConnectorError::Zip(zip::result::ZipError::Io(e)) => AdaptorError::Io(e),
            e @ (ConnectorError::Zip(_) | ConnectorError::UnsafeEntry(_)) => {
                AdaptorError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
            },
            e @ (ConnectorError::Csv(_) | ConnectorError::Xml(_) | ConnectorError::MalformedXml(_)) => {
                AdaptorError::Parse(e.to_string())
            },
            ConnectorError::Json(e) => AdaptorError::Serialization(e),
            e @ (ConnectorError::Token(_)
            | ConnectorError::Credentials(_)
            | ConnectorError::InvalidOptions(_)
            | ConnectorError::Config(_)) => AdaptorError::Config(e.to_string()),
            ConnectorError::LoadJob { job_id, errors } => AdaptorError::LoadJob { job_id, errors },
            ConnectorError::Task(e) => AdaptorError::Operation(e.to_string()),
        }
    }
}
