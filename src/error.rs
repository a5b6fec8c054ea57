//! Error types for the retrieve-and-rank client.

use std::time::Duration;
use thiserror::Error;

/// Failures raised below the HTTP status line: nothing usable came back.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Request did not complete within the configured timeout.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// Could not connect (DNS, refused connection, TLS handshake).
    #[error("connection failed: {0}")]
    Connect(String),

    /// Request could not be built or the response body could not be read.
    #[error("request failed: {0}")]
    Request(String),

    /// Local I/O while streaming a response to disk.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Get a short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Connect(_) => "connect",
            Self::Request(_) => "request",
            Self::Io(_) => "io",
        }
    }
}

/// Errors returned by every client operation.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The service answered with anything other than 200.
    #[error("unexpected status code {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Input rejected before any request was sent.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A 200 response lacked a field the operation depends on.
    #[error("missing field `{field}` in {context}")]
    MissingField {
        field: &'static str,
        context: &'static str,
    },

    /// A 200 response body was not valid JSON.
    #[error("invalid response body: {0}")]
    Decode(String),

    /// The index update endpoint answered 200 but reported a non-zero status.
    #[error("index failed with status {status}: {body}")]
    Indexing { status: i64, body: String },

    /// Local file access (ground truth, zip upload, training data output).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The ground-truth table could not be parsed.
    #[error("ground truth error: {0}")]
    GroundTruth(String),

    /// Configuration error (missing credentials, bad url, etc.).
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Create an HTTP status error.
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a missing field error.
    pub fn missing_field(field: &'static str, context: &'static str) -> Self {
        Self::MissingField { field, context }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Create a ground truth error.
    pub fn ground_truth(message: impl Into<String>) -> Self {
        Self::GroundTruth(message.into())
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// HTTP status code, when the service produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Get a short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport(e) => e.code(),
            Self::HttpStatus { .. } => "http_status",
            Self::Validation(_) => "validation",
            Self::MissingField { .. } => "missing_field",
            Self::Decode(_) => "decode",
            Self::Indexing { .. } => "indexing",
            Self::Io(_) => "io",
            Self::GroundTruth(_) => "ground_truth",
            Self::Config(_) => "config",
        }
    }
}
