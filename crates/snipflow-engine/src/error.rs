//! Error types for collaborator calls.

use thiserror::Error;

/// Errors raised by the content store, the metadata stores, or the language engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No content stored at the given location.
    #[error("Content not found: {container}/{key}")]
    NotFound { container: String, key: String },

    /// Content key escapes its container.
    #[error("Invalid content key: {0}")]
    InvalidKey(String),

    /// Filesystem or pipe failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP failure talking to the catalog service.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Catalog service answered with a non-success status.
    #[error("Catalog returned HTTP {status} for {path}")]
    Status { status: u16, path: String },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Engine output did not follow the line protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The engine reported a failure (parse error, runtime error, ...).
    #[error("{0}")]
    Engine(String),

    /// Engine process exited unsuccessfully.
    #[error("Engine process exited with error: {0}")]
    ProcessError(String),

    /// The engine asked for more input than was supplied.
    #[error("Input requested but none left")]
    InputExhausted,

    /// Execution was cancelled by its owner.
    #[error("Execution cancelled")]
    Cancelled,
}
