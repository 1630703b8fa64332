//! Stream transport errors.

use thiserror::Error;

/// Errors raised by a stream transport.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Read against a group that was never created.
    #[error("Consumer group '{group}' does not exist on stream '{stream}'")]
    UnknownGroup { stream: String, group: String },

    /// Event could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport state is unusable.
    #[error("Stream transport unavailable: {0}")]
    Unavailable(String),
}
