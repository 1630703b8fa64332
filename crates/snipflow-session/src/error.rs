//! Session errors.

use thiserror::Error;

use snipflow_core::SessionId;
use snipflow_engine::EngineError;

#[derive(Debug, Error)]
pub enum SessionError {
    /// `InitExecution` arrived without a required field.
    #[error("InitExecution is missing '{0}'")]
    MissingInitField(&'static str),

    /// No session is registered under the id.
    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    /// A message arrived that the current state does not accept.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// The session's input slot no longer has a reader.
    #[error("Input slot closed")]
    SlotClosed,

    /// The session was cancelled or disconnected.
    #[error("Session cancelled")]
    Cancelled,

    /// Fetching the source or running the engine failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The worker task did not complete.
    #[error("Worker failed: {0}")]
    Worker(String),

    /// A frame could not be encoded or decoded.
    #[error("Invalid message: {0}")]
    Json(#[from] serde_json::Error),
}
