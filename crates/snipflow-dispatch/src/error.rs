//! Dispatch errors.

use thiserror::Error;

use snipflow_core::{CoreError, RuleKind, TaskKind};
use snipflow_engine::EngineError;
use snipflow_stream::StreamError;

/// Errors raised while submitting or handling tasks.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The task context is missing a field its kind requires.
    #[error(transparent)]
    Validation(#[from] CoreError),

    /// No strategy handles the task kind.
    #[error("No strategy registered for task kind {0}")]
    Unroutable(TaskKind),

    /// No fan-out handler reacts to the rule kind.
    #[error("No rule update handler registered for {0}")]
    NoRuleHandler(RuleKind),

    /// Publishing to or reading from a stream failed.
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// A collaborator call failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A request landed on another kind's stream.
    #[error("Expected a {expected} request, got {actual}")]
    KindMismatch { expected: TaskKind, actual: TaskKind },

    /// The blocking engine call did not complete.
    #[error("Engine task failed: {0}")]
    Join(String),
}
