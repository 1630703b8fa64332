//! Core domain errors.

use thiserror::Error;

use crate::task::TaskKind;

/// Core domain errors for snipflow.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A field required by the task kind is absent or blank.
    #[error("{kind} task requires '{field}'")]
    MissingField { kind: TaskKind, field: &'static str },

    /// Unknown task kind name.
    #[error("Unknown task kind: {0}")]
    UnknownTaskKind(String),

    /// Unknown rule kind name.
    #[error("Unknown rule kind: {0}")]
    UnknownRuleKind(String),
}
