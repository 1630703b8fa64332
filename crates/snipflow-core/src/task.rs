//! Task kinds and the per-call task context.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CoreError, SnippetId};

/// Kind of asynchronous work that can be requested for a snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    /// Static analysis against the owner's lint rules.
    Lint,
    /// Reformat against the owner's format rules.
    Format,
    /// Run the snippet's stored test cases.
    Test,
}

impl TaskKind {
    /// Every task kind, in routing order.
    pub const ALL: [TaskKind; 3] = [TaskKind::Lint, TaskKind::Format, TaskKind::Test];

    /// Lowercase name used in stream names and URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lint => "lint",
            Self::Format => "format",
            Self::Test => "test",
        }
    }

    /// Whether submissions of this kind need a language and an owner.
    pub fn requires_owner_and_language(&self) -> bool {
        matches!(self, Self::Lint | Self::Format)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lint => "LINT",
            Self::Format => "FORMAT",
            Self::Test => "TEST",
        })
    }
}

impl FromStr for TaskKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lint" => Ok(Self::Lint),
            "format" => Ok(Self::Format),
            "test" => Ok(Self::Test),
            _ => Err(CoreError::UnknownTaskKind(s.to_string())),
        }
    }
}

/// Everything a strategy needs to submit one unit of work.
///
/// Built fresh for every submission and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskContext {
    /// Snippet the work is about.
    pub snippet_id: SnippetId,

    /// Content store container holding the source.
    pub content_container: String,

    /// Content store key of the source.
    pub content_key: String,

    /// Language version the snippet targets.
    pub version: String,

    /// Owner whose rule configuration applies.
    pub user_id: Option<String>,

    /// Language of the snippet.
    pub language_id: Option<String>,
}

impl TaskContext {
    /// Create a context without owner or language.
    pub fn new(
        snippet_id: SnippetId,
        content_container: impl Into<String>,
        content_key: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            snippet_id,
            content_container: content_container.into(),
            content_key: content_key.into(),
            version: version.into(),
            user_id: None,
            language_id: None,
        }
    }

    /// Builder method to set the owner.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Builder method to set the language.
    pub fn with_language(mut self, language_id: impl Into<String>) -> Self {
        self.language_id = Some(language_id.into());
        self
    }

    /// Check that every field the given kind requires is present.
    pub fn validate_for(&self, kind: TaskKind) -> Result<(), CoreError> {
        if self.content_container.trim().is_empty() {
            return Err(CoreError::MissingField {
                kind,
                field: "content_container",
            });
        }
        if self.content_key.trim().is_empty() {
            return Err(CoreError::MissingField {
                kind,
                field: "content_key",
            });
        }
        if kind.requires_owner_and_language() {
            if is_blank(&self.language_id) {
                return Err(CoreError::MissingField {
                    kind,
                    field: "language_id",
                });
            }
            if is_blank(&self.user_id) {
                return Err(CoreError::MissingField {
                    kind,
                    field: "user_id",
                });
            }
        }
        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}
