//! Rule configuration kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CoreError, TaskKind};

/// Kind of rule configuration a user can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleKind {
    LintRules,
    FormatRules,
}

impl RuleKind {
    /// Every rule kind.
    pub const ALL: [RuleKind; 2] = [RuleKind::LintRules, RuleKind::FormatRules];

    /// Task kind re-submitted for each snippet when these rules change.
    pub fn task_kind(&self) -> TaskKind {
        match self {
            Self::LintRules => TaskKind::Lint,
            Self::FormatRules => TaskKind::Format,
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LintRules => "LINT_RULES",
            Self::FormatRules => "FORMAT_RULES",
        })
    }
}

impl FromStr for RuleKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lint" | "lint_rules" => Ok(Self::LintRules),
            "format" | "format_rules" => Ok(Self::FormatRules),
            _ => Err(CoreError::UnknownRuleKind(s.to_string())),
        }
    }
}
