//! snipflow Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Stream transports
//! - Runtime specifics
//!
//! Everything here describes a unit of work (lint, format, test) on a stored
//! snippet and the events that carry it through the request/result streams.

pub mod error;
pub mod event;
pub mod ids;
pub mod rule;
pub mod snippet;
pub mod task;

// Re-export commonly used types
pub use error::CoreError;
pub use event::{
    FormatResult, LintResult, RequestEvent, ResultEvent, TestCaseOutcome, TestResult, Violation,
};
pub use ids::{RequestId, SessionId, SnippetId};
pub use rule::RuleKind;
pub use snippet::{Page, SnippetSummary};
pub use task::{TaskContext, TaskKind};
