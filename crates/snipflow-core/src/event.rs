//! Request and result events carried by the task streams.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{RequestId, SnippetId, TaskContext, TaskKind};

/// A request for one unit of work, appended to the request stream of its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEvent {
    /// Correlation id, unique per submission.
    pub request_id: RequestId,
    /// Kind of work requested.
    pub kind: TaskKind,
    /// Snippet the work is about.
    pub snippet_id: SnippetId,
    /// Content store container holding the source.
    pub content_container: String,
    /// Content store key of the source.
    pub content_key: String,
    /// Language version.
    pub version: String,
    /// Owner whose rules apply.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Language of the snippet.
    #[serde(default)]
    pub language_id: Option<String>,
    /// Unix timestamp (milliseconds) of submission.
    pub issued_at_ms: i64,
}

impl RequestEvent {
    /// Build a request for `kind` from a context, with a fresh request id.
    pub fn from_context(kind: TaskKind, context: &TaskContext) -> Self {
        Self {
            request_id: RequestId::generate(),
            kind,
            snippet_id: context.snippet_id,
            content_container: context.content_container.clone(),
            content_key: context.content_key.clone(),
            version: context.version.clone(),
            user_id: context.user_id.clone(),
            language_id: context.language_id.clone(),
            issued_at_ms: Utc::now().timestamp_millis(),
        }
    }
}

/// Common view over the per-kind result events.
pub trait ResultEvent {
    /// Kind of work this result concludes.
    const KIND: TaskKind;

    /// Correlation id copied from the request.
    fn request_id(&self) -> &RequestId;

    /// Snippet the work was about.
    fn snippet_id(&self) -> SnippetId;

    /// Whether the work succeeded.
    fn is_success(&self) -> bool;

    /// Failure message, if the work could not be carried out.
    fn error(&self) -> Option<&str>;
}

/// One diagnostic reported by the linter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Human-readable description.
    pub message: String,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
    /// Rule that produced the diagnostic, if known.
    #[serde(default)]
    pub rule: Option<String>,
}

impl Violation {
    /// Create a violation at a position.
    pub fn new(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            rule: None,
        }
    }
}

/// Outcome of a lint request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintResult {
    pub request_id: RequestId,
    pub snippet_id: SnippetId,
    /// True when the snippet was linted and has no violations.
    pub valid: bool,
    pub violations: Vec<Violation>,
    #[serde(default)]
    pub error: Option<String>,
}

impl LintResult {
    /// Result for a completed lint run.
    pub fn completed(request: &RequestEvent, violations: Vec<Violation>) -> Self {
        Self {
            request_id: request.request_id.clone(),
            snippet_id: request.snippet_id,
            valid: violations.is_empty(),
            violations,
            error: None,
        }
    }

    /// Result for a lint run that could not be carried out.
    pub fn failed(request: &RequestEvent, error: impl Into<String>) -> Self {
        Self {
            request_id: request.request_id.clone(),
            snippet_id: request.snippet_id,
            valid: false,
            violations: Vec::new(),
            error: Some(error.into()),
        }
    }
}

impl ResultEvent for LintResult {
    const KIND: TaskKind = TaskKind::Lint;

    fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    fn snippet_id(&self) -> SnippetId {
        self.snippet_id
    }

    fn is_success(&self) -> bool {
        self.error.is_none()
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Outcome of a format request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatResult {
    pub request_id: RequestId,
    pub snippet_id: SnippetId,
    pub success: bool,
    #[serde(default)]
    pub formatted: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl FormatResult {
    /// Result carrying the formatted source.
    pub fn completed(request: &RequestEvent, formatted: String) -> Self {
        Self {
            request_id: request.request_id.clone(),
            snippet_id: request.snippet_id,
            success: true,
            formatted: Some(formatted),
            error: None,
        }
    }

    /// Result for a format run that could not be carried out.
    pub fn failed(request: &RequestEvent, error: impl Into<String>) -> Self {
        Self {
            request_id: request.request_id.clone(),
            snippet_id: request.snippet_id,
            success: false,
            formatted: None,
            error: Some(error.into()),
        }
    }
}

impl ResultEvent for FormatResult {
    const KIND: TaskKind = TaskKind::Format;

    fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    fn snippet_id(&self) -> SnippetId {
        self.snippet_id
    }

    fn is_success(&self) -> bool {
        self.success
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Outcome of one test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseOutcome {
    pub test_case_id: String,
    pub name: String,
    pub passed: bool,
    /// Output lines the snippet actually produced.
    pub outputs: Vec<String>,
    /// Output lines the test case expected.
    pub expected: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Outcome of a test request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub request_id: RequestId,
    pub snippet_id: SnippetId,
    /// True when every case passed.
    pub passed: bool,
    pub cases: Vec<TestCaseOutcome>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TestResult {
    /// Result for a completed test run.
    pub fn completed(request: &RequestEvent, cases: Vec<TestCaseOutcome>) -> Self {
        Self {
            request_id: request.request_id.clone(),
            snippet_id: request.snippet_id,
            passed: cases.iter().all(|c| c.passed),
            cases,
            error: None,
        }
    }

    /// Result for a test run that could not be carried out.
    pub fn failed(request: &RequestEvent, error: impl Into<String>) -> Self {
        Self {
            request_id: request.request_id.clone(),
            snippet_id: request.snippet_id,
            passed: false,
            cases: Vec::new(),
            error: Some(error.into()),
        }
    }
}

impl ResultEvent for TestResult {
    const KIND: TaskKind = TaskKind::Test;

    fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    fn snippet_id(&self) -> SnippetId {
        self.snippet_id
    }

    fn is_success(&self) -> bool {
        self.error.is_none() && self.passed
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RequestEvent {
        let ctx = TaskContext::new(SnippetId::new(5), "snippets", "u1/5", "1.1")
            .with_user("u1")
            .with_language("printscript");
        RequestEvent::from_context(TaskKind::Lint, &ctx)
    }

    #[test]
    fn test_from_context_copies_location() {
        let event = request();
        assert_eq!(event.snippet_id, SnippetId::new(5));
        assert_eq!(event.content_key, "u1/5");
        assert_eq!(event.language_id.as_deref(), Some("printscript"));
        assert!(event.issued_at_ms > 0);
    }

    #[test]
    fn test_each_request_gets_fresh_id() {
        assert_ne!(request().request_id, request().request_id);
    }

    #[test]
    fn test_lint_result_validity() {
        let req = request();
        let clean = LintResult::completed(&req, vec![]);
        assert!(clean.valid);

        let dirty = LintResult::completed(&req, vec![Violation::new("unused", 1, 1)]);
        assert!(!dirty.valid);
        assert!(dirty.is_success());
        assert_eq!(dirty.request_id, req.request_id);
    }

    #[test]
    fn test_failed_results_carry_error() {
        let req = request();
        let failed = FormatResult::failed(&req, "boom");
        assert!(!failed.is_success());
        assert_eq!(failed.error(), Some("boom"));
    }

    #[test]
    fn test_test_result_passes_only_if_all_cases_pass() {
        let req = request();
        let case = |passed| TestCaseOutcome {
            test_case_id: "t".into(),
            name: "t".into(),
            passed,
            outputs: vec![],
            expected: vec![],
            error: None,
        };
        assert!(TestResult::completed(&req, vec![case(true), case(true)]).passed);
        assert!(!TestResult::completed(&req, vec![case(true), case(false)]).passed);
        assert!(TestResult::completed(&req, vec![]).passed);
    }
}
