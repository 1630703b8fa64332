//! HTTP request and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use snipflow_core::{SnippetId, TaskContext};
use snipflow_dispatch::DispatchError;

// ============================================================================
// Task submission types
// ============================================================================

/// Request body for the task submission endpoint.
#[derive(Debug, Deserialize)]
pub struct SubmitTaskRequest {
    pub snippet_id: u64,
    pub content_container: String,
    pub content_key: String,
    pub version: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub language_id: Option<String>,
}

impl SubmitTaskRequest {
    pub fn into_context(self) -> TaskContext {
        let mut ctx = TaskContext::new(
            SnippetId::new(self.snippet_id),
            self.content_container,
            self.content_key,
            self.version,
        );
        ctx.user_id = self.user_id;
        ctx.language_id = self.language_id;
        ctx
    }
}

/// Response body for the task submission endpoint.
#[derive(Debug, Serialize)]
pub struct SubmitTaskResponse {
    /// Correlation id carried by the request and its result.
    pub request_id: String,
}

// ============================================================================
// Rule change types
// ============================================================================

/// Response body for the rule change endpoint.
#[derive(Debug, Serialize)]
pub struct RulesChangedResponse {
    pub status: &'static str,
    pub rule_kind: String,
    pub user_id: String,
}

// ============================================================================
// Error types
// ============================================================================

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Status code reported for a failed submission.
pub fn status_for(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::Validation(_) => StatusCode::BAD_REQUEST,
        DispatchError::Unroutable(_) | DispatchError::NoRuleHandler(_) => StatusCode::NOT_FOUND,
        DispatchError::Stream(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}
