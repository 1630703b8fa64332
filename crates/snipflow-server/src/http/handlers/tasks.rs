//! Task submission handler.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{info, warn};

use snipflow_core::TaskKind;

use crate::http::responses::{error_response, status_for, SubmitTaskRequest, SubmitTaskResponse};
use crate::state::AppState;

/// Submit a lint, format or test task for a stored snippet.
///
/// Returns 202 with the request id; the outcome arrives on the kind's result
/// stream.
pub async fn submit_task(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Json(req): Json<SubmitTaskRequest>,
) -> Response {
    let kind: TaskKind = match kind.parse() {
        Ok(kind) => kind,
        Err(e) => return error_response(StatusCode::NOT_FOUND, e.to_string()),
    };
    let context = req.into_context();

    match state.dispatch.producer().request(kind, &context).await {
        Ok(request_id) => {
            info!(
                kind = %kind,
                snippet_id = %context.snippet_id,
                request_id = %request_id,
                "Task accepted"
            );
            (
                StatusCode::ACCEPTED,
                Json(SubmitTaskResponse {
                    request_id: request_id.into_inner(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            warn!(kind = %kind, snippet_id = %context.snippet_id, error = %e, "Task rejected");
            error_response(status_for(&e), e.to_string())
        }
    }
}
