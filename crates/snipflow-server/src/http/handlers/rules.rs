//! Rule change handler.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{info, warn};

use snipflow_core::RuleKind;

use crate::http::responses::{error_response, status_for, RulesChangedResponse};
use crate::state::AppState;

/// Re-submit every snippet of a user after their rules changed.
///
/// The fan-out runs in the background; the response only confirms it started.
pub async fn rules_changed(
    State(state): State<Arc<AppState>>,
    Path((kind, user_id)): Path<(String, String)>,
) -> Response {
    let kind: RuleKind = match kind.parse() {
        Ok(kind) => kind,
        Err(e) => return error_response(StatusCode::NOT_FOUND, e.to_string()),
    };

    match state.dispatch.rule_updates().trigger(kind, &user_id) {
        Ok(_fanout) => {
            info!(rule_kind = %kind, user_id = %user_id, "Rule change accepted");
            (
                StatusCode::ACCEPTED,
                Json(RulesChangedResponse {
                    status: "accepted",
                    rule_kind: kind.to_string(),
                    user_id,
                }),
            )
                .into_response()
        }
        Err(e) => {
            warn!(rule_kind = %kind, user_id = %user_id, error = %e, "Rule change rejected");
            error_response(status_for(&e), e.to_string())
        }
    }
}
