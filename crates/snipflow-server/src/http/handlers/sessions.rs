//! Live session list.

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};

use crate::state::AppState;

/// List live interactive sessions and their states.
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut sessions = state.sessions.list();
    sessions.sort_by_key(|s| s.connected_at);
    Json(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;

    use snipflow_core::SessionId;
    use snipflow_session::SessionState;

    use crate::http::handlers::body_json;
    use crate::state::testing::test_state;

    #[tokio::test]
    async fn test_lists_live_sessions_with_state() {
        let state = test_state("");
        let slot = state.sessions.register(SessionId::new("s1"));
        slot.state.send_replace(SessionState::AwaitingInit);

        let response = list_sessions(State(state)).await.into_response();
        let body = body_json(response).await;

        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["id"], "s1");
        assert_eq!(body[0]["state"], "AwaitingInit");
    }
}
