//! HTTP server.
//!
//! Provides endpoints for:
//! - Task submission (`/v1/tasks/{kind}`)
//! - Rule-change fan-out (`/v1/rules/{kind}/users/{user_id}`)
//! - Interactive execution over WebSocket (`/v1/execute`)
//! - Live session list (`/v1/sessions`)
//! - Health check (`/health`)
//! - Prometheus metrics (`/metrics`)

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

mod handlers;
pub mod responses;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // API routes
        .route("/v1/tasks/:kind", post(handlers::submit_task))
        .route("/v1/rules/:kind/users/:user_id", post(handlers::rules_changed))
        .route("/v1/sessions", get(handlers::list_sessions))
        .route("/v1/execute", get(handlers::execute))
        // Observability routes
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(cors)
        .with_state(state)
}
