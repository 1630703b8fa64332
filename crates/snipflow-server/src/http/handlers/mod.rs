//! HTTP request handlers.

mod execute;
mod health;
mod rules;
mod sessions;
mod tasks;

pub use execute::execute;
pub use health::{health_check, metrics_handler};
pub use rules::rules_changed;
pub use sessions::list_sessions;
pub use tasks::submit_task;

#[cfg(test)]
pub(crate) async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
