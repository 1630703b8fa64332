//! snipflow server library.
//!
//! HTTP surface, configuration and state wiring for the snipflow server:
//! task submission, rule-change fan-out, interactive execution sessions over
//! WebSocket, health and Prometheus metrics.

pub mod config;
pub mod http;
pub mod metrics;
pub mod state;

pub use config::Config;
pub use state::AppState;
