//! Prometheus metrics collection and formatting.
//!
//! This module provides metrics in Prometheus text exposition format.

use std::fmt::Write;
use std::sync::Arc;

use tracing::debug;

use snipflow_core::TaskKind;
use snipflow_dispatch::StreamSettings;
use snipflow_session::SessionState;

use crate::state::AppState;

const SESSION_STATES: [SessionState; 6] = [
    SessionState::Connecting,
    SessionState::AwaitingInit,
    SessionState::Running,
    SessionState::Finished,
    SessionState::Closed,
    SessionState::Errored,
];

/// Collect all metrics from AppState and format as Prometheus text.
pub async fn collect_metrics(state: &Arc<AppState>) -> String {
    let mut output = String::new();

    collect_session_metrics(state, &mut output);
    collect_stream_metrics(state, &mut output).await;
    collect_result_metrics(state, &mut output).await;

    output
}

/// Live sessions, in total and by state.
fn collect_session_metrics(state: &Arc<AppState>, output: &mut String) {
    let sessions = state.sessions.list();

    writeln!(
        output,
        "# HELP snipflow_sessions_active Number of live interactive sessions"
    )
    .ok();
    writeln!(output, "# TYPE snipflow_sessions_active gauge").ok();
    writeln!(output, "snipflow_sessions_active {}", sessions.len()).ok();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP snipflow_sessions Number of live interactive sessions by state"
    )
    .ok();
    writeln!(output, "# TYPE snipflow_sessions gauge").ok();
    for session_state in SESSION_STATES {
        let count = sessions.iter().filter(|s| s.state == session_state).count();
        writeln!(
            output,
            "snipflow_sessions{{state=\"{session_state}\"}} {count}"
        )
        .ok();
    }
}

/// Records appended to every request and result stream.
async fn collect_stream_metrics(state: &Arc<AppState>, output: &mut String) {
    let transport = state.dispatch.transport();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP snipflow_stream_length Records appended to a stream"
    )
    .ok();
    writeln!(output, "# TYPE snipflow_stream_length counter").ok();
    for kind in TaskKind::ALL {
        for stream in [
            StreamSettings::request_stream(kind),
            StreamSettings::result_stream(kind),
        ] {
            match transport.len(&stream).await {
                Ok(len) => {
                    writeln!(output, "snipflow_stream_length{{stream=\"{stream}\"}} {len}").ok();
                }
                Err(e) => debug!(stream = %stream, error = %e, "Skipping stream length"),
            }
        }
    }
}

async fn collect_result_metrics(state: &Arc<AppState>, output: &mut String) {
    let tracked = state.dispatch.tracker().len().await;

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP snipflow_results_tracked Task outcomes held for lookup by request id"
    )
    .ok();
    writeln!(output, "# TYPE snipflow_results_tracked gauge").ok();
    writeln!(output, "snipflow_results_tracked {tracked}").ok();
}
