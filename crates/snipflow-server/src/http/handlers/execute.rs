//! Interactive execution over WebSocket.
//!
//! Each connection gets one [`Session`]. Text frames carry JSON
//! [`SessionMessage`](snipflow_session::SessionMessage)s in both directions;
//! the server closes the socket once the run finishes or fails.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

use snipflow_core::SessionId;
use snipflow_session::{Outbound, Session};

use crate::state::AppState;

/// Close reasons must fit a control frame.
const MAX_CLOSE_REASON: usize = 123;

/// WebSocket endpoint for interactive runs.
pub async fn execute(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_session(socket, state))
}

async fn serve_session(socket: WebSocket, state: Arc<AppState>) {
    let (mut session, outbound) =
        Session::connect(state.sessions.clone(), state.session_services.clone());
    let session_id = session.id().clone();
    let cancelled = session.cancelled();

    let (sink, mut frames) = socket.split();
    let mut writer = tokio::spawn(forward_outbound(sink, outbound, session_id.clone()));

    loop {
        tokio::select! {
            _ = cancelled.cancelled() => {
                debug!(session_id = %session_id, "Session cancelled");
                break;
            }
            _ = &mut writer => {
                debug!(session_id = %session_id, "Outbound side finished");
                break;
            }
            frame = frames.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = session.on_text(&text).await {
                        warn!(session_id = %session_id, error = %e, "Rejected client message");
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(session_id = %session_id, error = %e, "WebSocket read failed");
                    break;
                }
            }
        }
    }

    session.disconnect();
    if !writer.is_finished() {
        writer.abort();
    }
}

/// Forward everything the session emits until it asks for a close.
async fn forward_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    session_id: SessionId,
) {
    let mut outbound = UnboundedReceiverStream::new(outbound);

    while let Some(item) = outbound.next().await {
        let frame = match item {
            Outbound::Message(message) => match message.to_text() {
                Ok(text) => Message::Text(text),
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Dropping unencodable message");
                    continue;
                }
            },
            Outbound::Close { reason } => {
                if let Err(e) = sink.send(Message::Close(Some(close_frame(reason)))).await {
                    debug!(session_id = %session_id, error = %e, "Close frame not sent");
                }
                return;
            }
        };
        if let Err(e) = sink.send(frame).await {
            debug!(session_id = %session_id, error = %e, "WebSocket write failed");
            return;
        }
    }
}

fn close_frame(reason: Option<String>) -> CloseFrame<'static> {
    match reason {
        None => CloseFrame {
            code: close_code::NORMAL,
            reason: "".into(),
        },
        Some(reason) => CloseFrame {
            code: close_code::ERROR,
            reason: truncate(reason, MAX_CLOSE_REASON).into(),
        },
    }
}

fn truncate(mut text: String, max: usize) -> String {
    if text.len() > max {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}
