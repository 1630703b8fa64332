//! Process-wide registry of live sessions and their input slots.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use snipflow_core::SessionId;

use crate::error::SessionError;

/// Lifecycle of one session.
///
/// `Connecting -> AwaitingInit -> Running -> {Finished | Closed | Errored}`;
/// a session may also close straight from `AwaitingInit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Connecting,
    AwaitingInit,
    Running,
    Finished,
    Closed,
    Errored,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Closed | Self::Errored)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::AwaitingInit => "awaiting_init",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Closed => "closed",
            Self::Errored => "errored",
        };
        f.write_str(s)
    }
}

/// Registry-side view of one session.
struct SessionEntry {
    input: mpsc::Sender<String>,
    cancel: CancellationToken,
    state: watch::Receiver<SessionState>,
    connected_at: DateTime<Utc>,
}

/// Session-side half handed out by [`SessionRegistry::register`].
pub struct SessionSlot {
    pub id: SessionId,
    /// Receives input values, one at a time.
    pub input: mpsc::Receiver<String>,
    /// Fires when the session is released.
    pub cancel: CancellationToken,
    /// Publishes the session's state to the registry.
    pub state: watch::Sender<SessionState>,
}

/// Summary of one live session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub state: SessionState,
    pub connected_at: DateTime<Utc>,
}

/// Live sessions keyed by id.
///
/// Each session owns a capacity-1 input slot. A value delivered while an
/// earlier one is still unread waits until the reader takes it.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
    shutdown: CancellationToken,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_shutdown(CancellationToken::new())
    }

    /// Registry whose sessions are all cancelled when `shutdown` fires.
    pub fn with_shutdown(shutdown: CancellationToken) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a session and its input slot.
    pub fn register(&self, id: SessionId) -> SessionSlot {
        let (input_tx, input_rx) = mpsc::channel(1);
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        let cancel = self.shutdown.child_token();

        let entry = SessionEntry {
            input: input_tx,
            cancel: cancel.clone(),
            state: state_rx,
            connected_at: Utc::now(),
        };
        if let Some(previous) = self.sessions().insert(id.clone(), entry) {
            previous.cancel.cancel();
        }
        debug!(session_id = %id, "Session registered");

        SessionSlot {
            id,
            input: input_rx,
            cancel,
            state: state_tx,
        }
    }

    /// Hand one input value to a session.
    ///
    /// Waits while the slot still holds an unread value. Fails if the
    /// session is unknown, released, or cancelled while waiting.
    pub async fn deliver_input(&self, id: &SessionId, value: String) -> Result<(), SessionError> {
        let (input, cancel) = {
            let sessions = self.sessions();
            let entry = sessions
                .get(id)
                .ok_or_else(|| SessionError::UnknownSession(id.clone()))?;
            (entry.input.clone(), entry.cancel.clone())
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(SessionError::Cancelled),
            sent = input.send(value) => sent.map_err(|_| SessionError::SlotClosed),
        }
    }

    /// Release a session, cancelling anything still waiting on it.
    pub fn release(&self, id: &SessionId) -> bool {
        match self.sessions().remove(id) {
            Some(entry) => {
                entry.cancel.cancel();
                debug!(session_id = %id, "Session released");
                true
            }
            None => false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.sessions().len()
    }

    /// Current state of a live session.
    pub fn state(&self, id: &SessionId) -> Option<SessionState> {
        self.sessions().get(id).map(|e| *e.state.borrow())
    }

    /// Live sessions, in no particular order.
    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions()
            .iter()
            .map(|(id, e)| SessionInfo {
                id: id.clone(),
                state: *e.state.borrow(),
                connected_at: e.connected_at,
            })
            .collect()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
