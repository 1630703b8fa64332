//! One interactive execution per connection.
//!
//! The transport layer owns the connection. It creates a [`Session`] on
//! connect, feeds it every inbound message, forwards everything the session
//! emits on its [`Outbound`] channel, and drops the session on disconnect.
//!
//! The language engine runs on a blocking thread. Output lines travel back
//! through an unbounded channel; input requests park the blocking thread on
//! the session's capacity-1 input slot until the client answers or the
//! session is cancelled. Answers are queued and handed to the slot by a
//! per-session forwarder, so reading client frames never waits on the engine.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use snipflow_core::SessionId;
use snipflow_engine::{ContentStore, EngineError, EngineInput, InputSource, LanguageEngine, OutputSink};

use crate::error::SessionError;
use crate::protocol::{ExecutionTarget, SessionMessage};
use crate::registry::{SessionRegistry, SessionState};

/// What a session asks the transport to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Send one message to the client.
    Message(SessionMessage),
    /// Close the connection, with a reason when the close is not a normal end.
    Close { reason: Option<String> },
}

/// Collaborators a session runs against.
#[derive(Clone)]
pub struct SessionServices {
    pub content: Arc<dyn ContentStore>,
    pub engine: Arc<dyn LanguageEngine>,
}

/// Server side of one interactive connection.
pub struct Session {
    id: SessionId,
    registry: Arc<SessionRegistry>,
    services: SessionServices,
    outbound: mpsc::UnboundedSender<Outbound>,
    state: Arc<watch::Sender<SessionState>>,
    cancel: CancellationToken,
    input: Option<mpsc::Receiver<String>>,
    answers: Option<mpsc::UnboundedSender<String>>,
    worker: Option<JoinHandle<()>>,
}

impl Session {
    /// Register a new session and return it with the receiver of its
    /// outbound traffic.
    pub fn connect(
        registry: Arc<SessionRegistry>,
        services: SessionServices,
    ) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let slot = registry.register(SessionId::generate());
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        slot.state.send_replace(SessionState::AwaitingInit);
        info!(session_id = %slot.id, "Session connected");

        let session = Self {
            id: slot.id,
            registry,
            services,
            outbound,
            state: Arc::new(slot.state),
            cancel: slot.cancel,
            input: Some(slot.input),
            answers: None,
            worker: None,
        };
        (session, outbound_rx)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Fires when the session is released or the server shuts down.
    pub fn cancelled(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Handle one inbound text frame.
    pub async fn on_text(&mut self, text: &str) -> Result<(), SessionError> {
        let message = SessionMessage::parse(text)?;
        self.on_message(message).await
    }

    /// Handle one inbound message.
    ///
    /// An `InputResponse` is queued and returns at once; queued answers reach
    /// the engine in arrival order, each one after the previous was read.
    /// Errors are reported to the caller; only a bad `InitExecution` closes
    /// the session.
    pub async fn on_message(&mut self, message: SessionMessage) -> Result<(), SessionError> {
        match message {
            SessionMessage::InitExecution {
                content_container,
                content_key,
                version,
                language_id,
            } => {
                if self.state() != SessionState::AwaitingInit {
                    return Err(SessionError::Protocol(format!(
                        "execution already started (state {})",
                        self.state()
                    )));
                }
                match ExecutionTarget::from_init(content_container, content_key, version, language_id) {
                    Ok(target) => self.start(target),
                    Err(e) => {
                        warn!(session_id = %self.id, error = %e, "Rejecting InitExecution");
                        self.close(SessionState::Closed, Some(e.to_string()));
                        Err(e)
                    }
                }
            }
            SessionMessage::InputResponse { value } => {
                if self.state() != SessionState::Running {
                    return Err(SessionError::Protocol(format!(
                        "no execution is waiting for input (state {})",
                        self.state()
                    )));
                }
                let answers = self
                    .answers
                    .as_ref()
                    .ok_or_else(|| SessionError::Protocol("execution has not started".to_string()))?;
                answers.send(value).map_err(|_| SessionError::SlotClosed)
            }
            other => Err(SessionError::Protocol(format!(
                "{} is not accepted from clients",
                other.kind()
            ))),
        }
    }

    fn start(&mut self, target: ExecutionTarget) -> Result<(), SessionError> {
        let input = self
            .input
            .take()
            .ok_or_else(|| SessionError::Protocol("execution already started".to_string()))?;

        info!(
            session_id = %self.id,
            container = %target.content_container,
            key = %target.content_key,
            version = %target.version,
            "Starting execution"
        );
        self.state.send_replace(SessionState::Running);

        let (answers, queued) = mpsc::unbounded_channel();
        self.answers = Some(answers);
        tokio::spawn(forward_answers(
            self.registry.clone(),
            self.id.clone(),
            queued,
            self.cancel.clone(),
        ));

        let worker = Worker {
            id: self.id.clone(),
            target,
            services: self.services.clone(),
            outbound: self.outbound.clone(),
            state: self.state.clone(),
            cancel: self.cancel.clone(),
            input,
        };
        self.worker = Some(tokio::spawn(worker.run()));
        Ok(())
    }

    fn close(&self, state: SessionState, reason: Option<String>) {
        self.state.send_replace(state);
        if self.outbound.send(Outbound::Close { reason }).is_err() {
            debug!(session_id = %self.id, "Transport already gone");
        }
    }

    /// Release the session. A worker still waiting for input and any queued
    /// answers are cancelled. Dropping a session releases it as well.
    pub fn disconnect(mut self) {
        info!(session_id = %self.id, state = %self.state(), "Session disconnected");
        self.release();
    }

    fn release(&mut self) {
        self.registry.release(&self.id);
        self.answers = None;
        self.state.send_if_modified(|state| {
            if state.is_terminal() {
                false
            } else {
                *state = SessionState::Closed;
                true
            }
        });
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
        if let Some(worker) = &self.worker {
            if !worker.is_finished() {
                debug!(session_id = %self.id, "Worker still running, cancelled");
            }
        }
    }
}

/// Runs one execution to completion.
struct Worker {
    id: SessionId,
    target: ExecutionTarget,
    services: SessionServices,
    outbound: mpsc::UnboundedSender<Outbound>,
    state: Arc<watch::Sender<SessionState>>,
    cancel: CancellationToken,
    input: mpsc::Receiver<String>,
}

impl Worker {
    async fn run(self) {
        let id = self.id.clone();
        let outbound = self.outbound.clone();
        let state = self.state.clone();
        let cancel = self.cancel.clone();

        match self.execute().await {
            Ok(()) => {
                info!(session_id = %id, "Execution finished");
                state.send_replace(SessionState::Finished);
                send(&outbound, &id, Outbound::Message(SessionMessage::ExecutionFinished));
                send(&outbound, &id, Outbound::Close { reason: None });
            }
            Err(e) if cancel.is_cancelled() => {
                debug!(session_id = %id, error = %e, "Execution cancelled");
            }
            Err(e) => {
                warn!(session_id = %id, error = %e, "Execution failed");
                state.send_replace(SessionState::Errored);
                let reason = e.to_string();
                send(
                    &outbound,
                    &id,
                    Outbound::Message(SessionMessage::Error {
                        value: reason.clone(),
                    }),
                );
                send(&outbound, &id, Outbound::Close { reason: Some(reason) });
            }
        }
    }

    async fn execute(self) -> Result<(), SessionError> {
        let Worker {
            target,
            services,
            outbound,
            cancel,
            input,
            ..
        } = self;

        let source = tokio::select! {
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            source = services.content.get(&target.content_container, &target.content_key) => source?,
        };

        let runtime = Handle::current();
        let engine = services.engine;
        let joined = tokio::task::spawn_blocking(move || {
            let config = json!({});
            let request = engine_input(&source, &target, &config);
            let mut output = OutputAdapter {
                outbound: outbound.clone(),
                cancel: cancel.clone(),
            };
            let mut stdin = InputAdapter {
                outbound,
                slot: input,
                cancel,
                runtime,
            };
            engine.execute(&request, &mut output, &mut stdin)
        })
        .await;

        match joined {
            Ok(result) => Ok(result?),
            Err(e) => Err(SessionError::Worker(e.to_string())),
        }
    }
}

/// Hand queued answers to the input slot, one at a time.
async fn forward_answers(
    registry: Arc<SessionRegistry>,
    id: SessionId,
    mut queued: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    loop {
        let value = tokio::select! {
            _ = cancel.cancelled() => break,
            value = queued.recv() => match value {
                Some(value) => value,
                None => break,
            },
        };
        if let Err(e) = registry.deliver_input(&id, value).await {
            debug!(session_id = %id, error = %e, "Input forwarding stopped");
            break;
        }
    }
}

fn engine_input<'a>(source: &'a str, target: &'a ExecutionTarget, config: &'a Value) -> EngineInput<'a> {
    EngineInput {
        source,
        version: &target.version,
        language: target.language_id.as_deref(),
        config,
    }
}

/// Best-effort send; a vanished transport is logged, not raised.
fn send(outbound: &mpsc::UnboundedSender<Outbound>, id: &SessionId, message: Outbound) {
    if outbound.send(message).is_err() {
        debug!(session_id = %id, "Dropping outbound message, transport closed");
    }
}

/// Turns each output line into an `Output` message.
struct OutputAdapter {
    outbound: mpsc::UnboundedSender<Outbound>,
    cancel: CancellationToken,
}

impl OutputSink for OutputAdapter {
    fn emit(&mut self, line: &str) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        self.outbound
            .send(Outbound::Message(SessionMessage::Output {
                value: line.to_string(),
            }))
            .map_err(|_| EngineError::Cancelled)
    }
}

/// Asks the client for input and parks until the answer lands in the slot.
struct InputAdapter {
    outbound: mpsc::UnboundedSender<Outbound>,
    slot: mpsc::Receiver<String>,
    cancel: CancellationToken,
    runtime: Handle,
}

impl InputSource for InputAdapter {
    fn read(&mut self, prompt: &str) -> Result<String, EngineError> {
        self.outbound
            .send(Outbound::Message(SessionMessage::InputRequest {
                prompt: prompt.to_string(),
            }))
            .map_err(|_| EngineError::Cancelled)?;

        let cancel = &self.cancel;
        let slot = &mut self.slot;
        self.runtime
            .block_on(async {
                tokio::select! {
                    _ = cancel.cancelled() => None,
                    value = slot.recv() => value,
                }
            })
            .ok_or(EngineError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use snipflow_engine::memory::MemoryContentStore;

    /// Runs a tiny script: `print X` emits X, `read P` asks with prompt P and
    /// emits the answer, `fail M` raises M, `pause N` sleeps N milliseconds.
    struct ScriptEngine;

    impl LanguageEngine for ScriptEngine {
        fn lint(&self, _input: &EngineInput<'_>) -> Result<Vec<snipflow_core::Violation>, EngineError> {
            Ok(Vec::new())
        }

        fn format(&self, input: &EngineInput<'_>) -> Result<String, EngineError> {
            Ok(input.source.to_string())
        }

        fn execute(
            &self,
            input: &EngineInput<'_>,
            output: &mut dyn OutputSink,
            stdin: &mut dyn InputSource,
        ) -> Result<(), EngineError> {
            for line in input.source.lines() {
                if let Some(text) = line.strip_prefix("print ") {
                    output.emit(text)?;
                } else if let Some(prompt) = line.strip_prefix("read ") {
                    let value = stdin.read(prompt)?;
                    output.emit(&value)?;
                } else if let Some(message) = line.strip_prefix("fail ") {
                    return Err(EngineError::Engine(message.to_string()));
                } else if let Some(ms) = line.strip_prefix("pause ") {
                    std::thread::sleep(Duration::from_millis(ms.parse().unwrap_or(0)));
                }
            }
            Ok(())
        }
    }

    fn session(source: &str) -> (Arc<SessionRegistry>, Session, mpsc::UnboundedReceiver<Outbound>) {
        let registry = Arc::new(SessionRegistry::new());
        let services = SessionServices {
            content: Arc::new(MemoryContentStore::new().with_content("snippets", "u1/5", source)),
            engine: Arc::new(ScriptEngine),
        };
        let (session, rx) = Session::connect(registry.clone(), services);
        (registry, session, rx)
    }

    fn init(key: Option<&str>) -> SessionMessage {
        SessionMessage::InitExecution {
            content_container: Some("snippets".into()),
            content_key: key.map(str::to_string),
            version: Some("1.1".into()),
            language_id: None,
        }
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Outbound {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("outbound message")
            .expect("channel open")
    }

    fn message(msg: SessionMessage) -> Outbound {
        Outbound::Message(msg)
    }

    #[tokio::test]
    async fn test_interactive_run_round_trip() {
        let (registry, mut session, mut rx) = session("print hello\nread Name?");
        assert_eq!(session.state(), SessionState::AwaitingInit);
        assert_eq!(registry.active_count(), 1);

        session.on_message(init(Some("u1/5"))).await.unwrap();
        assert_eq!(session.state(), SessionState::Running);

        assert_eq!(next(&mut rx).await, message(SessionMessage::Output { value: "hello".into() }));
        assert_eq!(
            next(&mut rx).await,
            message(SessionMessage::InputRequest { prompt: "Name?".into() })
        );

        session
            .on_text(r#"{"type":"InputResponse","value":"Ada"}"#)
            .await
            .unwrap();

        assert_eq!(next(&mut rx).await, message(SessionMessage::Output { value: "Ada".into() }));
        assert_eq!(next(&mut rx).await, message(SessionMessage::ExecutionFinished));
        assert_eq!(next(&mut rx).await, Outbound::Close { reason: None });
        assert_eq!(session.state(), SessionState::Finished);

        session.disconnect();
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_engine_failure_sends_error_then_closes() {
        let (_registry, mut session, mut rx) = session("print partial\nfail division by zero");

        session.on_message(init(Some("u1/5"))).await.unwrap();

        assert_eq!(
            next(&mut rx).await,
            message(SessionMessage::Output { value: "partial".into() })
        );
        assert_eq!(
            next(&mut rx).await,
            message(SessionMessage::Error { value: "division by zero".into() })
        );
        assert_eq!(
            next(&mut rx).await,
            Outbound::Close {
                reason: Some("division by zero".into())
            }
        );
        assert_eq!(session.state(), SessionState::Errored);
    }

    #[tokio::test]
    async fn test_missing_content_sends_error() {
        let (_registry, mut session, mut rx) = session("print hello");

        session.on_message(init(Some("u1/404"))).await.unwrap();

        assert!(matches!(
            next(&mut rx).await,
            Outbound::Message(SessionMessage::Error { .. })
        ));
        assert!(matches!(next(&mut rx).await, Outbound::Close { reason: Some(_) }));
    }

    #[tokio::test]
    async fn test_init_without_key_closes_with_reason() {
        let (_registry, mut session, mut rx) = session("print hello");

        let err = session.on_message(init(None)).await.unwrap_err();

        assert!(matches!(err, SessionError::MissingInitField("contentKey")));
        match next(&mut rx).await {
            Outbound::Close { reason: Some(reason) } => assert!(reason.contains("contentKey")),
            other => panic!("expected close, got {other:?}"),
        }
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_input_before_init_is_rejected() {
        let (_registry, mut session, _rx) = session("print hello");

        let err = session
            .on_message(SessionMessage::InputResponse { value: "x".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Protocol(_)));

        let err = session
            .on_message(SessionMessage::Output { value: "x".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_disconnect_cancels_worker_waiting_for_input() {
        let (registry, mut session, mut rx) = session("read Name?\nprint never");

        session.on_message(init(Some("u1/5"))).await.unwrap();
        assert_eq!(
            next(&mut rx).await,
            message(SessionMessage::InputRequest { prompt: "Name?".into() })
        );

        session.disconnect();
        assert_eq!(registry.active_count(), 0);

        // The worker drops its senders once it stops; nothing else arrives.
        let rest = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("worker stops");
        assert_eq!(rest, None);
    }

    #[tokio::test]
    async fn test_answers_sent_ahead_are_read_in_order() {
        let (_registry, mut session, mut rx) = session("read A?\nread B?");

        session.on_message(init(Some("u1/5"))).await.unwrap();
        session
            .on_message(SessionMessage::InputResponse { value: "1".into() })
            .await
            .unwrap();
        session
            .on_message(SessionMessage::InputResponse { value: "2".into() })
            .await
            .unwrap();

        assert_eq!(next(&mut rx).await, message(SessionMessage::InputRequest { prompt: "A?".into() }));
        assert_eq!(next(&mut rx).await, message(SessionMessage::Output { value: "1".into() }));
        assert_eq!(next(&mut rx).await, message(SessionMessage::InputRequest { prompt: "B?".into() }));
        assert_eq!(next(&mut rx).await, message(SessionMessage::Output { value: "2".into() }));
        assert_eq!(next(&mut rx).await, message(SessionMessage::ExecutionFinished));
    }

    #[tokio::test]
    async fn test_answers_do_not_wait_for_a_busy_engine() {
        let (registry, mut session, mut rx) = session("pause 300\nread A?\nprint never");

        session.on_message(init(Some("u1/5"))).await.unwrap();
        // The slot holds one answer; the rest must not hold up the caller.
        for value in ["1", "2", "3"] {
            tokio::time::timeout(
                Duration::from_millis(100),
                session.on_message(SessionMessage::InputResponse { value: value.into() }),
            )
            .await
            .expect("answer accepted without waiting")
            .unwrap();
        }

        let state = session.state.subscribe();
        session.disconnect();
        assert_eq!(registry.active_count(), 0);
        assert_eq!(*state.borrow(), SessionState::Closed);

        // The worker drops its senders once it stops.
        tokio::time::timeout(Duration::from_secs(5), async {
            while rx.recv().await.is_some() {}
        })
        .await
        .expect("worker stops");
    }

    #[tokio::test]
    async fn test_disconnect_releases_before_drop() {
        let (registry, session, _rx) = session("print hello");
        let state = session.state.subscribe();

        session.disconnect();

        assert_eq!(registry.active_count(), 0);
        assert_eq!(*state.borrow(), SessionState::Closed);
    }
}
