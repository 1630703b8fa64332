//! Result publishing and correlation.

use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Notify, RwLock};
use tracing::{info, warn};

use snipflow_core::{RequestId, ResultEvent, SnippetId, TaskKind};
use snipflow_stream::{RecordId, RecordHandler, StreamPublisher, StreamTransport};

use crate::error::DispatchError;
use crate::streams::StreamSettings;

/// Publishes result events onto the result stream of their kind.
#[derive(Debug, Clone)]
pub struct ResultProducer {
    lint: StreamPublisher,
    format: StreamPublisher,
    test: StreamPublisher,
}

impl ResultProducer {
    pub fn new(transport: Arc<dyn StreamTransport>) -> Self {
        let publisher =
            |kind| StreamPublisher::new(transport.clone(), StreamSettings::result_stream(kind));
        Self {
            lint: publisher(TaskKind::Lint),
            format: publisher(TaskKind::Format),
            test: publisher(TaskKind::Test),
        }
    }

    /// Append a result to its kind's result stream.
    pub async fn publish<E>(&self, result: &E) -> Result<RecordId, DispatchError>
    where
        E: ResultEvent + Serialize + Sync,
    {
        let publisher = match E::KIND {
            TaskKind::Lint => &self.lint,
            TaskKind::Format => &self.format,
            TaskKind::Test => &self.test,
        };
        let id = publisher.publish(result).await?;
        info!(
            kind = %E::KIND,
            request_id = %result.request_id(),
            success = result.is_success(),
            "Result published"
        );
        Ok(id)
    }
}

/// Kind-independent view of one result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultOutcome {
    pub kind: TaskKind,
    pub request_id: RequestId,
    pub snippet_id: SnippetId,
    pub success: bool,
    pub error: Option<String>,
    /// The full result event.
    pub detail: Value,
}

impl ResultOutcome {
    /// Capture a result event.
    pub fn from_event<E: ResultEvent + Serialize>(event: &E) -> Self {
        Self {
            kind: E::KIND,
            request_id: event.request_id().clone(),
            snippet_id: event.snippet_id(),
            success: event.is_success(),
            error: event.error().map(str::to_string),
            detail: serde_json::to_value(event).unwrap_or(Value::Null),
        }
    }
}

/// Reacts to results as they arrive on the result streams.
#[async_trait]
pub trait ResultListener: Send + Sync + 'static {
    async fn on_result(&self, outcome: ResultOutcome);
}

/// Consumes one kind's result stream and notifies a listener.
pub struct ResultHandler<E> {
    listener: Arc<dyn ResultListener>,
    _event: PhantomData<fn() -> E>,
}

impl<E> ResultHandler<E> {
    pub fn new(listener: Arc<dyn ResultListener>) -> Self {
        Self {
            listener,
            _event: PhantomData,
        }
    }
}

#[async_trait]
impl<E> RecordHandler for ResultHandler<E>
where
    E: ResultEvent + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type Event = E;
    type Error = DispatchError;

    async fn handle(&self, event: E) -> Result<(), DispatchError> {
        self.listener.on_result(ResultOutcome::from_event(&event)).await;
        Ok(())
    }
}

/// Outcomes kept by a tracker that was not given a capacity.
pub const DEFAULT_TRACKED_RESULTS: usize = 10_000;

#[derive(Debug, Default)]
struct Tracked {
    outcomes: HashMap<RequestId, ResultOutcome>,
    /// Arrival order, oldest first.
    order: VecDeque<RequestId>,
}

/// Remembers the latest outcome per request id, dropping the oldest once
/// `capacity` requests are tracked.
#[derive(Debug)]
pub struct ResultTracker {
    tracked: RwLock<Tracked>,
    capacity: usize,
    arrived: Notify,
}

impl ResultTracker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TRACKED_RESULTS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tracked: RwLock::new(Tracked::default()),
            capacity: capacity.max(1),
            arrived: Notify::new(),
        }
    }

    /// Outcome observed for a request, if any.
    pub async fn get(&self, request_id: &RequestId) -> Option<ResultOutcome> {
        self.tracked.read().await.outcomes.get(request_id).cloned()
    }

    /// Number of requests with an observed outcome.
    pub async fn len(&self) -> usize {
        self.tracked.read().await.outcomes.len()
    }

    /// Wait up to `timeout` for the outcome of a request.
    pub async fn wait_for(&self, request_id: &RequestId, timeout: Duration) -> Option<ResultOutcome> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let arrived = self.arrived.notified();
            if let Some(outcome) = self.get(request_id).await {
                return Some(outcome);
            }
            if tokio::time::timeout_at(deadline, arrived).await.is_err() {
                return None;
            }
        }
    }

    async fn record(&self, outcome: ResultOutcome) {
        let mut tracked = self.tracked.write().await;
        let id = outcome.request_id.clone();
        if tracked.outcomes.insert(id.clone(), outcome).is_none() {
            tracked.order.push_back(id);
        }
        while tracked.order.len() > self.capacity {
            if let Some(oldest) = tracked.order.pop_front() {
                tracked.outcomes.remove(&oldest);
            }
        }
    }
}

impl Default for ResultTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultListener for ResultTracker {
    async fn on_result(&self, outcome: ResultOutcome) {
        if outcome.success {
            info!(kind = %outcome.kind, request_id = %outcome.request_id, snippet_id = %outcome.snippet_id, "Task succeeded");
        } else {
            warn!(
                kind = %outcome.kind,
                request_id = %outcome.request_id,
                snippet_id = %outcome.snippet_id,
                error = ?outcome.error,
                "Task did not succeed"
            );
        }
        self.record(outcome).await;
        self.arrived.notify_waiters();
    }
}
