//! Task strategies - one per task kind.

use async_trait::async_trait;
use tracing::info;

use snipflow_core::{RequestEvent, RequestId, TaskContext, TaskKind};
use snipflow_stream::StreamPublisher;

use crate::error::DispatchError;

/// Submits one kind of task.
#[async_trait]
pub trait TaskStrategy: Send + Sync {
    /// Whether this strategy serves `kind`.
    fn can_handle(&self, kind: TaskKind) -> bool;

    /// Validate the context, publish a request event, and return its id.
    ///
    /// Nothing is published when validation fails.
    async fn submit(&self, context: &TaskContext) -> Result<RequestId, DispatchError>;
}

/// Shared submit path: validate, build the request, append it.
async fn submit_request(
    kind: TaskKind,
    publisher: &StreamPublisher,
    context: &TaskContext,
) -> Result<RequestId, DispatchError> {
    context.validate_for(kind)?;

    let event = RequestEvent::from_context(kind, context);
    publisher.publish(&event).await?;

    info!(
        kind = %kind,
        request_id = %event.request_id,
        snippet_id = %event.snippet_id,
        stream = %publisher.stream(),
        "Task submitted"
    );
    Ok(event.request_id)
}

/// Submits lint tasks. Requires language and owner.
#[derive(Debug, Clone)]
pub struct LintTaskStrategy {
    publisher: StreamPublisher,
}

impl LintTaskStrategy {
    pub fn new(publisher: StreamPublisher) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl TaskStrategy for LintTaskStrategy {
    fn can_handle(&self, kind: TaskKind) -> bool {
        kind == TaskKind::Lint
    }

    async fn submit(&self, context: &TaskContext) -> Result<RequestId, DispatchError> {
        submit_request(TaskKind::Lint, &self.publisher, context).await
    }
}

/// Submits format tasks. Requires language and owner.
#[derive(Debug, Clone)]
pub struct FormatTaskStrategy {
    publisher: StreamPublisher,
}

impl FormatTaskStrategy {
    pub fn new(publisher: StreamPublisher) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl TaskStrategy for FormatTaskStrategy {
    fn can_handle(&self, kind: TaskKind) -> bool {
        kind == TaskKind::Format
    }

    async fn submit(&self, context: &TaskContext) -> Result<RequestId, DispatchError> {
        submit_request(TaskKind::Format, &self.publisher, context).await
    }
}

/// Submits test runs. Owner and language are optional.
#[derive(Debug, Clone)]
pub struct TestTaskStrategy {
    publisher: StreamPublisher,
}

impl TestTaskStrategy {
    pub fn new(publisher: StreamPublisher) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl TaskStrategy for TestTaskStrategy {
    fn can_handle(&self, kind: TaskKind) -> bool {
        kind == TaskKind::Test
    }

    async fn submit(&self, context: &TaskContext) -> Result<RequestId, DispatchError> {
        submit_request(TaskKind::Test, &self.publisher, context).await
    }
}
