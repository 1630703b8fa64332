//! Wiring of producers, handlers and consumers over one transport.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use snipflow_core::{FormatResult, LintResult, TaskKind, TestResult};
use snipflow_engine::SnippetStore;
use snipflow_stream::{
    ConsumerConfig, ConsumerStats, RecordHandler, StreamConsumer, StreamError, StreamPublisher,
    StreamTransport,
};

use crate::fanout::{
    FanoutConfig, ResubmitOnRuleChange, RuleUpdateDispatcher, RuleUpdateHandler, SnippetPaginator,
};
use crate::handler::{
    Collaborators, FormatConfig, FormatRequestHandler, LintRequestHandler, TestRequestHandler,
};
use crate::producer::TaskProducer;
use crate::result::{ResultHandler, ResultListener, ResultProducer, ResultTracker};
use crate::strategy::{FormatTaskStrategy, LintTaskStrategy, TaskStrategy, TestTaskStrategy};
use crate::streams::StreamSettings;

/// Handle to a running consumer loop.
pub type ConsumerTask = JoinHandle<Result<ConsumerStats, StreamError>>;

/// Everything the dispatch layer needs, built once at startup.
pub struct Dispatch {
    transport: Arc<dyn StreamTransport>,
    settings: StreamSettings,
    collaborators: Collaborators,
    format: FormatConfig,
    results: ResultProducer,
    producer: Arc<TaskProducer>,
    rule_updates: Arc<RuleUpdateDispatcher>,
    tracker: Arc<ResultTracker>,
}

impl Dispatch {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        settings: StreamSettings,
        collaborators: Collaborators,
        snippets: Arc<dyn SnippetStore>,
        fanout: FanoutConfig,
        format: FormatConfig,
    ) -> Self {
        let publisher =
            |kind| StreamPublisher::new(transport.clone(), StreamSettings::request_stream(kind));
        let strategies: Vec<Arc<dyn TaskStrategy>> = vec![
            Arc::new(LintTaskStrategy::new(publisher(TaskKind::Lint))),
            Arc::new(FormatTaskStrategy::new(publisher(TaskKind::Format))),
            Arc::new(TestTaskStrategy::new(publisher(TaskKind::Test))),
        ];
        let producer = Arc::new(TaskProducer::new(strategies));

        let paginator = SnippetPaginator::new(snippets);
        let rule_handlers: Vec<Arc<dyn RuleUpdateHandler>> = vec![
            Arc::new(ResubmitOnRuleChange::lint(
                paginator.clone(),
                producer.clone(),
                fanout.page_size,
            )),
            Arc::new(ResubmitOnRuleChange::format(
                paginator,
                producer.clone(),
                fanout.page_size,
            )),
        ];

        Self {
            results: ResultProducer::new(transport.clone()),
            transport,
            settings,
            collaborators,
            format,
            producer,
            rule_updates: Arc::new(RuleUpdateDispatcher::new(rule_handlers)),
            tracker: Arc::new(ResultTracker::new()),
        }
    }

    pub fn producer(&self) -> &Arc<TaskProducer> {
        &self.producer
    }

    pub fn rule_updates(&self) -> &Arc<RuleUpdateDispatcher> {
        &self.rule_updates
    }

    pub fn tracker(&self) -> &Arc<ResultTracker> {
        &self.tracker
    }

    pub fn transport(&self) -> &Arc<dyn StreamTransport> {
        &self.transport
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// Start one request consumer per task kind.
    pub fn spawn_request_consumers(&self, consumer: &str, cancel: &CancellationToken) -> Vec<ConsumerTask> {
        let c = &self.collaborators;
        let r = &self.results;
        vec![
            self.spawn(
                self.settings.request_consumer(TaskKind::Lint, consumer),
                LintRequestHandler::new(c.clone(), r.clone()),
                cancel,
            ),
            self.spawn(
                self.settings.request_consumer(TaskKind::Format, consumer),
                FormatRequestHandler::new(c.clone(), r.clone(), self.format.clone()),
                cancel,
            ),
            self.spawn(
                self.settings.request_consumer(TaskKind::Test, consumer),
                TestRequestHandler::new(c.clone(), r.clone()),
                cancel,
            ),
        ]
    }

    /// Start one result consumer per task kind, all reporting to `listener`.
    pub fn spawn_result_consumers(
        &self,
        consumer: &str,
        listener: Arc<dyn ResultListener>,
        cancel: &CancellationToken,
    ) -> Vec<ConsumerTask> {
        vec![
            self.spawn(
                self.settings.result_consumer(TaskKind::Lint, consumer),
                ResultHandler::<LintResult>::new(listener.clone()),
                cancel,
            ),
            self.spawn(
                self.settings.result_consumer(TaskKind::Format, consumer),
                ResultHandler::<FormatResult>::new(listener.clone()),
                cancel,
            ),
            self.spawn(
                self.settings.result_consumer(TaskKind::Test, consumer),
                ResultHandler::<TestResult>::new(listener),
                cancel,
            ),
        ]
    }

    /// Start every request consumer plus result consumers feeding the tracker.
    pub fn spawn_consumers(&self, consumer: &str, cancel: &CancellationToken) -> Vec<ConsumerTask> {
        let mut tasks = self.spawn_request_consumers(consumer, cancel);
        tasks.extend(self.spawn_result_consumers(consumer, self.tracker.clone(), cancel));
        info!(consumer, consumers = tasks.len(), "Stream consumers started");
        tasks
    }

    fn spawn<H: RecordHandler>(
        &self,
        config: ConsumerConfig,
        handler: H,
        cancel: &CancellationToken,
    ) -> ConsumerTask {
        let consumer = StreamConsumer::new(self.transport.clone(), config, Arc::new(handler));
        tokio::spawn(consumer.run(cancel.child_token()))
    }
}
