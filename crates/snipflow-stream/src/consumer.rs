//! Long-poll consumer loop.

use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::StreamError;
use crate::transport::{StreamRecord, StreamTransport};

/// Handles one decoded event.
#[async_trait]
pub trait RecordHandler: Send + Sync + 'static {
    /// Event carried by each record.
    type Event: DeserializeOwned + Send;

    /// Error reported for a record that could not be handled.
    type Error: Display + Send;

    async fn handle(&self, event: Self::Event) -> Result<(), Self::Error>;
}

/// Where and how a consumer reads.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub stream: String,
    pub group: String,
    /// Member name within the group.
    pub consumer: String,
    /// How long one read waits for a record.
    pub poll_timeout: Duration,
    /// Records claimed per read.
    pub batch_size: usize,
    /// Pause after a failed read.
    pub error_backoff: Duration,
}

impl ConsumerConfig {
    pub fn new(
        stream: impl Into<String>,
        group: impl Into<String>,
        consumer: impl Into<String>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            stream: stream.into(),
            group: group.into(),
            consumer: consumer.into(),
            poll_timeout,
            batch_size: 10,
            error_backoff: Duration::from_secs(1),
        }
    }

    /// Builder method to set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Builder method to set the pause after a failed read.
    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }
}

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Handled,
    /// The handler returned an error or panicked.
    Failed(String),
    /// The payload did not decode into the handler's event type.
    Undecodable(String),
}

/// Counters accumulated over the life of one consumer loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub handled: u64,
    pub failed: u64,
    pub undecodable: u64,
    pub read_errors: u64,
}

impl ConsumerStats {
    fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Handled => self.handled += 1,
            RecordOutcome::Failed(_) => self.failed += 1,
            RecordOutcome::Undecodable(_) => self.undecodable += 1,
        }
    }
}

/// Reads a stream through a consumer group and hands each record to a handler.
pub struct StreamConsumer<H: RecordHandler> {
    transport: Arc<dyn StreamTransport>,
    config: ConsumerConfig,
    handler: Arc<H>,
}

impl<H: RecordHandler> StreamConsumer<H> {
    pub fn new(transport: Arc<dyn StreamTransport>, config: ConsumerConfig, handler: Arc<H>) -> Self {
        Self {
            transport,
            config,
            handler,
        }
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Poll until `cancel` fires.
    ///
    /// A record is acknowledged after one handling attempt whatever its
    /// outcome; failures are logged and the loop moves on to the next record.
    pub async fn run(self, cancel: CancellationToken) -> Result<ConsumerStats, StreamError> {
        let cfg = &self.config;
        self.transport.ensure_group(&cfg.stream, &cfg.group).await?;

        info!(
            stream = %cfg.stream,
            group = %cfg.group,
            consumer = %cfg.consumer,
            poll_timeout_ms = cfg.poll_timeout.as_millis() as u64,
            "Stream consumer started"
        );

        let mut stats = ConsumerStats::default();
        loop {
            let read = tokio::select! {
                _ = cancel.cancelled() => break,
                read = self.transport.read_group(
                    &cfg.stream,
                    &cfg.group,
                    &cfg.consumer,
                    cfg.batch_size,
                    cfg.poll_timeout,
                ) => read,
            };

            match read {
                Ok(records) => {
                    for record in records {
                        let outcome = self.process(record).await;
                        stats.record(&outcome);
                    }
                }
                Err(e) => {
                    stats.read_errors += 1;
                    warn!(stream = %cfg.stream, error = %e, "Stream read failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(cfg.error_backoff) => {}
                    }
                }
            }
        }

        info!(
            stream = %cfg.stream,
            consumer = %cfg.consumer,
            handled = stats.handled,
            failed = stats.failed,
            undecodable = stats.undecodable,
            "Stream consumer stopped"
        );
        Ok(stats)
    }

    /// Decode, handle, and acknowledge one record.
    pub async fn process(&self, record: StreamRecord) -> RecordOutcome {
        let cfg = &self.config;
        debug!(stream = %cfg.stream, record_id = %record.id, "Processing record");

        let outcome = match serde_json::from_str::<H::Event>(&record.payload) {
            Err(e) => {
                warn!(
                    stream = %cfg.stream,
                    record_id = %record.id,
                    error = %e,
                    "Dropping undecodable record"
                );
                RecordOutcome::Undecodable(e.to_string())
            }
            Ok(event) => {
                match AssertUnwindSafe(self.handler.handle(event))
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(())) => RecordOutcome::Handled,
                    Ok(Err(e)) => {
                        warn!(
                            stream = %cfg.stream,
                            record_id = %record.id,
                            error = %e,
                            "Record handler failed"
                        );
                        RecordOutcome::Failed(e.to_string())
                    }
                    Err(_) => {
                        error!(stream = %cfg.stream, record_id = %record.id, "Record handler panicked");
                        RecordOutcome::Failed("handler panicked".to_string())
                    }
                }
            }
        };

        if let Err(e) = self
            .transport
            .ack(&cfg.stream, &cfg.group, &[record.id])
            .await
        {
            warn!(stream = %cfg.stream, record_id = %record.id, error = %e, "Ack failed");
        }

        outcome
    }
}
