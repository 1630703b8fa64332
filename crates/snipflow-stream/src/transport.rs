//! Stream transport contract.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::StreamError;

/// Position of a record within its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(u64);

impl RecordId {
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    pub const fn seq(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-0", self.0)
    }
}

/// One record read from a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub id: RecordId,
    pub stream: String,
    /// Serialized event.
    pub payload: String,
}

/// Named, ordered, append-only logs with consumer-group delivery.
///
/// ## Thread Safety
///
/// All methods are `Send + Sync` so producers and any number of consumers can
/// share one transport.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Append a record. Fire-and-forget: no consumer acknowledgement is awaited.
    async fn append(&self, stream: &str, payload: String) -> Result<RecordId, StreamError>;

    /// Create a consumer group if it does not exist yet.
    ///
    /// New groups start at the beginning of the stream.
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<(), StreamError>;

    /// Claim up to `max` undelivered records for `consumer`.
    ///
    /// Waits up to `block` for a record to arrive when none is available and
    /// returns an empty batch on timeout.
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        max: usize,
        block: Duration,
    ) -> Result<Vec<StreamRecord>, StreamError>;

    /// Acknowledge records, removing them from the group's pending set.
    ///
    /// Returns how many were pending.
    async fn ack(&self, stream: &str, group: &str, ids: &[RecordId]) -> Result<usize, StreamError>;

    /// Number of records ever appended to the stream.
    async fn len(&self, stream: &str) -> Result<usize, StreamError>;
}

/// Publishes serialized events onto one stream.
#[derive(Clone)]
pub struct StreamPublisher {
    transport: Arc<dyn StreamTransport>,
    stream: String,
}

impl StreamPublisher {
    pub fn new(transport: Arc<dyn StreamTransport>, stream: impl Into<String>) -> Self {
        Self {
            transport,
            stream: stream.into(),
        }
    }

    /// Stream this publisher appends to.
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Serialize `event` as JSON and append it.
    pub async fn publish<T: Serialize + Sync>(&self, event: &T) -> Result<RecordId, StreamError> {
        let payload = serde_json::to_string(event)?;
        let id = self.transport.append(&self.stream, payload).await?;
        debug!(stream = %self.stream, record_id = %id, "Published record");
        Ok(id)
    }
}

impl fmt::Debug for StreamPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamPublisher")
            .field("stream", &self.stream)
            .finish()
    }
}
