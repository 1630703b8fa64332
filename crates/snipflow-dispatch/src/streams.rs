//! Stream names, consumer groups, and poll timeouts.

use std::time::Duration;

use snipflow_core::TaskKind;
use snipflow_stream::ConsumerConfig;

/// How long a request consumer waits for a record per poll.
pub const REQUEST_POLL_TIMEOUT: Duration = Duration::from_millis(10_000);

/// How long a result consumer waits for a record per poll.
pub const RESULT_POLL_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Stream layout and polling configuration.
///
/// One request stream and one result stream per task kind, each read by one
/// consumer group.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub request_poll_timeout: Duration,
    pub result_poll_timeout: Duration,
    /// Records claimed per poll.
    pub batch_size: usize,
    /// Pause after a failed poll.
    pub error_backoff: Duration,
}

impl StreamSettings {
    /// Request stream of a kind, e.g. `lint-requests`.
    pub fn request_stream(kind: TaskKind) -> String {
        format!("{}-requests", kind.as_str())
    }

    /// Result stream of a kind, e.g. `lint-results`.
    pub fn result_stream(kind: TaskKind) -> String {
        format!("{}-results", kind.as_str())
    }

    /// Consumer group reading a kind's request stream.
    pub fn request_group(kind: TaskKind) -> String {
        format!("{}-request-handlers", kind.as_str())
    }

    /// Consumer group reading a kind's result stream.
    pub fn result_group(kind: TaskKind) -> String {
        format!("{}-result-listeners", kind.as_str())
    }

    /// Consumer config for a kind's request stream.
    pub fn request_consumer(&self, kind: TaskKind, consumer: &str) -> ConsumerConfig {
        ConsumerConfig::new(
            Self::request_stream(kind),
            Self::request_group(kind),
            consumer,
            self.request_poll_timeout,
        )
        .with_batch_size(self.batch_size)
        .with_error_backoff(self.error_backoff)
    }

    /// Consumer config for a kind's result stream.
    pub fn result_consumer(&self, kind: TaskKind, consumer: &str) -> ConsumerConfig {
        ConsumerConfig::new(
            Self::result_stream(kind),
            Self::result_group(kind),
            consumer,
            self.result_poll_timeout,
        )
        .with_batch_size(self.batch_size)
        .with_error_backoff(self.error_backoff)
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            request_poll_timeout: REQUEST_POLL_TIMEOUT,
            result_poll_timeout: RESULT_POLL_TIMEOUT,
            batch_size: 10,
            error_backoff: Duration::from_secs(1),
        }
    }
}
