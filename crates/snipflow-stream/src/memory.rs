//! In-memory stream transport.
//!
//! This module provides [`InMemoryStreams`], a single-process implementation
//! of [`StreamTransport`] used by tests and by a single-node deployment.
//!
//! ## Limitations
//!
//! - **No persistence**: records live as long as the process
//! - **Retention by acknowledgement**: a record is dropped once every group
//!   has read and acknowledged it. A stream without groups keeps everything,
//!   and a group created later starts at the oldest retained record.
//! - **Pending records are never redelivered**, even if their consumer dies

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::StreamError;
use crate::transport::{RecordId, StreamRecord, StreamTransport};

/// Delivery state of one consumer group.
#[derive(Debug, Default)]
struct GroupState {
    /// Stream position of the next record to hand out.
    next: u64,
    /// Delivered but unacknowledged records, with the consumer holding each.
    pending: HashMap<RecordId, String>,
}

#[derive(Debug, Default)]
struct StreamLog {
    /// Retained records, oldest first.
    records: VecDeque<StreamRecord>,
    /// Stream position of `records[0]`; everything before it was trimmed.
    base: u64,
    groups: HashMap<String, GroupState>,
}

impl StreamLog {
    /// Records ever appended.
    fn appended(&self) -> u64 {
        self.base + self.records.len() as u64
    }

    /// Drop the records every group has read and acknowledged.
    fn trim(&mut self) {
        let floor = self
            .groups
            .values()
            .map(|g| {
                g.pending
                    .keys()
                    .map(position)
                    .min()
                    .map_or(g.next, |oldest| oldest.min(g.next))
            })
            .min();
        let Some(floor) = floor else {
            return;
        };
        while self.base < floor && self.records.pop_front().is_some() {
            self.base += 1;
        }
    }
}

/// Stream position of a record; ids count from 1.
fn position(id: &RecordId) -> u64 {
    id.seq().saturating_sub(1)
}

/// Converts a lock poison error to a transport error.
fn poison_err<T>(_: PoisonError<T>) -> StreamError {
    StreamError::Unavailable("stream lock poisoned".to_string())
}

/// In-memory streams, all guarded by a single lock.
#[derive(Debug, Default)]
pub struct InMemoryStreams {
    streams: Mutex<HashMap<String, StreamLog>>,
    appended: Notify,
}

impl InMemoryStreams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records delivered to `group` and not yet acknowledged.
    pub fn pending_count(&self, stream: &str, group: &str) -> Result<usize, StreamError> {
        let streams = self.streams.lock().map_err(poison_err)?;
        Ok(streams
            .get(stream)
            .and_then(|log| log.groups.get(group))
            .map_or(0, |g| g.pending.len()))
    }

    /// Retained records of a stream, in append order.
    pub fn records(&self, stream: &str) -> Result<Vec<StreamRecord>, StreamError> {
        let streams = self.streams.lock().map_err(poison_err)?;
        Ok(streams
            .get(stream)
            .map(|log| log.records.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Hand out up to `max` records without waiting.
    fn claim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        max: usize,
    ) -> Result<Vec<StreamRecord>, StreamError> {
        let mut streams = self.streams.lock().map_err(poison_err)?;
        let unknown = || StreamError::UnknownGroup {
            stream: stream.to_string(),
            group: group.to_string(),
        };
        let log = streams.get_mut(stream).ok_or_else(unknown)?;
        let state = log.groups.get_mut(group).ok_or_else(unknown)?;

        let start = state.next.max(log.base);
        let end = (log.base + log.records.len() as u64).min(start.saturating_add(max as u64));
        let batch: Vec<StreamRecord> = log
            .records
            .range((start - log.base) as usize..(end - log.base) as usize)
            .cloned()
            .collect();
        state.next = end;
        for record in &batch {
            state.pending.insert(record.id, consumer.to_string());
        }
        Ok(batch)
    }
}

#[async_trait]
impl StreamTransport for InMemoryStreams {
    async fn append(&self, stream: &str, payload: String) -> Result<RecordId, StreamError> {
        let id = {
            let mut streams = self.streams.lock().map_err(poison_err)?;
            let log = streams.entry(stream.to_string()).or_default();
            let id = RecordId::new(log.appended() + 1);
            log.records.push_back(StreamRecord {
                id,
                stream: stream.to_string(),
                payload,
            });
            id
        };
        self.appended.notify_waiters();
        Ok(id)
    }

    async fn ensure_group(&self, stream: &str, group: &str) -> Result<(), StreamError> {
        let mut streams = self.streams.lock().map_err(poison_err)?;
        let log = streams.entry(stream.to_string()).or_default();
        let base = log.base;
        log.groups
            .entry(group.to_string())
            .or_insert_with(|| GroupState {
                next: base,
                pending: HashMap::new(),
            });
        Ok(())
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        max: usize,
        block: Duration,
    ) -> Result<Vec<StreamRecord>, StreamError> {
        let deadline = Instant::now() + block;
        loop {
            // Register interest before looking, so an append in between still wakes us.
            let appended = self.appended.notified();

            let batch = self.claim(stream, group, consumer, max)?;
            if !batch.is_empty() {
                return Ok(batch);
            }

            if tokio::time::timeout_at(deadline, appended).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn ack(&self, stream: &str, group: &str, ids: &[RecordId]) -> Result<usize, StreamError> {
        let mut streams = self.streams.lock().map_err(poison_err)?;
        let Some(log) = streams.get_mut(stream) else {
            return Ok(0);
        };
        let Some(state) = log.groups.get_mut(group) else {
            return Ok(0);
        };
        let acked = ids
            .iter()
            .filter(|id| state.pending.remove(id).is_some())
            .count();
        log.trim();
        Ok(acked)
    }

    async fn len(&self, stream: &str) -> Result<usize, StreamError> {
        let streams = self.streams.lock().map_err(poison_err)?;
        Ok(streams.get(stream).map_or(0, |log| log.appended() as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const BLOCK: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_records_delivered_in_append_order() {
        let streams = InMemoryStreams::new();
        streams.ensure_group("lint-requests", "lint").await.unwrap();
        for n in 0..3 {
            streams
                .append("lint-requests", format!("r{n}"))
                .await
                .unwrap();
        }

        let batch = streams
            .read_group("lint-requests", "lint", "c1", 10, BLOCK)
            .await
            .unwrap();
        let payloads: Vec<_> = batch.iter().map(|r| r.payload.as_str()).collect();
        assert_eq!(payloads, vec!["r0", "r1", "r2"]);
    }

    #[tokio::test]
    async fn test_group_members_share_without_duplicates() {
        let streams = InMemoryStreams::new();
        streams.ensure_group("s", "g").await.unwrap();
        for n in 0..4 {
            streams.append("s", n.to_string()).await.unwrap();
        }

        let a = streams.read_group("s", "g", "a", 2, BLOCK).await.unwrap();
        let b = streams.read_group("s", "g", "b", 10, BLOCK).await.unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 2);
        assert!(a.iter().all(|r| !b.contains(r)));

        let again = streams.read_group("s", "g", "a", 10, BLOCK).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_every_group_sees_every_record() {
        let streams = InMemoryStreams::new();
        streams.ensure_group("s", "g1").await.unwrap();
        streams.ensure_group("s", "g2").await.unwrap();
        streams.append("s", "x".to_string()).await.unwrap();

        assert_eq!(streams.read_group("s", "g1", "c", 10, BLOCK).await.unwrap().len(), 1);
        assert_eq!(streams.read_group("s", "g2", "c", 10, BLOCK).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_group_is_an_error() {
        let streams = InMemoryStreams::new();
        let err = streams
            .read_group("s", "nobody", "c", 1, BLOCK)
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::UnknownGroup { .. }));
    }

    #[tokio::test]
    async fn test_ack_clears_pending() {
        let streams = InMemoryStreams::new();
        streams.ensure_group("s", "g").await.unwrap();
        let id = streams.append("s", "x".to_string()).await.unwrap();
        streams.read_group("s", "g", "c", 1, BLOCK).await.unwrap();
        assert_eq!(streams.pending_count("s", "g").unwrap(), 1);

        assert_eq!(streams.ack("s", "g", &[id]).await.unwrap(), 1);
        assert_eq!(streams.pending_count("s", "g").unwrap(), 0);
        assert_eq!(streams.ack("s", "g", &[id]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_acked_records_are_dropped() {
        let streams = InMemoryStreams::new();
        streams.ensure_group("s", "g1").await.unwrap();
        streams.ensure_group("s", "g2").await.unwrap();
        for n in 0..3 {
            streams.append("s", n.to_string()).await.unwrap();
        }

        let first = streams.read_group("s", "g1", "c", 2, BLOCK).await.unwrap();
        let ids: Vec<_> = first.iter().map(|r| r.id).collect();
        streams.ack("s", "g1", &ids).await.unwrap();
        // g2 has read nothing yet
        assert_eq!(streams.records("s").unwrap().len(), 3);

        let all = streams.read_group("s", "g2", "c", 10, BLOCK).await.unwrap();
        streams.ack("s", "g2", &[all[0].id]).await.unwrap();
        assert_eq!(streams.records("s").unwrap().len(), 2);

        let ids: Vec<_> = all.iter().map(|r| r.id).collect();
        streams.ack("s", "g2", &ids).await.unwrap();
        let retained = streams.records("s").unwrap();
        assert_eq!(retained.len(), 1);
        assert_eq!(retained[0].payload, "2");
        assert_eq!(streams.len("s").await.unwrap(), 3);

        // Positions keep counting after a trim.
        let id = streams.append("s", "3".to_string()).await.unwrap();
        assert_eq!(id, RecordId::new(4));
        let rest = streams.read_group("s", "g1", "c", 10, BLOCK).await.unwrap();
        let payloads: Vec<_> = rest.iter().map(|r| r.payload.as_str()).collect();
        assert_eq!(payloads, vec!["2", "3"]);
    }

    #[tokio::test]
    async fn test_stream_without_groups_keeps_records() {
        let streams = InMemoryStreams::new();
        streams.append("s", "early".to_string()).await.unwrap();
        assert_eq!(streams.ack("s", "g", &[RecordId::new(1)]).await.unwrap(), 0);

        streams.ensure_group("s", "g").await.unwrap();
        let batch = streams.read_group("s", "g", "c", 10, BLOCK).await.unwrap();
        assert_eq!(batch[0].payload, "early");
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_times_out_empty() {
        let streams = InMemoryStreams::new();
        streams.ensure_group("s", "g").await.unwrap();
        let started = Instant::now();
        let batch = streams
            .read_group("s", "g", "c", 1, Duration::from_secs(10))
            .await
            .unwrap();
        assert!(batch.is_empty());
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_long_poll_wakes_on_append() {
        let streams = Arc::new(InMemoryStreams::new());
        streams.ensure_group("s", "g").await.unwrap();

        let reader = {
            let streams = streams.clone();
            tokio::spawn(async move {
                streams
                    .read_group("s", "g", "c", 1, Duration::from_secs(30))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        streams.append("s", "late".to_string()).await.unwrap();

        let batch = tokio::time::timeout(Duration::from_secs(5), reader)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(batch[0].payload, "late");
    }
}
