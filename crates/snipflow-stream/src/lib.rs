//! Stream transport for snipflow.
//!
//! This crate provides:
//!
//! - [`StreamTransport`]: named, ordered, append-only logs with consumer groups
//! - [`StreamPublisher`]: typed JSON publishing onto one stream
//! - [`InMemoryStreams`]: single-process transport
//! - [`StreamConsumer`]: long-poll loop that decodes, handles, and acks records
//!
//! ## Delivery model
//!
//! - Every consumer group sees every record of its stream.
//! - Within a group, each record is delivered to exactly one member.
//! - A single member receives records in append order.
//! - Records are acknowledged after one handling attempt, whatever the
//!   outcome. There is no redelivery and no dead-letter stream.

mod consumer;
mod error;
pub mod memory;
mod transport;

pub use consumer::{ConsumerConfig, ConsumerStats, RecordHandler, RecordOutcome, StreamConsumer};
pub use error::StreamError;
pub use memory::InMemoryStreams;
pub use transport::{RecordId, StreamPublisher, StreamRecord, StreamTransport};
