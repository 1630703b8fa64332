//! Asynchronous task dispatch for snipflow.
//!
//! Submissions flow through three layers:
//!
//! 1. [`TaskProducer`] routes a [`TaskKind`](snipflow_core::TaskKind) to its
//!    [`TaskStrategy`], which validates the context and appends a request
//!    event to the kind's request stream, returning the correlation id.
//! 2. A request handler per kind consumes that stream, calls the content
//!    store and the language engine, and publishes exactly one result event.
//! 3. Result handlers consume the result streams and hand each outcome to a
//!    [`ResultListener`], correlated only by request id.
//!
//! Rule changes fan out through [`RuleUpdateDispatcher`]: every snippet of
//! the user is re-submitted, one page at a time, best-effort per snippet.

mod error;
pub mod fanout;
pub mod handler;
mod producer;
mod result;
mod runtime;
mod strategy;
mod streams;

pub use error::DispatchError;
pub use fanout::{
    FanoutConfig, FanoutReport, ResubmitOnRuleChange, RuleUpdateDispatcher, RuleUpdateHandler,
    SnippetPaginator,
};
pub use handler::{Collaborators, FormatConfig};
pub use producer::TaskProducer;
pub use result::{ResultHandler, ResultListener, ResultOutcome, ResultProducer, ResultTracker};
pub use runtime::{ConsumerTask, Dispatch};
pub use strategy::{FormatTaskStrategy, LintTaskStrategy, TaskStrategy, TestTaskStrategy};
pub use streams::StreamSettings;
