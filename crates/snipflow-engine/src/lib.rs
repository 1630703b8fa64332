//! External collaborators consumed by snipflow.
//!
//! The language engine (lint, format, run, test) and the stores that hold
//! snippet sources, snippet metadata, rule configurations, and test cases are
//! owned by other services. This crate defines the contracts the dispatch and
//! session layers depend on, plus the implementations the server wires in:
//!
//! - [`CliEngine`]: runs the language engine as a subprocess speaking JSON lines
//! - [`FsContentStore`]: snippet sources on the local filesystem
//! - [`CatalogClient`]: snippet/rule/test metadata over HTTP
//! - [`memory`]: in-memory stores for tests and local development

mod cli;
mod engine;
mod error;
mod fs;
mod http;
pub mod memory;
mod store;

pub use cli::CliEngine;
pub use engine::{
    CollectingOutput, EngineInput, InputSource, LanguageEngine, OutputSink, ScriptedInput,
};
pub use error::EngineError;
pub use fs::FsContentStore;
pub use http::CatalogClient;
pub use store::{ContentStore, RuleConfigStore, SnippetStore, TestCase, TestCaseStore};
