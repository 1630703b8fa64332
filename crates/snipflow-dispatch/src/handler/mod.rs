//! Request handlers - one per task kind.
//!
//! Each handler consumes its kind's request stream, fetches the snippet
//! source, runs the language engine on a blocking thread, and publishes
//! exactly one result event per request. Failures anywhere along the way are
//! turned into a failure result carrying the request id; the handler only
//! returns an error when the result itself cannot be published.

mod format;
mod lint;

pub use format::FormatRequestHandler;
pub use lint::LintRequestHandler;
pub use test::TestRequestHandler;

use std::sync::Arc;

use serde_json::{json, Value};

use snipflow_core::{RequestEvent, RuleKind, TaskKind};
use snipflow_engine::{
    ContentStore, EngineError, EngineInput, LanguageEngine, RuleConfigStore, TestCaseStore,
};

use crate::error::DispatchError;

/// External services the request handlers call.
#[derive(Clone)]
pub struct Collaborators {
    pub content: Arc<dyn ContentStore>,
    pub engine: Arc<dyn LanguageEngine>,
    pub rules: Arc<dyn RuleConfigStore>,
    pub tests: Arc<dyn TestCaseStore>,
}

/// Format handler settings.
#[derive(Debug, Clone)]
pub struct FormatConfig {
    /// Write the formatted source back over the original.
    pub persist_formatted: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            persist_formatted: true,
        }
    }
}

fn ensure_kind(expected: TaskKind, event: &RequestEvent) -> Result<(), DispatchError> {
    if event.kind == expected {
        Ok(())
    } else {
        Err(DispatchError::KindMismatch {
            expected,
            actual: event.kind,
        })
    }
}

/// The user's rule configuration, or an empty object when there is none.
async fn load_rules(
    rules: &dyn RuleConfigStore,
    user_id: Option<&str>,
    kind: RuleKind,
) -> Result<Value, DispatchError> {
    let Some(user_id) = user_id else {
        return Ok(json!({}));
    };
    Ok(rules.rules(user_id, kind).await?.unwrap_or_else(|| json!({})))
}

/// Owned engine input, moved onto the blocking thread.
struct EngineJob {
    source: String,
    version: String,
    language: Option<String>,
    config: Value,
}

impl EngineJob {
    fn new(event: &RequestEvent, source: String, config: Value) -> Self {
        Self {
            source,
            version: event.version.clone(),
            language: event.language_id.clone(),
            config,
        }
    }

    fn input(&self) -> EngineInput<'_> {
        EngineInput {
            source: &self.source,
            version: &self.version,
            language: self.language.as_deref(),
            config: &self.config,
        }
    }
}

/// Run a blocking engine call on the blocking pool.
async fn run_blocking<T, F>(
    engine: &Arc<dyn LanguageEngine>,
    job: EngineJob,
    call: F,
) -> Result<T, DispatchError>
where
    T: Send + 'static,
    F: FnOnce(&dyn LanguageEngine, &EngineInput<'_>) -> Result<T, EngineError> + Send + 'static,
{
    let engine = engine.clone();
    let joined = tokio::task::spawn_blocking(move || call(engine.as_ref(), &job.input())).await;
    match joined {
        Ok(result) => Ok(result?),
        Err(e) => Err(DispatchError::Join(e.to_string())),
    }
}
