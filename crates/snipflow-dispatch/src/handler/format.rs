use async_trait::async_trait;
use tracing::{debug, warn};

use snipflow_core::{FormatResult, RequestEvent, RuleKind, TaskKind};
use snipflow_stream::RecordHandler;

use super::{ensure_kind, load_rules, run_blocking, Collaborators, EngineJob, FormatConfig};
use crate::error::DispatchError;
use crate::result::ResultProducer;

/// Formats the requested snippet with its owner's format rules and, when
/// configured, writes the formatted source back in place.
pub struct FormatRequestHandler {
    collaborators: Collaborators,
    results: ResultProducer,
    config: FormatConfig,
}

impl FormatRequestHandler {
    pub fn new(collaborators: Collaborators, results: ResultProducer, config: FormatConfig) -> Self {
        Self {
            collaborators,
            results,
            config,
        }
    }

    async fn format(&self, event: &RequestEvent) -> Result<FormatResult, DispatchError> {
        ensure_kind(TaskKind::Format, event)?;
        let c = &self.collaborators;

        let source = c
            .content
            .get(&event.content_container, &event.content_key)
            .await?;
        let rules =
            load_rules(c.rules.as_ref(), event.user_id.as_deref(), RuleKind::FormatRules).await?;

        let formatted = run_blocking(&c.engine, EngineJob::new(event, source, rules), |engine, input| {
            engine.format(input)
        })
        .await?;

        if self.config.persist_formatted {
            c.content
                .put(&event.content_container, &event.content_key, &formatted)
                .await?;
            debug!(request_id = %event.request_id, key = %event.content_key, "Formatted source stored");
        }

        Ok(FormatResult::completed(event, formatted))
    }
}

#[async_trait]
impl RecordHandler for FormatRequestHandler {
    type Event = RequestEvent;
    type Error = DispatchError;

    async fn handle(&self, event: RequestEvent) -> Result<(), DispatchError> {
        let result = match self.format(&event).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    request_id = %event.request_id,
                    snippet_id = %event.snippet_id,
                    error = %e,
                    "Format request failed"
                );
                FormatResult::failed(&event, e.to_string())
            }
        };
        self.results.publish(&result).await?;
        Ok(())
    }
}
