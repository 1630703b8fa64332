use async_trait::async_trait;
use tracing::{debug, warn};

use snipflow_core::{LintResult, RequestEvent, RuleKind, TaskKind};
use snipflow_stream::RecordHandler;

use super::{ensure_kind, load_rules, run_blocking, Collaborators, EngineJob};
use crate::error::DispatchError;
use crate::result::ResultProducer;

/// Lints the requested snippet against its owner's lint rules.
pub struct LintRequestHandler {
    collaborators: Collaborators,
    results: ResultProducer,
}

impl LintRequestHandler {
    pub fn new(collaborators: Collaborators, results: ResultProducer) -> Self {
        Self {
            collaborators,
            results,
        }
    }

    async fn lint(&self, event: &RequestEvent) -> Result<LintResult, DispatchError> {
        ensure_kind(TaskKind::Lint, event)?;
        let c = &self.collaborators;

        let source = c
            .content
            .get(&event.content_container, &event.content_key)
            .await?;
        let config = load_rules(c.rules.as_ref(), event.user_id.as_deref(), RuleKind::LintRules).await?;

        let violations = run_blocking(&c.engine, EngineJob::new(event, source, config), |engine, input| {
            engine.lint(input)
        })
        .await?;

        debug!(
            request_id = %event.request_id,
            violations = violations.len(),
            "Lint finished"
        );
        Ok(LintResult::completed(event, violations))
    }
}

#[async_trait]
impl RecordHandler for LintRequestHandler {
    type Event = RequestEvent;
    type Error = DispatchError;

    async fn handle(&self, event: RequestEvent) -> Result<(), DispatchError> {
        let result = match self.lint(&event).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    request_id = %event.request_id,
                    snippet_id = %event.snippet_id,
                    error = %e,
                    "Lint request failed"
                );
                LintResult::failed(&event, e.to_string())
            }
        };
        self.results.publish(&result).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use snipflow_engine::memory::MemoryRuleStore;

    use crate::handler::testing::{
        collaborators, content, published, request, streams, ScriptedEngine, UnreachableContent,
    };

    #[tokio::test]
    async fn test_publishes_violations() {
        let streams = streams();
        let handler = LintRequestHandler::new(
            collaborators(content("let x = 1"), Arc::new(ScriptedEngine::with_diagnostics(2))),
            ResultProducer::new(streams.clone()),
        );
        let req = request(TaskKind::Lint);

        handler.handle(req.clone()).await.unwrap();

        let results = published(&streams, "lint-results");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["request_id"], json!(req.request_id.as_str()));
        assert_eq!(results[0]["valid"], json!(false));
        assert_eq!(results[0]["violations"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_content_failure_publishes_one_failure() {
        let streams = streams();
        let engine = Arc::new(ScriptedEngine::default());
        let handler = LintRequestHandler::new(
            collaborators(Arc::new(UnreachableContent), engine.clone()),
            ResultProducer::new(streams.clone()),
        );
        let req = request(TaskKind::Lint);

        handler.handle(req.clone()).await.unwrap();

        let results = published(&streams, "lint-results");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["request_id"], json!(req.request_id.as_str()));
        assert_eq!(results[0]["valid"], json!(false));
        assert!(results[0]["error"]
            .as_str()
            .unwrap()
            .contains("content store unreachable"));
        assert_eq!(engine.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_engine_failure_publishes_failure() {
        let streams = streams();
        let handler = LintRequestHandler::new(
            collaborators(content("boom"), Arc::new(ScriptedEngine::default())),
            ResultProducer::new(streams.clone()),
        );

        handler.handle(request(TaskKind::Lint)).await.unwrap();

        let results = published(&streams, "lint-results");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["error"], json!("engine exploded"));
    }

    #[tokio::test]
    async fn test_wrong_kind_is_reported_not_linted() {
        let streams = streams();
        let handler = LintRequestHandler::new(
            collaborators(content("let x = 1"), Arc::new(ScriptedEngine::default())),
            ResultProducer::new(streams.clone()),
        );

        handler.handle(request(TaskKind::Format)).await.unwrap();

        let results = published(&streams, "lint-results");
        assert_eq!(results.len(), 1);
        assert!(results[0]["error"].as_str().unwrap().contains("Expected a LINT"));
    }

    #[tokio::test]
    async fn test_rules_reach_the_engine() {
        struct RuleEcho;
        impl snipflow_engine::LanguageEngine for RuleEcho {
            fn lint(
                &self,
                input: &snipflow_engine::EngineInput<'_>,
            ) -> Result<Vec<snipflow_core::Violation>, snipflow_engine::EngineError> {
                Ok(vec![snipflow_core::Violation::new(input.config.to_string(), 1, 1)])
            }
            fn format(
                &self,
                input: &snipflow_engine::EngineInput<'_>,
            ) -> Result<String, snipflow_engine::EngineError> {
                Ok(input.source.to_string())
            }
            fn execute(
                &self,
                _input: &snipflow_engine::EngineInput<'_>,
                _output: &mut dyn snipflow_engine::OutputSink,
                _stdin: &mut dyn snipflow_engine::InputSource,
            ) -> Result<(), snipflow_engine::EngineError> {
                Ok(())
            }
        }

        let streams = streams();
        let rules = Arc::new(MemoryRuleStore::new());
        rules
            .save("u1", RuleKind::LintRules, json!({"camelCase": true}))
            .await;
        let mut collab = collaborators(content("let x = 1"), Arc::new(RuleEcho));
        collab.rules = rules;
        let handler = LintRequestHandler::new(collab, ResultProducer::new(streams.clone()));

        handler.handle(request(TaskKind::Lint)).await.unwrap();
        let mut anonymous = request(TaskKind::Lint);
        anonymous.user_id = None;
        handler.handle(anonymous).await.unwrap();

        let results = published(&streams, "lint-results");
        assert_eq!(results[0]["violations"][0]["message"], json!(r#"{"camelCase":true}"#));
        assert_eq!(results[1]["violations"][0]["message"], json!("{}"));
    }
}
