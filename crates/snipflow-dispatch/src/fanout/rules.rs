use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use snipflow_core::RuleKind;

use super::paginator::SnippetPaginator;
use crate::producer::TaskProducer;

/// Counts from one fan-out run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    /// Snippets visited.
    pub processed: usize,
    /// Tasks submitted.
    pub submitted: usize,
    /// Submissions that failed.
    pub failed: usize,
}

/// Reacts to a user's rule configuration changing.
#[async_trait]
pub trait RuleUpdateHandler: Send + Sync {
    fn can_handle(&self, kind: RuleKind) -> bool;

    /// Re-submit work for every snippet of `user_id`.
    async fn handle(&self, user_id: &str) -> FanoutReport;
}

/// Re-submits one task per snippet of the user whose rules changed.
pub struct ResubmitOnRuleChange {
    rule_kind: RuleKind,
    paginator: SnippetPaginator,
    producer: Arc<TaskProducer>,
    page_size: usize,
}

impl ResubmitOnRuleChange {
    pub fn new(
        rule_kind: RuleKind,
        paginator: SnippetPaginator,
        producer: Arc<TaskProducer>,
        page_size: usize,
    ) -> Self {
        Self {
            rule_kind,
            paginator,
            producer,
            page_size,
        }
    }

    /// Re-lint on lint rule changes.
    pub fn lint(paginator: SnippetPaginator, producer: Arc<TaskProducer>, page_size: usize) -> Self {
        Self::new(RuleKind::LintRules, paginator, producer, page_size)
    }

    /// Re-format on format rule changes.
    pub fn format(paginator: SnippetPaginator, producer: Arc<TaskProducer>, page_size: usize) -> Self {
        Self::new(RuleKind::FormatRules, paginator, producer, page_size)
    }
}

#[async_trait]
impl RuleUpdateHandler for ResubmitOnRuleChange {
    fn can_handle(&self, kind: RuleKind) -> bool {
        kind == self.rule_kind
    }

    async fn handle(&self, user_id: &str) -> FanoutReport {
        let task_kind = self.rule_kind.task_kind();
        let submitted = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let producer = &self.producer;

        let processed = self
            .paginator
            .process_all_snippets(user_id, self.page_size, |snippet| {
                let (submitted, failed) = (&submitted, &failed);
                async move {
                    match producer.request(task_kind, &snippet.to_context()).await {
                        Ok(_) => {
                            submitted.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            warn!(
                                snippet_id = %snippet.id,
                                kind = %task_kind,
                                error = %e,
                                "Re-submission failed, continuing"
                            );
                        }
                    }
                }
            })
            .await;

        let report = FanoutReport {
            processed,
            submitted: submitted.into_inner(),
            failed: failed.into_inner(),
        };
        info!(
            user_id,
            rule_kind = %self.rule_kind,
            processed = report.processed,
            submitted = report.submitted,
            failed = report.failed,
            "Rule change fan-out finished"
        );
        report
    }
}
