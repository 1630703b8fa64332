//! Rule-change fan-out.
//!
//! When a user saves a rule configuration, every snippet they own is
//! re-submitted for the task kind that rule governs. Snippets are walked one
//! page at a time; a failed submission is logged and skipped, a failed page
//! ends the walk.

mod paginator;
mod rules;

pub use paginator::SnippetPaginator;
pub use rules::{FanoutReport, ResubmitOnRuleChange, RuleUpdateHandler};

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use snipflow_core::RuleKind;

use crate::error::DispatchError;

/// Fan-out settings.
#[derive(Debug, Clone)]
pub struct FanoutConfig {
    /// Snippets fetched per page.
    pub page_size: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self { page_size: 20 }
    }
}

/// Routes rule-change notifications to the handler for their rule kind.
pub struct RuleUpdateDispatcher {
    handlers: HashMap<RuleKind, Arc<dyn RuleUpdateHandler>>,
}

impl RuleUpdateDispatcher {
    /// Build the routing table; the first handler accepting a kind wins.
    pub fn new(handlers: Vec<Arc<dyn RuleUpdateHandler>>) -> Self {
        let mut routes = HashMap::new();
        for kind in RuleKind::ALL {
            match handlers.iter().find(|h| h.can_handle(kind)) {
                Some(handler) => {
                    routes.insert(kind, handler.clone());
                }
                None => warn!(rule_kind = %kind, "No handler reacts to rule kind"),
            }
        }
        Self { handlers: routes }
    }

    fn handler(&self, kind: RuleKind) -> Result<Arc<dyn RuleUpdateHandler>, DispatchError> {
        self.handlers
            .get(&kind)
            .cloned()
            .ok_or(DispatchError::NoRuleHandler(kind))
    }

    /// Run the fan-out for `user_id` to completion.
    pub async fn handle(&self, kind: RuleKind, user_id: &str) -> Result<FanoutReport, DispatchError> {
        let handler = self.handler(kind)?;
        Ok(handler.handle(user_id).await)
    }

    /// Start the fan-out in the background and return at once.
    pub fn trigger(&self, kind: RuleKind, user_id: &str) -> Result<JoinHandle<FanoutReport>, DispatchError> {
        let handler = self.handler(kind)?;
        let user_id = user_id.to_string();
        debug!(rule_kind = %kind, user_id = %user_id, "Rule change fan-out scheduled");
        Ok(tokio::spawn(async move { handler.handle(&user_id).await }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    #[derive(Default)]
    struct Counting {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl RuleUpdateHandler for Counting {
        fn can_handle(&self, kind: RuleKind) -> bool {
            kind == RuleKind::LintRules
        }

        async fn handle(&self, _user_id: &str) -> FanoutReport {
            self.runs.fetch_add(1, Ordering::SeqCst);
            FanoutReport {
                processed: 4,
                submitted: 4,
                failed: 0,
            }
        }
    }

    #[tokio::test]
    async fn test_handle_routes_by_rule_kind() {
        let counting = Arc::new(Counting::default());
        let dispatcher = RuleUpdateDispatcher::new(vec![counting.clone() as Arc<dyn RuleUpdateHandler>]);

        let report = dispatcher.handle(RuleKind::LintRules, "u1").await.unwrap();
        assert_eq!(report.processed, 4);

        let err = dispatcher.handle(RuleKind::FormatRules, "u1").await.unwrap_err();
        assert!(matches!(err, DispatchError::NoRuleHandler(RuleKind::FormatRules)));
        assert_eq!(counting.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_trigger_runs_in_background() {
        let counting = Arc::new(Counting::default());
        let dispatcher = RuleUpdateDispatcher::new(vec![counting.clone() as Arc<dyn RuleUpdateHandler>]);

        let running = dispatcher.trigger(RuleKind::LintRules, "u1").unwrap();
        let report = running.await.unwrap();

        assert_eq!(report.submitted, 4);
        assert_eq!(counting.runs.load(Ordering::SeqCst), 1);
        assert!(dispatcher.trigger(RuleKind::FormatRules, "u1").is_err());
    }
}
