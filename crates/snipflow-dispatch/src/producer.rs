//! Task producer - routes submissions to their strategy.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use snipflow_core::{RequestId, TaskContext, TaskKind};

use crate::error::DispatchError;
use crate::strategy::TaskStrategy;

/// Routes each task kind to the strategy that submits it.
///
/// The routing table is built once from an ordered strategy list: for every
/// kind, the first strategy whose `can_handle` accepts it wins. The table is
/// never mutated afterwards, so concurrent callers share the producer freely.
pub struct TaskProducer {
    routes: HashMap<TaskKind, Arc<dyn TaskStrategy>>,
}

impl TaskProducer {
    /// Build the routing table from strategies in priority order.
    pub fn new(strategies: Vec<Arc<dyn TaskStrategy>>) -> Self {
        let mut routes = HashMap::new();
        for kind in TaskKind::ALL {
            match strategies.iter().find(|s| s.can_handle(kind)) {
                Some(strategy) => {
                    routes.insert(kind, strategy.clone());
                }
                None => warn!(kind = %kind, "No strategy handles task kind"),
            }
        }
        Self { routes }
    }

    /// Submit a task and return its correlation id.
    pub async fn request(
        &self,
        kind: TaskKind,
        context: &TaskContext,
    ) -> Result<RequestId, DispatchError> {
        let strategy = self
            .routes
            .get(&kind)
            .ok_or(DispatchError::Unroutable(kind))?;

        debug!(kind = %kind, snippet_id = %context.snippet_id, "Routing task");
        strategy.submit(context).await
    }
}
