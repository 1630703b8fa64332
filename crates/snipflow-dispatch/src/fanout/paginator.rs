use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error};

use snipflow_core::SnippetSummary;
use snipflow_engine::SnippetStore;

/// Walks every snippet a user owns, one page at a time.
#[derive(Clone)]
pub struct SnippetPaginator {
    store: Arc<dyn SnippetStore>,
}

impl SnippetPaginator {
    pub fn new(store: Arc<dyn SnippetStore>) -> Self {
        Self { store }
    }

    /// Call `on_snippet` for each snippet of `user_id`, in page order, and
    /// return how many were visited.
    ///
    /// Only one page is held at a time. A page that fails to load ends the
    /// walk; snippets already visited stay counted.
    pub async fn process_all_snippets<F, Fut>(
        &self,
        user_id: &str,
        page_size: usize,
        mut on_snippet: F,
    ) -> usize
    where
        F: FnMut(SnippetSummary) -> Fut + Send,
        Fut: Future<Output = ()> + Send,
    {
        let mut processed = 0;
        let mut page = 0;
        loop {
            let current = match self.store.find_by_owner(user_id, page, page_size).await {
                Ok(current) => current,
                Err(e) => {
                    error!(user_id, page, error = %e, "Failed to fetch snippet page, stopping");
                    break;
                }
            };

            debug!(user_id, page, items = current.items.len(), "Fetched snippet page");
            let last = !current.has_next || current.items.is_empty();
            for snippet in current.items {
                on_snippet(snippet).await;
                processed += 1;
            }
            if last {
                break;
            }
            page += 1;
        }
        processed
    }
}
