//! In-memory store implementations for testing and local development.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No persistence, no distribution
//! - **Single-process only**: Nothing is visible across process boundaries

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use snipflow_core::{Page, RuleKind, SnippetId, SnippetSummary};

use crate::error::EngineError;
use crate::store::{ContentStore, RuleConfigStore, SnippetStore, TestCase, TestCaseStore};

/// Content keyed by `(container, key)`.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    entries: RwLock<HashMap<(String, String), String>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to seed one entry.
    pub fn with_content(mut self, container: &str, key: &str, content: &str) -> Self {
        self.entries
            .get_mut()
            .insert((container.to_string(), key.to_string()), content.to_string());
        self
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn get(&self, container: &str, key: &str) -> Result<String, EngineError> {
        self.entries
            .read()
            .await
            .get(&(container.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| EngineError::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            })
    }

    async fn put(&self, container: &str, key: &str, content: &str) -> Result<(), EngineError> {
        self.entries
            .write()
            .await
            .insert((container.to_string(), key.to_string()), content.to_string());
        Ok(())
    }
}

/// Snippets ordered by id, so pages are stable between calls.
#[derive(Debug, Default)]
pub struct MemorySnippetStore {
    snippets: RwLock<BTreeMap<SnippetId, SnippetSummary>>,
    page_fetches: AtomicUsize,
}

impl MemorySnippetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a snippet.
    pub async fn insert(&self, snippet: SnippetSummary) {
        self.snippets.write().await.insert(snippet.id, snippet);
    }

    /// Number of pages served so far.
    pub fn page_fetches(&self) -> usize {
        self.page_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnippetStore for MemorySnippetStore {
    async fn find_by_owner(
        &self,
        user_id: &str,
        page: usize,
        page_size: usize,
    ) -> Result<Page<SnippetSummary>, EngineError> {
        self.page_fetches.fetch_add(1, Ordering::SeqCst);
        if page_size == 0 {
            return Err(EngineError::Protocol("page size must be positive".to_string()));
        }

        let snippets = self.snippets.read().await;
        let owned: Vec<&SnippetSummary> =
            snippets.values().filter(|s| s.owner_id == user_id).collect();

        let start = page.saturating_mul(page_size);
        let items = owned
            .iter()
            .skip(start)
            .take(page_size)
            .map(|s| (*s).clone())
            .collect();

        Ok(Page {
            items,
            page,
            has_next: owned.len() > start.saturating_add(page_size),
        })
    }
}

/// Rule configurations keyed by `(user, kind)`.
#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    rules: RwLock<HashMap<(String, RuleKind), Value>>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save a user's rule configuration.
    pub async fn save(&self, user_id: &str, kind: RuleKind, rules: Value) {
        self.rules
            .write()
            .await
            .insert((user_id.to_string(), kind), rules);
    }
}

#[async_trait]
impl RuleConfigStore for MemoryRuleStore {
    async fn rules(&self, user_id: &str, kind: RuleKind) -> Result<Option<Value>, EngineError> {
        Ok(self
            .rules
            .read()
            .await
            .get(&(user_id.to_string(), kind))
            .cloned())
    }
}

/// Test cases keyed by snippet.
#[derive(Debug, Default)]
pub struct MemoryTestCaseStore {
    cases: RwLock<HashMap<SnippetId, Vec<TestCase>>>,
}

impl MemoryTestCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a test case to a snippet.
    pub async fn add(&self, snippet_id: SnippetId, case: TestCase) {
        self.cases
            .write()
            .await
            .entry(snippet_id)
            .or_default()
            .push(case);
    }
}

#[async_trait]
impl TestCaseStore for MemoryTestCaseStore {
    async fn for_snippet(&self, snippet_id: SnippetId) -> Result<Vec<TestCase>, EngineError> {
        Ok(self
            .cases
            .read()
            .await
            .get(&snippet_id)
            .cloned()
            .unwrap_or_default())
    }
}
