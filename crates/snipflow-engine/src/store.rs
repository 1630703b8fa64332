//! Store contracts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use snipflow_core::{Page, RuleKind, SnippetId, SnippetSummary};

use crate::error::EngineError;

/// Blob storage for snippet sources, addressed by container and key.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch the content stored at `container/key`.
    async fn get(&self, container: &str, key: &str) -> Result<String, EngineError>;

    /// Store `content` at `container/key`, replacing what was there.
    async fn put(&self, container: &str, key: &str, content: &str) -> Result<(), EngineError>;
}

/// Paginated snippet metadata, owned by the snippet service.
#[async_trait]
pub trait SnippetStore: Send + Sync {
    /// Fetch page `page` (zero-based) of the snippets owned by `user_id`.
    async fn find_by_owner(
        &self,
        user_id: &str,
        page: usize,
        page_size: usize,
    ) -> Result<Page<SnippetSummary>, EngineError>;
}

/// Per-user rule configuration, owned by the configuration service.
#[async_trait]
pub trait RuleConfigStore: Send + Sync {
    /// Rule configuration of `kind` for `user_id`, or `None` if the user has
    /// never saved one.
    async fn rules(&self, user_id: &str, kind: RuleKind) -> Result<Option<Value>, EngineError>;
}

/// A stored test case for a snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub name: String,
    /// Values fed to the snippet, one per input request.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Output lines the snippet must produce, in order.
    #[serde(default)]
    pub expected_outputs: Vec<String>,
}

/// Test cases, owned by the test service.
#[async_trait]
pub trait TestCaseStore: Send + Sync {
    /// Every test case stored for the snippet.
    async fn for_snippet(&self, snippet_id: SnippetId) -> Result<Vec<TestCase>, EngineError>;
}
