//! Snippet summaries as returned by the snippet store.

use serde::{Deserialize, Serialize};

use crate::{SnippetId, TaskContext};

/// The parts of a stored snippet the dispatch layer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetSummary {
    pub id: SnippetId,
    pub owner_id: String,
    pub name: String,
    pub language_id: String,
    pub version: String,
    pub content_container: String,
    pub content_key: String,
}

impl SnippetSummary {
    /// Task context for re-submitting work on this snippet.
    pub fn to_context(&self) -> TaskContext {
        TaskContext::new(
            self.id,
            self.content_container.clone(),
            self.content_key.clone(),
            self.version.clone(),
        )
        .with_user(self.owner_id.clone())
        .with_language(self.language_id.clone())
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page, in store order.
    pub items: Vec<T>,
    /// Zero-based page number.
    pub page: usize,
    /// Whether a further page exists.
    pub has_next: bool,
}

impl<T> Page<T> {
    /// The page after the last one.
    pub fn empty(page: usize) -> Self {
        Self {
            items: Vec::new(),
            page,
            has_next: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TaskKind;

    #[test]
    fn test_context_from_snippet_is_lintable() {
        let snippet = SnippetSummary {
            id: SnippetId::new(3),
            owner_id: "u1".into(),
            name: "hello".into(),
            language_id: "printscript".into(),
            version: "1.1".into(),
            content_container: "snippets".into(),
            content_key: "u1/3".into(),
        };
        let ctx = snippet.to_context();
        assert_eq!(ctx.snippet_id, SnippetId::new(3));
        assert!(ctx.validate_for(TaskKind::Lint).is_ok());
    }
}
