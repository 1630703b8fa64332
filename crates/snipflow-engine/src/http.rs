//! HTTP client for the snippet catalog service.
//!
//! Snippet metadata, rule configurations, and test cases live in the catalog
//! service's REST API. Only the reads the dispatch layer needs are covered.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use snipflow_core::{Page, RuleKind, SnippetId, SnippetSummary};

use crate::error::EngineError;
use crate::store::{RuleConfigStore, SnippetStore, TestCase, TestCaseStore};

/// HTTP client for the catalog REST API.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    inner: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    /// Create a new catalog client.
    pub fn new(base_url: &str) -> Self {
        Self {
            inner: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// GET a JSON document; `Ok(None)` on 404.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, EngineError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET request");

        let response = self.inner.get(&url).query(query).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(EngineError::Status {
                status: response.status().as_u16(),
                path: path.to_string(),
            });
        }

        Ok(Some(response.json().await?))
    }
}

fn rule_path(kind: RuleKind) -> &'static str {
    match kind {
        RuleKind::LintRules => "/v1/rules/lint",
        RuleKind::FormatRules => "/v1/rules/format",
    }
}

#[async_trait]
impl SnippetStore for CatalogClient {
    async fn find_by_owner(
        &self,
        user_id: &str,
        page: usize,
        page_size: usize,
    ) -> Result<Page<SnippetSummary>, EngineError> {
        let query = [
            ("owner", user_id.to_string()),
            ("page", page.to_string()),
            ("size", page_size.to_string()),
        ];
        Ok(self
            .get_json("/v1/snippets", &query)
            .await?
            .unwrap_or_else(|| Page::empty(page)))
    }
}

#[async_trait]
impl RuleConfigStore for CatalogClient {
    async fn rules(&self, user_id: &str, kind: RuleKind) -> Result<Option<Value>, EngineError> {
        self.get_json(rule_path(kind), &[("user", user_id.to_string())])
            .await
    }
}

#[async_trait]
impl TestCaseStore for CatalogClient {
    async fn for_snippet(&self, snippet_id: SnippetId) -> Result<Vec<TestCase>, EngineError> {
        let path = format!("/v1/snippets/{}/tests", snippet_id);
        Ok(self.get_json(&path, &[]).await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = CatalogClient::new("http://catalog.local:8081/");
        assert_eq!(client.base_url, "http://catalog.local:8081");
    }

    #[test]
    fn test_rule_paths() {
        assert_eq!(rule_path(RuleKind::LintRules), "/v1/rules/lint");
        assert_eq!(rule_path(RuleKind::FormatRules), "/v1/rules/format");
    }

    #[tokio::test]
    async fn test_unreachable_catalog_is_http_error() {
        let client = CatalogClient::new("http://127.0.0.1:1");
        let err = client.find_by_owner("u1", 0, 10).await.unwrap_err();
        assert!(matches!(err, EngineError::Http(_)));
    }
}
