//! Search backends for reference speech examples.

mod ytdlp;

pub use ytdlp::YtDlpSearch;

use crate::config::{RetrievalSettings, SearchProvider};
use crate::error::{Result, SpeakeasyError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// A reference speech found by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleItem {
    /// Identity of the example; deduplication is by URL.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// The keyword that surfaced this example.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<String>,
}

impl ExampleItem {
    /// An example known only by its URL.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            channel: None,
            duration_seconds: None,
            summary: None,
            relevance: None,
        }
    }

    /// One-line description for prompts.
    pub fn describe(&self) -> String {
        let mut line = match &self.title {
            Some(title) => format!("{} ({})", title, self.url),
            None => self.url.clone(),
        };
        if let Some(channel) = &self.channel {
            line.push_str(&format!(" by {}", channel));
        }
        if let Some(summary) = &self.summary {
            line.push_str(&format!(": {}", summary));
        }
        line
    }
}

/// Trait for search services returning reference examples.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Search for at most `max_results` examples matching `query`.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<ExampleItem>>;
}

/// Create the configured search backend.
pub fn create_search_backend(settings: &RetrievalSettings) -> Arc<dyn SearchBackend> {
    match settings.provider {
        SearchProvider::Ytdlp => Arc::new(YtDlpSearch::new(Duration::from_secs(
            settings.search_timeout_secs,
        ))),
        SearchProvider::Disabled => Arc::new(DisabledSearch),
    }
}

/// Search backend that never finds anything.
pub struct DisabledSearch;

#[async_trait]
impl SearchBackend for DisabledSearch {
    async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<ExampleItem>> {
        Err(SpeakeasyError::Search(format!(
            "search is disabled (query: {})",
            query
        )))
    }
}

/// Search backend answering from a fixed keyword table.
///
/// Unknown keywords fail, which makes it easy to simulate partial coverage.
pub struct FixedSearch {
    results: HashMap<String, Vec<ExampleItem>>,
    queries: Mutex<Vec<(String, usize)>>,
}

impl FixedSearch {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Answer `keyword` with examples at the given URLs.
    pub fn with_urls(mut self, keyword: &str, urls: &[&str]) -> Self {
        self.results.insert(
            keyword.to_string(),
            urls.iter().map(|u| ExampleItem::from_url(*u)).collect(),
        );
        self
    }

    /// Queries received so far with their result bound.
    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Default for FixedSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchBackend for FixedSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<ExampleItem>> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((query.to_string(), max_results));

        match self.results.get(query) {
            Some(items) => Ok(items.iter().take(max_results).cloned().collect()),
            None => Err(SpeakeasyError::Search(format!("no results scripted for '{}'", query))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let mut item = ExampleItem::from_url("https://youtu.be/x");
        assert_eq!(item.describe(), "https://youtu.be/x");

        item.title = Some("Keynote".to_string());
        item.channel = Some("TED".to_string());
        assert_eq!(item.describe(), "Keynote (https://youtu.be/x) by TED");
    }

    #[test]
    fn test_serialization_skips_missing_fields() {
        let item = ExampleItem::from_url("https://youtu.be/x");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json, serde_json::json!({ "url": "https://youtu.be/x" }));
    }

    #[tokio::test]
    async fn test_fixed_search_bounds_results() {
        let search = FixedSearch::new().with_urls("ted", &["A", "B", "C"]);
        let hits = search.search("ted", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(search.search("other", 2).await.is_err());
        assert_eq!(search.queries().len(), 2);
    }

    #[tokio::test]
    async fn test_disabled_search_fails() {
        assert!(DisabledSearch.search("anything", 3).await.is_err());
    }
}
