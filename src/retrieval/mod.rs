//! Reference example retrieval.
//!
//! Retrieval runs in two steps. [`ExampleRetriever::retrieve`] turns a speech
//! context into a deduplicated list of examples: the backend proposes search
//! phrases, each phrase is searched independently and the hits are merged in
//! discovery order. [`ExampleRetriever::materialize`] then downloads the audio
//! of the first few examples into the session's [`ReferenceMedia`] store so
//! the audio grader can listen to them.

mod keywords;
mod reference_media;

pub use keywords::{fallback_keywords, generate_keywords, DEFAULT_KEYWORD};
pub use reference_media::ReferenceMedia;

use crate::audio::MediaDownloader;
use crate::config::{Prompts, RetrievalSettings};
use crate::context::SpeechContext;
use crate::generation::GenerationBackend;
use crate::search::{ExampleItem, SearchBackend};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Finds comparable speeches and fetches their audio.
pub struct ExampleRetriever {
    backend: Arc<dyn GenerationBackend>,
    search: Arc<dyn SearchBackend>,
    downloader: Arc<dyn MediaDownloader>,
    prompts: Prompts,
    results_per_keyword: usize,
    download_reference_media: bool,
    max_reference_media: usize,
}

impl ExampleRetriever {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        search: Arc<dyn SearchBackend>,
        downloader: Arc<dyn MediaDownloader>,
        prompts: Prompts,
        settings: &RetrievalSettings,
    ) -> Self {
        Self {
            backend,
            search,
            downloader,
            prompts,
            results_per_keyword: settings.results_per_keyword,
            download_reference_media: settings.download_reference_media,
            max_reference_media: settings.max_reference_media,
        }
    }

    /// Find at most `limit` distinct examples for `context`. Never fails.
    #[instrument(skip(self, context))]
    pub async fn retrieve(&self, context: &SpeechContext, limit: usize) -> Vec<ExampleItem> {
        let keywords = generate_keywords(self.backend.as_ref(), &self.prompts, context).await;
        info!("Searching examples for {} keywords", keywords.len());

        let mut found = Vec::new();
        for keyword in &keywords {
            match self.search.search(keyword, self.results_per_keyword).await {
                Ok(items) => {
                    debug!("'{}' returned {} results", keyword, items.len());
                    found.extend(items);
                }
                Err(e) => warn!("Search for '{}' failed: {}", keyword, e),
            }
        }

        let examples = dedup_examples(found, limit);
        info!("Retrieved {} examples", examples.len());
        examples
    }

    /// Download reference audio for `examples` into `store`.
    ///
    /// Failed downloads are skipped; an empty store is a valid outcome.
    #[instrument(skip_all, fields(dir = %store.dir().display()))]
    pub async fn materialize(&self, examples: &[ExampleItem], store: &mut ReferenceMedia) {
        if !self.download_reference_media {
            debug!("Reference media download disabled");
            return;
        }

        for (index, example) in examples.iter().take(self.max_reference_media).enumerate() {
            let stem = ReferenceMedia::stem_for(index);
            match self.downloader.download(&example.url, &stem, store.dir()).await {
                Ok(path) => store.push(path),
                Err(e) => warn!("Skipping reference media for {}: {}", example.url, e),
            }
        }

        info!("Materialized {} reference recordings", store.len());
    }
}

/// Keep the first occurrence of each URL, then truncate to `limit`.
pub fn dedup_examples(
    items: impl IntoIterator<Item = ExampleItem>,
    limit: usize,
) -> Vec<ExampleItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.url.clone()))
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::FixedDownloader;
    use crate::generation::ScriptedBackend;
    use crate::search::FixedSearch;
    use tempfile::TempDir;

    fn context() -> SpeechContext {
        SpeechContext {
            specific_topic: "squid light".to_string(),
            general_topic: "marine biology".to_string(),
            format: "keynote".to_string(),
        }
    }

    fn retriever(
        backend: ScriptedBackend,
        search: FixedSearch,
        downloader: FixedDownloader,
    ) -> ExampleRetriever {
        ExampleRetriever::new(
            Arc::new(backend),
            Arc::new(search),
            Arc::new(downloader),
            Prompts::default(),
            &RetrievalSettings::default(),
        )
    }

    fn urls(items: &[ExampleItem]) -> Vec<&str> {
        items.iter().map(|i| i.url.as_str()).collect()
    }

    #[test]
    fn test_dedup_keeps_first_seen_order() {
        let items = ["A", "B", "A", "C"].map(ExampleItem::from_url);
        let deduped = dedup_examples(items, 3);
        assert_eq!(urls(&deduped), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_dedup_truncates() {
        let items = ["A", "B", "C", "D"].map(ExampleItem::from_url);
        assert_eq!(urls(&dedup_examples(items, 2)), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_retrieve_merges_keywords_in_order() {
        let backend = ScriptedBackend::new().with_response(r#"["first", "second"]"#);
        let search = FixedSearch::new()
            .with_urls("first", &["A", "B"])
            .with_urls("second", &["A", "C"]);

        let examples = retriever(backend, search, FixedDownloader::new())
            .retrieve(&context(), 3)
            .await;
        assert_eq!(urls(&examples), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_failed_keyword_is_skipped() {
        let backend = ScriptedBackend::new().with_response(r#"["broken", "works"]"#);
        let search = FixedSearch::new().with_urls("works", &["B"]);

        let examples = retriever(backend, search, FixedDownloader::new())
            .retrieve(&context(), 3)
            .await;
        assert_eq!(urls(&examples), vec!["B"]);
    }

    #[tokio::test]
    async fn test_all_searches_failing_yields_empty_set() {
        let backend = ScriptedBackend::new().with_response(r#"["one", "two", "three"]"#);
        let examples = retriever(backend, FixedSearch::new(), FixedDownloader::new())
            .retrieve(&context(), 3)
            .await;
        assert!(examples.is_empty());
    }

    #[tokio::test]
    async fn test_keyword_failure_uses_fallback_keywords() {
        let search = Arc::new(FixedSearch::new().with_urls("keynote speech", &["X"]));
        let retriever = ExampleRetriever::new(
            Arc::new(ScriptedBackend::new().with_error("offline")),
            search.clone(),
            Arc::new(FixedDownloader::new()),
            Prompts::default(),
            &RetrievalSettings::default(),
        );

        let examples = retriever.retrieve(&context(), 3).await;
        assert_eq!(urls(&examples), vec!["X"]);

        let queried: Vec<String> = search.queries().into_iter().map(|(q, _)| q).collect();
        assert_eq!(
            queried,
            vec!["squid light keynote", "marine biology keynote", "keynote speech"]
        );
    }

    #[tokio::test]
    async fn test_materialize_skips_failed_downloads() {
        let root = TempDir::new().unwrap();
        let mut store = ReferenceMedia::prepare(root.path(), "session").unwrap();

        let downloader = Arc::new(FixedDownloader::new().fail_for("B"));
        let retriever = ExampleRetriever::new(
            Arc::new(ScriptedBackend::new()),
            Arc::new(FixedSearch::new()),
            downloader.clone(),
            Prompts::default(),
            &RetrievalSettings::default(),
        );
        let examples = ["A", "B", "C", "D"].map(ExampleItem::from_url);

        retriever.materialize(&examples, &mut store).await;

        // Bounded by max_reference_media (3): D is never requested.
        assert_eq!(store.len(), 2);
        assert_eq!(store.files()[0], store.dir().join("ref_00.mp3"));
        assert_eq!(store.files()[1], store.dir().join("ref_02.mp3"));
        assert_eq!(std::fs::read(&store.files()[1]).unwrap(), b"C");

        // B's failure does not hand its stem to C.
        let stems: Vec<(String, String)> = downloader.requests();
        assert_eq!(
            stems,
            vec![
                ("A".to_string(), "ref_00".to_string()),
                ("B".to_string(), "ref_01".to_string()),
                ("C".to_string(), "ref_02".to_string()),
            ]
        );

        store.release().unwrap();
    }

    #[tokio::test]
    async fn test_materialize_disabled() {
        let root = TempDir::new().unwrap();
        let mut store = ReferenceMedia::prepare(root.path(), "session").unwrap();

        let settings = RetrievalSettings {
            download_reference_media: false,
            ..Default::default()
        };
        let retriever = ExampleRetriever::new(
            Arc::new(ScriptedBackend::new()),
            Arc::new(FixedSearch::new()),
            Arc::new(FixedDownloader::new()),
            Prompts::default(),
            &settings,
        );

        retriever
            .materialize(&[ExampleItem::from_url("A")], &mut store)
            .await;
        assert!(store.is_empty());
    }
}
