//! Video search through yt-dlp's `ytsearch` extractor.

use super::{ExampleItem, SearchBackend};
use crate::error::{Result, SpeakeasyError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// YouTube search via yt-dlp.
pub struct YtDlpSearch {
    timeout: Duration,
}

impl YtDlpSearch {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for YtDlpSearch {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[async_trait]
impl SearchBackend for YtDlpSearch {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<ExampleItem>> {
        if max_results == 0 {
            return Ok(Vec::new());
        }

        let target = format!("ytsearch{}:{}", max_results, query);

        let mut command = tokio::process::Command::new("yt-dlp");
        command
            .args([
                "--dump-json",
                "--flat-playlist",
                "--no-download",
                "--no-warnings",
                "--ignore-errors",
                &target,
            ])
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                SpeakeasyError::Search(format!(
                    "yt-dlp search timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    SpeakeasyError::ToolNotFound("yt-dlp".to_string())
                } else {
                    SpeakeasyError::Search(format!("Failed to run yt-dlp: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SpeakeasyError::Search(format!("yt-dlp search failed: {}", stderr)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut items = parse_search_output(&stdout, query);
        items.truncate(max_results);
        debug!("Found {} results", items.len());
        Ok(items)
    }
}

/// Parse yt-dlp `--dump-json` output: one JSON object per line.
fn parse_search_output(stdout: &str, keyword: &str) -> Vec<ExampleItem> {
    let mut items = Vec::new();

    for line in stdout.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let Ok(json) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };

        let url = json["webpage_url"]
            .as_str()
            .or_else(|| json["url"].as_str())
            .and_then(|u| Url::parse(u).ok())
            .map(|u| u.to_string())
            .or_else(|| {
                json["id"]
                    .as_str()
                    .map(|id| format!("https://www.youtube.com/watch?v={}", id))
            });

        let Some(url) = url else {
            continue;
        };

        items.push(ExampleItem {
            url,
            title: json["title"].as_str().map(|s| s.to_string()),
            channel: json["channel"]
                .as_str()
                .or_else(|| json["uploader"].as_str())
                .map(|s| s.to_string()),
            duration_seconds: json["duration"].as_f64().map(|d| d as u32),
            summary: json["description"]
                .as_str()
                .filter(|d| !d.trim().is_empty())
                .map(|d| d.chars().take(200).collect()),
            relevance: Some(keyword.to_string()),
        });
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_output() {
        let stdout = r#"{"id": "abc123def45", "url": "https://www.youtube.com/watch?v=abc123def45", "title": "Great Keynote", "channel": "TEDx Talks", "duration": 754.0, "description": null}

not json
{"id": "zzz999yyy88", "title": "No URL", "uploader": "Someone"}
{"title": "No identity at all"}
"#;

        let items = parse_search_output(stdout, "keynote marine biology");
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].url, "https://www.youtube.com/watch?v=abc123def45");
        assert_eq!(items[0].title.as_deref(), Some("Great Keynote"));
        assert_eq!(items[0].channel.as_deref(), Some("TEDx Talks"));
        assert_eq!(items[0].duration_seconds, Some(754));
        assert_eq!(items[0].summary, None);
        assert_eq!(items[0].relevance.as_deref(), Some("keynote marine biology"));

        assert_eq!(items[1].url, "https://www.youtube.com/watch?v=zzz999yyy88");
        assert_eq!(items[1].channel.as_deref(), Some("Someone"));
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_search_output("", "anything").is_empty());
    }
}
