//! Audio download via yt-dlp and probing via ffprobe.
//!
//! Reference examples are fetched as MP3 into a caller-owned directory. The
//! caller decides the file stem so several downloads can share one directory.

use crate::error::{Result, SpeakeasyError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Trait for fetching the audio track of a remote example.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Download `url` into `dest_dir` as `<stem>.mp3` and return the path.
    async fn download(&self, url: &str, stem: &str, dest_dir: &Path) -> Result<PathBuf>;
}

/// Downloads audio with yt-dlp, normalizing to MP3 with ffmpeg when needed.
pub struct YtDlpDownloader {
    timeout: Duration,
}

impl YtDlpDownloader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[async_trait]
impl MediaDownloader for YtDlpDownloader {
    #[instrument(skip(self, dest_dir))]
    async fn download(&self, url: &str, stem: &str, dest_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dest_dir)?;

        let result = self.fetch(url, stem, dest_dir).await;
        if result.is_err() {
            remove_stem_files(dest_dir, stem);
        }
        result
    }
}

impl YtDlpDownloader {
    async fn fetch(&self, url: &str, stem: &str, dest_dir: &Path) -> Result<PathBuf> {
        let target_path = dest_dir.join(format!("{}.mp3", stem));
        let template = dest_dir.join(format!("{}.%(ext)s", stem));

        info!("Downloading reference audio from {}", url);

        let mut command = Command::new("yt-dlp");
        command
            .arg("--extract-audio")
            .arg("--audio-format")
            .arg("mp3")
            .arg("--audio-quality")
            .arg("5")
            .arg("--output")
            .arg(&template)
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("--no-warnings")
            .arg(url)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                SpeakeasyError::Download(format!(
                    "yt-dlp timed out after {}s for {}",
                    self.timeout.as_secs(),
                    url
                ))
            })?;

        let output = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SpeakeasyError::ToolNotFound("yt-dlp".into()));
            }
            Err(e) => {
                return Err(SpeakeasyError::Download(format!("yt-dlp execution failed: {e}")));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SpeakeasyError::Download(format!("yt-dlp failed: {stderr}")));
        }

        let downloaded = find_audio_file(dest_dir, stem)?;

        if downloaded != target_path {
            normalize_to_mp3(&downloaded, &target_path).await?;
            let _ = std::fs::remove_file(&downloaded);
        }

        Ok(target_path)
    }
}

/// Removes every `<stem>.*` file left in `dir` by a failed download.
fn remove_stem_files(dir: &Path, stem: &str) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    let prefix = format!("{}.", stem);
    for entry in entries.flatten() {
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            if let Err(e) = std::fs::remove_file(entry.path()) {
                warn!("Cannot remove partial download {}: {}", entry.path().display(), e);
            } else {
                debug!("Removed partial download {}", entry.path().display());
            }
        }
    }
}

/// Locates a downloaded audio file by stem.
fn find_audio_file(dir: &Path, stem: &str) -> Result<PathBuf> {
    for ext in &["mp3", "opus", "m4a", "webm", "ogg"] {
        let candidate = dir.join(format!("{}.{}", stem, ext));
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| SpeakeasyError::Download(format!("Cannot read directory: {e}")))?;

    let prefix = format!("{}.", stem);
    for entry in entries.flatten() {
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            return Ok(entry.path());
        }
    }

    Err(SpeakeasyError::Download("Audio file not found after download".into()))
}

/// Converts an audio file to MP3 using ffmpeg.
async fn normalize_to_mp3(source: &Path, dest: &Path) -> Result<()> {
    debug!("Converting {:?} to MP3", source);

    let result = Command::new("ffmpeg")
        .arg("-i")
        .arg(source)
        .arg("-vn")
        .arg("-codec:a")
        .arg("libmp3lame")
        .arg("-qscale:a")
        .arg("4")
        .arg("-y")
        .arg("-loglevel")
        .arg("error")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(SpeakeasyError::Download(format!("ffmpeg conversion failed: {err}")))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SpeakeasyError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(SpeakeasyError::Download(format!("ffmpeg error: {e}"))),
    }
}

/// Queries the duration of a media file in seconds using ffprobe.
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let result = Command::new("ffprobe")
        .arg("-v")
        .arg("quiet")
        .arg("-print_format")
        .arg("json")
        .arg("-show_format")
        .arg(path)
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SpeakeasyError::ToolNotFound("ffprobe".into()));
        }
        Err(e) => {
            return Err(SpeakeasyError::ToolFailed(format!("ffprobe failed: {e}")));
        }
    };

    if !output.status.success() {
        return Err(SpeakeasyError::ToolFailed(format!(
            "ffprobe could not read {}",
            path.display()
        )));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

fn parse_probe_output(json_str: &str) -> Result<f64> {
    let parsed: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|_| SpeakeasyError::ToolFailed("Invalid ffprobe output".into()))?;

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| SpeakeasyError::ToolFailed("Could not determine media duration".into()))
}

/// Downloader that writes placeholder files instead of fetching anything.
///
/// URLs registered with [`FixedDownloader::fail_for`] return a download error.
pub struct FixedDownloader {
    failing: HashSet<String>,
    downloads: Mutex<Vec<(String, String)>>,
}

impl FixedDownloader {
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
            downloads: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_for(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// URLs requested so far, failed ones included.
    pub fn requested(&self) -> Vec<String> {
        self.requests().into_iter().map(|(url, _)| url).collect()
    }

    /// `(url, stem)` pairs requested so far, failed ones included.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.downloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for FixedDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaDownloader for FixedDownloader {
    async fn download(&self, url: &str, stem: &str, dest_dir: &Path) -> Result<PathBuf> {
        self.downloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((url.to_string(), stem.to_string()));

        if self.failing.contains(url) {
            return Err(SpeakeasyError::Download(format!("scripted failure for {}", url)));
        }

        std::fs::create_dir_all(dest_dir)?;
        let path = dest_dir.join(format!("{}.mp3", stem));
        std::fs::write(&path, url.as_bytes())?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{"format": {"filename": "talk.wav", "duration": "12.480000"}}"#;
        assert!((parse_probe_output(json).unwrap() - 12.48).abs() < 1e-9);

        assert!(parse_probe_output(r#"{"format": {}}"#).is_err());
        assert!(parse_probe_output("garbage").is_err());
    }

    #[test]
    fn test_find_audio_file_prefers_known_extensions() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ref_01.m4a"), b"x").unwrap();
        std::fs::write(dir.path().join("ref_010.mp3"), b"x").unwrap();

        let found = find_audio_file(dir.path(), "ref_01").unwrap();
        assert_eq!(found, dir.path().join("ref_01.m4a"));
        assert!(find_audio_file(dir.path(), "ref_02").is_err());
    }

    #[test]
    fn test_remove_stem_files_clears_partial_download() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ref_01.webm"), b"partial").unwrap();
        std::fs::write(dir.path().join("ref_01.webm.part"), b"partial").unwrap();
        std::fs::write(dir.path().join("ref_00.mp3"), b"kept").unwrap();
        std::fs::write(dir.path().join("ref_010.mp3"), b"kept").unwrap();

        remove_stem_files(dir.path(), "ref_01");

        assert!(find_audio_file(dir.path(), "ref_01").is_err());
        assert!(dir.path().join("ref_00.mp3").exists());
        assert!(dir.path().join("ref_010.mp3").exists());
    }

    #[tokio::test]
    async fn test_fixed_downloader() {
        let dir = TempDir::new().unwrap();
        let downloader = FixedDownloader::new().fail_for("https://bad");

        let path = downloader
            .download("https://good", "ref_00", dir.path())
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("ref_00.mp3"));
        assert!(path.exists());

        assert!(downloader
            .download("https://bad", "ref_01", dir.path())
            .await
            .is_err());
        assert_eq!(downloader.requested(), vec!["https://good", "https://bad"]);
    }
}
