//! Scripted generation backend.
//!
//! Replays queued responses in order and records every interaction. Useful for
//! testing stages without network access.

use super::{mime_type_for, GenerationBackend, MediaHandle};
use crate::error::{Result, SpeakeasyError};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Backend that answers from a queue of canned results.
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
    attached: Mutex<Vec<Vec<MediaHandle>>>,
    uploaded: Mutex<Vec<String>>,
    released: Mutex<Vec<String>>,
    failing_uploads: HashSet<String>,
    fail_releases: bool,
}

impl ScriptedBackend {
    /// Create a backend with an empty script.
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            attached: Mutex::new(Vec::new()),
            uploaded: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
            failing_uploads: HashSet::new(),
            fail_releases: false,
        }
    }

    /// Queue a successful response.
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.push_response(text);
        self
    }

    /// Queue a backend failure.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.push_error(message);
        self
    }

    /// Make uploads of `path` fail.
    pub fn fail_upload(mut self, path: impl Into<String>) -> Self {
        self.failing_uploads.insert(path.into());
        self
    }

    /// Make every release fail (after being recorded).
    pub fn fail_releases(mut self) -> Self {
        self.fail_releases = true;
        self
    }

    pub fn push_response(&self, text: impl Into<String>) {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner).push_back(Ok(text.into()));
    }

    pub fn push_error(&self, message: impl Into<String>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(SpeakeasyError::BackendUnavailable(message.into())));
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of generation calls made.
    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Media attached to each multimodal call.
    pub fn attached(&self) -> Vec<Vec<MediaHandle>> {
        self.attached.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Paths uploaded successfully.
    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Handle names passed to `release_media`, including failed releases.
    pub fn released(&self) -> Vec<String> {
        self.released.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// How many times the handle for `name` was released.
    pub fn release_count(&self, name: &str) -> usize {
        self.released
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|n| n.as_str() == name)
            .count()
    }

    fn next_response(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).push(prompt.to_string());
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                Err(SpeakeasyError::BackendUnavailable(
                    "scripted backend has no response queued".to_string(),
                ))
            })
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.next_response(prompt)
    }

    async fn upload_media(&self, path: &Path) -> Result<MediaHandle> {
        let name = path.display().to_string();
        if self.failing_uploads.contains(&name) {
            return Err(SpeakeasyError::BackendUnavailable(format!(
                "scripted upload failure for {}",
                name
            )));
        }
        self.uploaded.lock().unwrap_or_else(PoisonError::into_inner).push(name.clone());
        Ok(MediaHandle {
            uri: format!("scripted://{}", name),
            mime_type: mime_type_for(path).to_string(),
            name,
        })
    }

    async fn generate_with_media(&self, prompt: &str, media: &[MediaHandle]) -> Result<String> {
        self.attached.lock().unwrap_or_else(PoisonError::into_inner).push(media.to_vec());
        self.next_response(prompt)
    }

    async fn release_media(&self, handle: &MediaHandle) -> Result<()> {
        self.released.lock().unwrap_or_else(PoisonError::into_inner).push(handle.name.clone());
        if self.fail_releases {
            return Err(SpeakeasyError::Cleanup(format!(
                "scripted release failure for {}",
                handle.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_responses_replay_in_order() {
        let backend = ScriptedBackend::new()
            .with_response("first")
            .with_error("down")
            .with_response("third");

        assert_eq!(backend.generate("a").await.unwrap(), "first");
        assert!(backend.generate("b").await.is_err());
        assert_eq!(backend.generate("c").await.unwrap(), "third");
        assert!(backend.generate("d").await.is_err());
        assert_eq!(backend.prompts(), vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_failing_upload_is_not_recorded() {
        let backend = ScriptedBackend::new().fail_upload("bad.mp4");
        assert!(backend.upload_media(Path::new("bad.mp4")).await.is_err());
        assert!(backend.upload_media(Path::new("good.mp3")).await.is_ok());
        assert_eq!(backend.uploaded(), vec!["good.mp3"]);
    }
}
