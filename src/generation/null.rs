//! Backend used when no provider is configured.

use super::{GenerationBackend, MediaHandle};
use crate::error::{Result, SpeakeasyError};
use async_trait::async_trait;
use std::path::Path;

/// A backend that is never available.
pub struct NullBackend;

impl NullBackend {
    pub fn new() -> Self {
        Self
    }

    fn unavailable<T>() -> Result<T> {
        Err(SpeakeasyError::BackendUnavailable(
            "no generation backend configured".to_string(),
        ))
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        Self::unavailable()
    }

    async fn upload_media(&self, _path: &Path) -> Result<MediaHandle> {
        Self::unavailable()
    }

    async fn generate_with_media(&self, _prompt: &str, _media: &[MediaHandle]) -> Result<String> {
        Self::unavailable()
    }

    async fn release_media(&self, _handle: &MediaHandle) -> Result<()> {
        Ok(())
    }
}
