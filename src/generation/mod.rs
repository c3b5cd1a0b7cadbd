//! Generation backends.
//!
//! Every stage talks to the model through [`GenerationBackend`]. Adapters:
//!
//! - [`GeminiBackend`] - Google Gemini REST API, text and uploaded media.
//! - [`OpenAIBackend`] - OpenAI chat completions, text only.
//! - [`NullBackend`] - always unavailable; every stage degrades to its default.
//! - [`ScriptedBackend`] - queued responses for tests.

mod gemini;
mod null;
mod openai;
mod scripted;
mod uploads;

pub use gemini::GeminiBackend;
pub use null::NullBackend;
pub use openai::OpenAIBackend;
pub use scripted::ScriptedBackend;
pub use uploads::MediaUploads;

use crate::config::{GenerationProvider, GenerationSettings};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// A media file uploaded to the backend and referenced from prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaHandle {
    /// Backend resource name, used to release the upload.
    pub name: String,
    /// URI passed to the model alongside the prompt.
    pub uri: String,
    pub mime_type: String,
}

/// Trait for text and multimodal generation services.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Generate text from a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Upload a local media file so it can be attached to a prompt.
    async fn upload_media(&self, path: &Path) -> Result<MediaHandle>;

    /// Generate text from a prompt with uploaded media attached, in order.
    async fn generate_with_media(&self, prompt: &str, media: &[MediaHandle]) -> Result<String>;

    /// Delete an upload. Each handle should be released exactly once.
    async fn release_media(&self, handle: &MediaHandle) -> Result<()>;
}

/// Create the configured generation backend.
pub fn create_backend(settings: &GenerationSettings) -> Result<Arc<dyn GenerationBackend>> {
    let backend: Arc<dyn GenerationBackend> = match settings.provider {
        GenerationProvider::Gemini => Arc::new(GeminiBackend::from_settings(settings)?),
        GenerationProvider::OpenAi => Arc::new(OpenAIBackend::from_settings(settings)?),
        GenerationProvider::Null => Arc::new(NullBackend::new()),
    };
    Ok(backend)
}

/// Guess a MIME type from the file extension.
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "ogg" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}
