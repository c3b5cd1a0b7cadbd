//! Google Gemini backend over the REST API.
//!
//! Media goes through the Files API: a resumable upload, polling until the
//! file is `ACTIVE`, then referencing its URI from `generateContent`.

use super::{mime_type_for, GenerationBackend, MediaHandle};
use crate::config::GenerationSettings;
use crate::decode::preview;
use crate::error::{Result, SpeakeasyError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Gemini generation backend.
pub struct GeminiBackend {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    multimodal_model: String,
    temperature: f32,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl GeminiBackend {
    /// Create a backend from settings. A missing API key is not an error here;
    /// calls report `BackendUnavailable` instead.
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        let api_key = settings.api_key();
        if api_key.is_none() {
            warn!(
                "{} is not set; Gemini calls will fall back to defaults",
                settings.api_key_env
            );
        }

        Ok(Self {
            http,
            api_key,
            base_url: API_BASE.to_string(),
            model: settings.model.clone(),
            multimodal_model: settings.multimodal_model.clone(),
            temperature: settings.temperature,
            poll_attempts: settings.file_poll_attempts.max(1),
            poll_interval: Duration::from_millis(settings.file_poll_interval_ms),
        })
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            SpeakeasyError::BackendUnavailable("Gemini API key is not configured".to_string())
        })
    }

    async fn generate_content(&self, model: &str, body: Value) -> Result<String> {
        let key = self.api_key()?;
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SpeakeasyError::BackendUnavailable(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(SpeakeasyError::BackendUnavailable(format!(
                "Gemini returned {}: {}",
                status,
                preview(&text)
            )));
        }

        extract_text(&text)
    }

    async fn start_upload(&self, display_name: &str, mime_type: &str, len: usize) -> Result<String> {
        let key = self.api_key()?;
        let response = self
            .http
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header("x-goog-api-key", key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", len.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .map_err(|e| SpeakeasyError::BackendUnavailable(format!("Gemini upload failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SpeakeasyError::BackendUnavailable(format!(
                "Gemini upload start returned {}: {}",
                status,
                preview(&text)
            )));
        }

        response
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| SpeakeasyError::malformed("upload start response has no upload URL", ""))
    }

    async fn finish_upload(&self, upload_url: &str, bytes: Vec<u8>) -> Result<FileResource> {
        let response = self
            .http
            .post(upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(|e| SpeakeasyError::BackendUnavailable(format!("Gemini upload failed: {}", e)))?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(SpeakeasyError::BackendUnavailable(format!(
                "Gemini upload returned {}: {}",
                status,
                preview(&text)
            )));
        }

        let envelope: FileEnvelope = serde_json::from_str(&text)
            .map_err(|e| SpeakeasyError::malformed(format!("invalid upload response: {}", e), text.clone()))?;
        Ok(envelope.file)
    }

    async fn get_file(&self, name: &str) -> Result<FileResource> {
        let key = self.api_key()?;
        let response = self
            .http
            .get(format!("{}/v1beta/{}", self.base_url, name))
            .header("x-goog-api-key", key)
            .send()
            .await
            .map_err(|e| SpeakeasyError::BackendUnavailable(format!("Gemini file lookup failed: {}", e)))?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(SpeakeasyError::BackendUnavailable(format!(
                "Gemini file lookup returned {}: {}",
                status,
                preview(&text)
            )));
        }

        serde_json::from_str(&text)
            .map_err(|e| SpeakeasyError::malformed(format!("invalid file resource: {}", e), text.clone()))
    }

    /// Poll until the uploaded file leaves the `PROCESSING` state.
    async fn wait_until_active(&self, mut file: FileResource) -> Result<FileResource> {
        for attempt in 0..=self.poll_attempts {
            match file.state.as_deref() {
                None | Some("ACTIVE") => return Ok(file),
                Some("FAILED") => {
                    return Err(SpeakeasyError::BackendUnavailable(format!(
                        "Gemini failed to process {}",
                        file.name
                    )))
                }
                Some(_) if attempt < self.poll_attempts => {
                    debug!("Waiting for {} to become active", file.name);
                    tokio::time::sleep(self.poll_interval).await;
                    file = self.get_file(&file.name).await?;
                }
                Some(_) => break,
            }
        }

        Err(SpeakeasyError::BackendUnavailable(format!(
            "{} was still processing after {} polls",
            file.name, self.poll_attempts
        )))
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        let key = self.api_key()?;
        let response = self
            .http
            .delete(format!("{}/v1beta/{}", self.base_url, name))
            .header("x-goog-api-key", key)
            .send()
            .await
            .map_err(|e| SpeakeasyError::Cleanup(format!("Gemini delete failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SpeakeasyError::Cleanup(format!(
                "Gemini delete of {} returned {}",
                name,
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = content_body(prompt, &[], self.temperature);
        self.generate_content(&self.model, body).await
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn upload_media(&self, path: &Path) -> Result<MediaHandle> {
        self.api_key()?;
        let bytes = tokio::fs::read(path).await?;
        let mime_type = mime_type_for(path);
        let display_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("media")
            .to_string();

        info!("Uploading {} ({} bytes)", display_name, bytes.len());
        let upload_url = self.start_upload(&display_name, mime_type, bytes.len()).await?;
        let file = self.finish_upload(&upload_url, bytes).await?;
        let name = file.name.clone();

        let file = match self.wait_until_active(file).await {
            Ok(file) => file,
            Err(e) => {
                if let Err(del) = self.delete_file(&name).await {
                    warn!("Failed to delete unusable upload {}: {}", name, del);
                }
                return Err(e);
            }
        };

        let mime_type = if file.mime_type.is_empty() {
            mime_type.to_string()
        } else {
            file.mime_type
        };

        Ok(MediaHandle {
            name: file.name,
            uri: file.uri,
            mime_type,
        })
    }

    #[instrument(skip(self, prompt, media), fields(model = %self.multimodal_model, media = media.len()))]
    async fn generate_with_media(&self, prompt: &str, media: &[MediaHandle]) -> Result<String> {
        let body = content_body(prompt, media, self.temperature);
        self.generate_content(&self.multimodal_model, body).await
    }

    async fn release_media(&self, handle: &MediaHandle) -> Result<()> {
        self.delete_file(&handle.name).await
    }
}

#[derive(Debug, Deserialize)]
struct FileEnvelope {
    file: FileResource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Build a `generateContent` request body: the prompt first, then each file.
fn content_body(prompt: &str, media: &[MediaHandle], temperature: f32) -> Value {
    let mut parts = vec![json!({ "text": prompt })];
    parts.extend(media.iter().map(|m| {
        json!({ "fileData": { "mimeType": m.mime_type, "fileUri": m.uri } })
    }));

    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": { "temperature": temperature },
    })
}

/// Concatenate the text parts of the first candidate.
fn extract_text(body: &str) -> Result<String> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| SpeakeasyError::malformed(format!("invalid Gemini response: {}", e), body))?;

    let text: String = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|c| {
            c.parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = response
            .prompt_feedback
            .map(|f| f.to_string())
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(SpeakeasyError::malformed(
            format!("Gemini returned no text ({})", reason),
            body,
        ));
    }

    Ok(text)
}
