//! OpenAI chat completions backend (text only).

use super::{GenerationBackend, MediaHandle};
use crate::config::GenerationSettings;
use crate::error::{Result, SpeakeasyError};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

/// OpenAI-based generation backend.
pub struct OpenAIBackend {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIBackend {
    /// Build a client with the configured key, model and request timeout.
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        let mut config = OpenAIConfig::default();
        if let Some(key) = settings.api_key() {
            config = config.with_api_key(key);
        }
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client),
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }
}

#[async_trait]
impl GenerationBackend for OpenAIBackend {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.to_string())
                .build()
                .map_err(|e| SpeakeasyError::OpenAI(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| SpeakeasyError::OpenAI(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            SpeakeasyError::BackendUnavailable(format!("OpenAI request failed: {}", e))
        })?;

        let text = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| SpeakeasyError::malformed("empty response from OpenAI", ""))?
            .clone();

        debug!("OpenAI returned {} characters", text.len());
        Ok(text)
    }

    async fn upload_media(&self, path: &Path) -> Result<MediaHandle> {
        Err(SpeakeasyError::BackendUnavailable(format!(
            "the openai backend cannot attach media ({})",
            path.display()
        )))
    }

    async fn generate_with_media(&self, prompt: &str, media: &[MediaHandle]) -> Result<String> {
        if !media.is_empty() {
            return Err(SpeakeasyError::BackendUnavailable(
                "the openai backend cannot attach media".to_string(),
            ));
        }
        self.generate(prompt).await
    }

    async fn release_media(&self, _handle: &MediaHandle) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> GenerationSettings {
        GenerationSettings {
            model: "gpt-4o-mini".to_string(),
            api_key_env: "SPEAKEASY_TEST_UNSET_KEY".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_backend_from_settings() {
        let backend = OpenAIBackend::from_settings(&test_settings()).unwrap();
        assert_eq!(backend.model, "gpt-4o-mini");
        assert_eq!(backend.name(), "openai");
    }

    #[tokio::test]
    async fn test_media_is_rejected() {
        let backend = OpenAIBackend::from_settings(&test_settings()).unwrap();
        let result = backend.upload_media(Path::new("talk.mp4")).await;
        assert!(matches!(result, Err(SpeakeasyError::BackendUnavailable(_))));
    }
}
