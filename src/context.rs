//! Speech context classification.

use crate::config::Prompts;
use crate::decode::{decode_json, log_malformed};
use crate::generation::GenerationBackend;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Sentinel for a context field the backend did not resolve.
pub const UNKNOWN: &str = "unknown";

/// Topic and format of a speech.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechContext {
    pub specific_topic: String,
    pub general_topic: String,
    pub format: String,
}

impl SpeechContext {
    /// Context used when classification fails: only the caller's hint is known.
    pub fn fallback(purpose: &str) -> Self {
        Self {
            specific_topic: UNKNOWN.to_string(),
            general_topic: UNKNOWN.to_string(),
            format: purpose.to_string(),
        }
    }

    /// Prompt variables for this context.
    pub fn prompt_vars(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("specific_topic".to_string(), self.specific_topic.clone());
        vars.insert("general_topic".to_string(), self.general_topic.clone());
        vars.insert("format".to_string(), self.format.clone());
        vars
    }

    /// Pretty JSON for embedding in prompts.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// True when a context field is neither blank nor the unknown sentinel.
pub fn is_resolved(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.eq_ignore_ascii_case(UNKNOWN)
}

/// Classifies a transcript's topic and format with one backend call.
pub struct ContextExtractor {
    backend: Arc<dyn GenerationBackend>,
    prompts: Prompts,
}

impl ContextExtractor {
    pub fn new(backend: Arc<dyn GenerationBackend>, prompts: Prompts) -> Self {
        Self { backend, prompts }
    }

    /// Classify `transcript_text`. Falls back to [`SpeechContext::fallback`] on any failure.
    #[instrument(skip(self, transcript_text))]
    pub async fn extract(&self, transcript_text: &str, purpose: &str) -> SpeechContext {
        let mut vars = HashMap::new();
        vars.insert("purpose".to_string(), purpose.to_string());
        vars.insert("transcript".to_string(), transcript_text.to_string());
        let prompt = self.prompts.render_with_custom(&self.prompts.context.user, &vars);

        let raw = match self.backend.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Context extraction failed, using fallback: {}", e);
                return SpeechContext::fallback(purpose);
            }
        };

        let object: serde_json::Map<String, serde_json::Value> = match decode_json(&raw) {
            Ok(object) => object,
            Err(e) => {
                log_malformed("speech context", &e);
                return SpeechContext::fallback(purpose);
            }
        };

        let field = |key: &str| {
            object
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .trim()
                .to_string()
        };

        let context = SpeechContext {
            specific_topic: field("specific_topic"),
            general_topic: field("general_topic"),
            format: field("format"),
        };

        info!(
            "Speech context: {} / {} / {}",
            context.specific_topic, context.general_topic, context.format
        );
        context
    }
}
