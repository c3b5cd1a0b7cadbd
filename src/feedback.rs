//! Multimodal coaching feedback.

use crate::config::Prompts;
use crate::context::SpeechContext;
use crate::error::{Result, SpeakeasyError};
use crate::generation::{GenerationBackend, MediaUploads};
use crate::rubric::RubricScoreSet;
use crate::search::ExampleItem;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Feedback text used when synthesis fails.
pub fn failure_message(err: &SpeakeasyError) -> String {
    format!(
        "Failed to analyze performance due to an error: {}. Please ensure your API key is correct and the video/audio files are valid.",
        err
    )
}

/// Numbered list of examples for the prompt.
pub fn format_examples(examples: &[ExampleItem]) -> String {
    if examples.is_empty() {
        return "No examples were found.".to_string();
    }
    examples
        .iter()
        .enumerate()
        .map(|(i, e)| format!("{}. {}", i + 1, e.describe()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Produces the final coaching text from the recording and earlier results.
pub struct FeedbackSynthesizer {
    backend: Arc<dyn GenerationBackend>,
    prompts: Prompts,
}

impl FeedbackSynthesizer {
    pub fn new(backend: Arc<dyn GenerationBackend>, prompts: Prompts) -> Self {
        Self { backend, prompts }
    }

    /// Upload both recordings, make one multimodal call and release the uploads.
    ///
    /// Never fails; errors become [`failure_message`].
    #[instrument(skip_all, fields(video = %video_path.display()))]
    pub async fn synthesize(
        &self,
        video_path: &Path,
        audio_path: &Path,
        text_rubric: &RubricScoreSet,
        context: &SpeechContext,
        examples: &[ExampleItem],
    ) -> String {
        let backend = self.backend.as_ref();
        let mut uploads = MediaUploads::new();

        let result = self
            .run(&mut uploads, video_path, audio_path, text_rubric, context, examples)
            .await;
        uploads.release_all(backend).await;

        match result {
            Ok(text) => {
                info!("Synthesized {} characters of feedback", text.len());
                text
            }
            Err(e) => {
                warn!("Feedback synthesis failed: {}", e);
                failure_message(&e)
            }
        }
    }

    async fn run(
        &self,
        uploads: &mut MediaUploads,
        video_path: &Path,
        audio_path: &Path,
        text_rubric: &RubricScoreSet,
        context: &SpeechContext,
        examples: &[ExampleItem],
    ) -> Result<String> {
        let backend = self.backend.as_ref();
        uploads.upload(backend, video_path).await?;
        uploads.upload(backend, audio_path).await?;

        let mut vars = HashMap::new();
        vars.insert("context".to_string(), context.to_prompt_json());
        vars.insert("rubric".to_string(), text_rubric.to_prompt_json());
        vars.insert("examples".to_string(), format_examples(examples));
        let prompt = self.prompts.render_with_custom(&self.prompts.feedback.user, &vars);

        let text = backend.generate_with_media(&prompt, uploads.handles()).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SpeakeasyError::malformed("empty feedback response", text));
        }
        Ok(text.to_string())
    }
}
