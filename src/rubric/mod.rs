//! Rubric grading.
//!
//! One [`RubricGrader`] type serves both rubrics. The schema a grader is bound
//! to drives the prompt (the zero-filled schema is embedded as the expected
//! answer shape), the validation of the response and the fallback value.
//!
//! Grading never fails: an unusable response yields the zero-filled schema.

mod schema;
mod scores;

pub use schema::{CategorySpec, MetricSpec, Orientation, RubricSchema, AUDIO_RUBRIC, TEXT_RUBRIC};
pub use scores::{CategoryScores, RubricScoreSet};

use crate::config::Prompts;
use crate::context::SpeechContext;
use crate::decode::{decode_json, log_malformed};
use crate::generation::{GenerationBackend, MediaUploads};
use crate::metrics::Transcript;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What a grader looks at.
#[derive(Debug, Clone, Copy)]
pub enum GradingMaterials<'a> {
    /// Transcript text and its speaking metrics.
    Text {
        transcript: &'a Transcript,
        context: &'a SpeechContext,
    },
    /// The speaker's recording, compared against reference recordings.
    Audio {
        audio_path: &'a Path,
        text_rubric: &'a RubricScoreSet,
        reference_media: &'a [PathBuf],
        context: &'a SpeechContext,
    },
}

/// Grades materials against a fixed schema with one backend call.
pub struct RubricGrader {
    backend: Arc<dyn GenerationBackend>,
    schema: &'static RubricSchema,
    prompts: Prompts,
}

impl RubricGrader {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        schema: &'static RubricSchema,
        prompts: Prompts,
    ) -> Self {
        Self {
            backend,
            schema,
            prompts,
        }
    }

    /// Grader for the transcript rubric.
    pub fn text(backend: Arc<dyn GenerationBackend>, prompts: Prompts) -> Self {
        Self::new(backend, &TEXT_RUBRIC, prompts)
    }

    /// Grader for the comparative audio rubric.
    pub fn audio(backend: Arc<dyn GenerationBackend>, prompts: Prompts) -> Self {
        Self::new(backend, &AUDIO_RUBRIC, prompts)
    }

    pub fn schema(&self) -> &'static RubricSchema {
        self.schema
    }

    #[instrument(skip_all, fields(rubric = self.schema.name))]
    pub async fn grade(&self, materials: GradingMaterials<'_>) -> RubricScoreSet {
        let raw = match materials {
            GradingMaterials::Text {
                transcript,
                context,
            } => self.generate_text(transcript, context).await,
            GradingMaterials::Audio {
                audio_path,
                text_rubric,
                reference_media,
                context,
            } => {
                self.generate_audio(audio_path, text_rubric, reference_media, context)
                    .await
            }
        };

        let Some(raw) = raw else {
            return RubricScoreSet::zeroed(self.schema);
        };

        let scores = decode_json::<serde_json::Value>(&raw)
            .and_then(|value| RubricScoreSet::from_raw(self.schema, &value));

        match scores {
            Ok(scores) => {
                info!("Graded {} rubric, mean {:.2}", self.schema.name, scores.mean());
                scores
            }
            Err(e) => {
                log_malformed(&format!("{} rubric", self.schema.name), &e);
                RubricScoreSet::zeroed(self.schema)
            }
        }
    }

    fn base_vars(&self, context: &SpeechContext) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert(
            "schema".to_string(),
            RubricScoreSet::zeroed(self.schema).to_prompt_json(),
        );
        vars.insert(
            "lower_is_better".to_string(),
            self.schema.lower_is_better().join(", "),
        );
        vars.insert("context".to_string(), context.to_prompt_json());
        vars
    }

    async fn generate_text(&self, transcript: &Transcript, context: &SpeechContext) -> Option<String> {
        let mut vars = self.base_vars(context);
        vars.insert("transcript".to_string(), transcript.text.clone());
        vars.insert(
            "metrics".to_string(),
            serde_json::to_string_pretty(&transcript.metrics).unwrap_or_default(),
        );

        let prompt = self.prompts.render_with_custom(&self.prompts.grading.text, &vars);
        match self.backend.generate(&prompt).await {
            Ok(raw) => Some(raw),
            Err(e) => {
                warn!("Text grading call failed: {}", e);
                None
            }
        }
    }

    async fn generate_audio(
        &self,
        audio_path: &Path,
        text_rubric: &RubricScoreSet,
        reference_media: &[PathBuf],
        context: &SpeechContext,
    ) -> Option<String> {
        let backend = self.backend.as_ref();
        let mut uploads = MediaUploads::new();

        if let Err(e) = uploads.upload(backend, audio_path).await {
            warn!("Could not upload speaker audio {}: {}", audio_path.display(), e);
            uploads.release_all(backend).await;
            return None;
        }

        for reference in reference_media {
            if let Err(e) = uploads.upload(backend, reference).await {
                warn!("Skipping reference {}: {}", reference.display(), e);
            }
        }
        debug!("Attached {} reference recordings", uploads.len() - 1);

        let mut vars = self.base_vars(context);
        vars.insert("text_rubric".to_string(), text_rubric.to_prompt_json());
        vars.insert("reference_count".to_string(), (uploads.len() - 1).to_string());

        let prompt = self.prompts.render_with_custom(&self.prompts.grading.audio, &vars);
        let result = backend.generate_with_media(&prompt, uploads.handles()).await;
        uploads.release_all(backend).await;

        match result {
            Ok(raw) => Some(raw),
            Err(e) => {
                warn!("Audio grading call failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::ScriptedBackend;
    use crate::metrics::MetricsCalculator;

    fn context() -> SpeechContext {
        SpeechContext::fallback("class presentation")
    }

    fn transcript() -> Transcript {
        Transcript::analyze(&MetricsCalculator::new(), "Um, hello everyone, welcome.", 3.0)
    }

    fn keys(scores: &RubricScoreSet) -> Vec<String> {
        scores
            .categories()
            .iter()
            .flat_map(|c| c.metrics.iter().map(move |(m, _)| format!("{}.{}", c.name, m)))
            .collect()
    }

    fn schema_keys(schema: &RubricSchema) -> Vec<String> {
        keys(&RubricScoreSet::zeroed(schema))
    }

    #[tokio::test]
    async fn test_text_grading_success_has_complete_keys() {
        let backend = Arc::new(ScriptedBackend::new().with_response(
            r#"```json
{"content_quality": {"clarity_score": 0.9, "surprise": 1.0},
 "grammar_fluency": {"filler_word_density": 0.3},
 "vocabulary_style": {"repetition_score": 0.1}}
```"#,
        ));
        let grader = RubricGrader::text(backend.clone(), Prompts::default());

        let transcript = transcript();
        let context = context();
        let scores = grader
            .grade(GradingMaterials::Text {
                transcript: &transcript,
                context: &context,
            })
            .await;

        assert_eq!(keys(&scores), schema_keys(&TEXT_RUBRIC));
        assert_eq!(scores.get("content_quality", "clarity_score"), Some(0.9));
        assert_eq!(scores.get("grammar_fluency", "filler_word_density"), Some(0.7));
        assert_eq!(scores.get("vocabulary_style", "repetition_score"), Some(0.9));
        assert_eq!(scores.get("content_quality", "surprise"), None);

        let prompt = &backend.prompts()[0];
        assert!(prompt.contains("Um, hello everyone, welcome."));
        assert!(prompt.contains("\"content_quality\""));
        assert!(prompt.contains("grammar_fluency.filler_word_density"));
    }

    #[tokio::test]
    async fn test_text_grading_fallback_has_complete_keys() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .with_response("Sorry, I cannot grade this.")
                .with_error("timeout"),
        );
        let grader = RubricGrader::text(backend.clone(), Prompts::default());

        let transcript = transcript();
        let context = context();
        for _ in 0..2 {
            let scores = grader
                .grade(GradingMaterials::Text {
                    transcript: &transcript,
                    context: &context,
                })
                .await;
            assert_eq!(scores, RubricScoreSet::zeroed(&TEXT_RUBRIC));
        }
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_grading_same_payload_twice_inverts_once() {
        let payload = r#"{"grammar_fluency": {"filler_word_density": 0.3}}"#;
        let backend = Arc::new(
            ScriptedBackend::new()
                .with_response(payload)
                .with_response(payload),
        );
        let grader = RubricGrader::text(backend, Prompts::default());

        let transcript = transcript();
        let context = context();
        let materials = GradingMaterials::Text {
            transcript: &transcript,
            context: &context,
        };

        let first = grader.grade(materials).await;
        let second = grader.grade(materials).await;
        assert_eq!(first.get("grammar_fluency", "filler_word_density"), Some(0.7));
        assert_eq!(second.get("grammar_fluency", "filler_word_density"), Some(0.7));
    }

    #[tokio::test]
    async fn test_category_not_an_object_yields_zero_schema() {
        let backend = Arc::new(
            ScriptedBackend::new().with_response(r#"{"vocal_delivery": 0.8, "engagement": {"engagement_score": 1}}"#),
        );
        let grader = RubricGrader::audio(backend, Prompts::default());

        let text_rubric = RubricScoreSet::zeroed(&TEXT_RUBRIC);
        let context = context();
        let scores = grader
            .grade(GradingMaterials::Audio {
                audio_path: Path::new("speaker.wav"),
                text_rubric: &text_rubric,
                reference_media: &[],
                context: &context,
            })
            .await;
        assert_eq!(scores, RubricScoreSet::zeroed(&AUDIO_RUBRIC));
    }

    #[tokio::test]
    async fn test_audio_grading_attaches_and_releases_media() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .fail_upload("ref_01.mp3")
                .with_response(r#"{"pacing_fluency": {"pacing_score": 0.6, "filler_word_density": 0.25}}"#),
        );
        let grader = RubricGrader::audio(backend.clone(), Prompts::default());

        let text_rubric = RubricScoreSet::zeroed(&TEXT_RUBRIC);
        let context = context();
        let references = vec![PathBuf::from("ref_00.mp3"), PathBuf::from("ref_01.mp3")];
        let scores = grader
            .grade(GradingMaterials::Audio {
                audio_path: Path::new("speaker.wav"),
                text_rubric: &text_rubric,
                reference_media: &references,
                context: &context,
            })
            .await;

        assert_eq!(keys(&scores), schema_keys(&AUDIO_RUBRIC));
        assert_eq!(scores.get("pacing_fluency", "pacing_score"), Some(0.6));
        assert_eq!(scores.get("pacing_fluency", "filler_word_density"), Some(0.75));

        let attached = backend.attached();
        assert_eq!(attached.len(), 1);
        let names: Vec<_> = attached[0].iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["speaker.wav", "ref_00.mp3"]);

        assert_eq!(backend.release_count("speaker.wav"), 1);
        assert_eq!(backend.release_count("ref_00.mp3"), 1);
        assert_eq!(backend.released().len(), 2);
        assert!(backend.prompts()[0].contains("remaining 1 attached"));
    }

    #[tokio::test]
    async fn test_audio_grading_releases_media_when_call_fails() {
        let backend = Arc::new(ScriptedBackend::new().with_error("overloaded"));
        let grader = RubricGrader::audio(backend.clone(), Prompts::default());

        let text_rubric = RubricScoreSet::zeroed(&TEXT_RUBRIC);
        let context = context();
        let references = vec![PathBuf::from("ref_00.mp3")];
        let scores = grader
            .grade(GradingMaterials::Audio {
                audio_path: Path::new("speaker.wav"),
                text_rubric: &text_rubric,
                reference_media: &references,
                context: &context,
            })
            .await;

        assert_eq!(scores, RubricScoreSet::zeroed(&AUDIO_RUBRIC));
        assert_eq!(backend.release_count("speaker.wav"), 1);
        assert_eq!(backend.release_count("ref_00.mp3"), 1);
    }

    #[tokio::test]
    async fn test_failed_speaker_upload_yields_zero_schema() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .fail_upload("speaker.wav")
                .with_response(r#"{"engagement": {"engagement_score": 1.0}}"#),
        );
        let grader = RubricGrader::audio(backend.clone(), Prompts::default());

        let text_rubric = RubricScoreSet::zeroed(&TEXT_RUBRIC);
        let context = context();
        let scores = grader
            .grade(GradingMaterials::Audio {
                audio_path: Path::new("speaker.wav"),
                text_rubric: &text_rubric,
                reference_media: &[PathBuf::from("ref_00.mp3")],
                context: &context,
            })
            .await;

        assert_eq!(scores, RubricScoreSet::zeroed(&AUDIO_RUBRIC));
        assert_eq!(backend.calls(), 0);
        assert!(backend.released().is_empty());
    }
}
