//! Pipeline orchestrator for Speakeasy.
//!
//! Runs one coaching session: metrics, context, examples, both rubrics and
//! the final feedback, strictly in that order. Every stage recovers from its
//! own failures, so a session only fails on unusable input.

use crate::audio::{MediaDownloader, YtDlpDownloader};
use crate::config::{Prompts, Settings};
use crate::context::{ContextExtractor, SpeechContext};
use crate::error::{Result, SpeakeasyError};
use crate::feedback::FeedbackSynthesizer;
use crate::generation::{create_backend, GenerationBackend};
use crate::metrics::{MetricsCalculator, Transcript};
use crate::retrieval::{ExampleRetriever, ReferenceMedia};
use crate::rubric::{GradingMaterials, RubricGrader, RubricScoreSet};
use crate::search::{create_search_backend, ExampleItem, SearchBackend};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Prepared inputs for one session.
#[derive(Debug, Clone)]
pub struct SessionInput {
    pub video_path: PathBuf,
    /// Audio track extracted from the video.
    pub audio_path: PathBuf,
    pub transcript_text: String,
    pub duration_seconds: f64,
    /// The speaker's own description of the speech.
    pub purpose: String,
}

/// Everything a session produces.
#[derive(Debug, Clone, Serialize)]
pub struct SessionResult {
    pub session_id: String,
    pub analyzed_at: DateTime<Utc>,
    pub transcript: Transcript,
    pub context: SpeechContext,
    pub text_rubric: RubricScoreSet,
    pub audio_rubric: RubricScoreSet,
    pub examples: Vec<ExampleItem>,
    pub feedback: String,
    /// Mean of the text rubric scores.
    pub overall_score: f64,
}

impl SessionResult {
    /// Write the result as pretty JSON.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// The main orchestrator for the Speakeasy pipeline.
pub struct PipelineOrchestrator {
    settings: Settings,
    prompts: Prompts,
    generation: Arc<dyn GenerationBackend>,
    search: Arc<dyn SearchBackend>,
    downloader: Arc<dyn MediaDownloader>,
}

impl PipelineOrchestrator {
    /// Create an orchestrator with backends built from configuration.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let generation = create_backend(&settings.generation)?;
        info!(
            "Using {} generation backend ({} / {})",
            generation.name(),
            settings.generation.model,
            settings.generation.multimodal_model
        );

        let search = create_search_backend(&settings.retrieval);
        let downloader: Arc<dyn MediaDownloader> = Arc::new(YtDlpDownloader::new(
            Duration::from_secs(settings.retrieval.download_timeout_secs),
        ));

        Ok(Self::with_components(
            settings, prompts, generation, search, downloader,
        ))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        generation: Arc<dyn GenerationBackend>,
        search: Arc<dyn SearchBackend>,
        downloader: Arc<dyn MediaDownloader>,
    ) -> Self {
        Self {
            settings,
            prompts,
            generation,
            search,
            downloader,
        }
    }

    /// Run one full coaching session.
    ///
    /// Only input validation errors are returned.
    #[instrument(skip_all, fields(session_id))]
    pub async fn run(&self, input: SessionInput) -> Result<SessionResult> {
        validate(&input)?;

        let session_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("session_id", session_id.as_str());
        info!("Starting session for {}", input.video_path.display());

        // Fresh stage instances per session; only the backends are shared.
        let calculator = MetricsCalculator::with_settings(&self.settings.metrics);
        let extractor = ContextExtractor::new(self.generation.clone(), self.prompts.clone());
        let retriever = ExampleRetriever::new(
            self.generation.clone(),
            self.search.clone(),
            self.downloader.clone(),
            self.prompts.clone(),
            &self.settings.retrieval,
        );
        let text_grader = RubricGrader::text(self.generation.clone(), self.prompts.clone());
        let audio_grader = RubricGrader::audio(self.generation.clone(), self.prompts.clone());
        let synthesizer = FeedbackSynthesizer::new(self.generation.clone(), self.prompts.clone());

        let transcript =
            Transcript::analyze(&calculator, &input.transcript_text, input.duration_seconds);
        info!(
            "Transcript: {} words, {:.1} wpm",
            transcript.word_count(),
            transcript.words_per_minute()
        );

        let context = extractor.extract(&transcript.text, &input.purpose).await;

        let examples = retriever
            .retrieve(&context, self.settings.retrieval.example_limit)
            .await;

        let mut reference_media =
            match ReferenceMedia::prepare(&self.settings.sessions_dir(), &session_id) {
                Ok(store) => Some(store),
                Err(e) => {
                    warn!("Reference media unavailable for this session: {}", e);
                    None
                }
            };
        if let Some(store) = reference_media.as_mut() {
            retriever.materialize(&examples, store).await;
        }

        let text_rubric = text_grader
            .grade(GradingMaterials::Text {
                transcript: &transcript,
                context: &context,
            })
            .await;

        let reference_files = reference_media
            .as_ref()
            .map(|store| store.files().to_vec())
            .unwrap_or_default();
        let audio_rubric = audio_grader
            .grade(GradingMaterials::Audio {
                audio_path: &input.audio_path,
                text_rubric: &text_rubric,
                reference_media: &reference_files,
                context: &context,
            })
            .await;

        if let Some(store) = reference_media.take() {
            if let Err(e) = store.release() {
                warn!("{}", e);
            }
        }

        let feedback = synthesizer
            .synthesize(
                &input.video_path,
                &input.audio_path,
                &text_rubric,
                &context,
                &examples,
            )
            .await;

        let overall_score = text_rubric.mean();
        info!("Session complete, overall score {:.2}", overall_score);

        Ok(SessionResult {
            session_id,
            analyzed_at: Utc::now(),
            transcript,
            context,
            text_rubric,
            audio_rubric,
            examples,
            feedback,
            overall_score,
        })
    }
}

fn validate(input: &SessionInput) -> Result<()> {
    if input.transcript_text.trim().is_empty() {
        return Err(SpeakeasyError::MissingInput("transcript text is empty".to_string()));
    }
    for (label, path) in [("video", &input.video_path), ("audio", &input.audio_path)] {
        if !path.is_file() {
            return Err(SpeakeasyError::MissingInput(format!(
                "{} file not found: {}",
                label,
                path.display()
            )));
        }
    }
    Ok(())
}
