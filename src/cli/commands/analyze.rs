//! Analyze command implementation.

use crate::audio::probe_duration;
use crate::cli::output::format_duration;
use crate::cli::preflight;
use crate::cli::Output;
use crate::config::Settings;
use crate::error::{Result as SpeakeasyResult, SpeakeasyError};
use crate::orchestrator::{PipelineOrchestrator, SessionInput, SessionResult};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Run the analyze command.
pub async fn run_analyze(
    video: &str,
    audio: &str,
    transcript: &str,
    duration: Option<f64>,
    purpose: &str,
    output: Option<String>,
    settings: Settings,
) -> Result<()> {
    match preflight::check(&settings) {
        Ok(warnings) => warnings.iter().for_each(|w| Output::warning(w)),
        Err(e) => {
            Output::error(&format!("{}", e));
            Output::info("Run 'speakeasy doctor' for detailed diagnostics.");
            return Err(e.into());
        }
    }

    let transcript_path = Settings::expand_path(transcript);
    let transcript_text = std::fs::read_to_string(&transcript_path).map_err(|e| {
        SpeakeasyError::MissingInput(format!(
            "cannot read transcript {}: {}",
            transcript_path.display(),
            e
        ))
    })?;

    let audio_path = Settings::expand_path(audio);
    let duration_seconds = resolve_duration(duration, &audio_path).await?;

    let input = SessionInput {
        video_path: Settings::expand_path(video),
        audio_path,
        transcript_text,
        duration_seconds,
        purpose: purpose.to_string(),
    };

    let orchestrator = PipelineOrchestrator::new(settings)?;

    let spinner = Output::spinner("Analyzing speech...");
    let result = orchestrator.run(input).await;
    spinner.finish_and_clear();

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            Output::error(&format!("Analysis failed: {}", e));
            return Err(e.into());
        }
    };

    print_result(&result);

    if let Some(path) = output {
        let path = PathBuf::from(path);
        result.save_to(&path)?;
        Output::success(&format!("Saved full result to {}", path.display()));
    }

    Ok(())
}

/// Use the given duration, or probe the audio file for it.
pub async fn resolve_duration(explicit: Option<f64>, audio_path: &Path) -> SpeakeasyResult<f64> {
    match explicit {
        Some(seconds) if seconds.is_finite() && seconds >= 0.0 => Ok(seconds),
        Some(seconds) => Err(SpeakeasyError::InvalidInput(format!(
            "duration must be a non-negative number of seconds, got {}",
            seconds
        ))),
        None => probe_duration(audio_path).await,
    }
}

fn print_result(result: &SessionResult) {
    let metrics = &result.transcript.metrics;

    Output::header("Speech");
    Output::kv("Session", &result.session_id);
    Output::kv(
        "Length",
        &format!(
            "{} words in {}",
            metrics.word_count,
            format_duration(result.transcript.duration_seconds)
        ),
    );
    Output::kv(
        "Pace",
        &format!(
            "{:.0} wpm (score {:.2})",
            metrics.words_per_minute, metrics.length_score
        ),
    );
    let fillers: usize = metrics.filler_counts.values().sum();
    Output::kv("Filler words", &fillers.to_string());
    Output::kv("Topic", &result.context.specific_topic);
    Output::kv("Field", &result.context.general_topic);
    Output::kv("Format", &result.context.format);

    Output::header("Transcript rubric");
    Output::rubric(&result.text_rubric);

    Output::header("Delivery rubric");
    Output::rubric(&result.audio_rubric);

    Output::header("Reference examples");
    if result.examples.is_empty() {
        Output::info("No examples found.");
    }
    for example in &result.examples {
        Output::list_item(&example.describe());
    }

    Output::header("Feedback");
    println!("{}", result.feedback);
    println!();
    Output::success(&format!("Overall score: {:.2}", result.overall_score));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_explicit_duration_skips_probe() {
        let seconds = resolve_duration(Some(12.5), Path::new("/nonexistent.wav"))
            .await
            .unwrap();
        assert_eq!(seconds, 12.5);
    }

    #[tokio::test]
    async fn test_negative_duration_is_rejected() {
        let result = resolve_duration(Some(-1.0), Path::new("talk.wav")).await;
        assert!(matches!(result, Err(SpeakeasyError::InvalidInput(_))));
    }
}
