//! Deterministic speaking metrics derived from transcript text and duration.

use crate::config::MetricsSettings;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Speaking-rate and filler metrics for one transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakingMetrics {
    pub word_count: usize,
    pub words_per_minute: f64,
    /// 1.0 inside the ideal band, decaying proportionally outside it.
    pub length_score: f64,
    /// Occurrences of each configured filler phrase.
    pub filler_counts: BTreeMap<String, usize>,
}

/// A transcript together with the metrics computed from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub duration_seconds: f64,
    #[serde(flatten)]
    pub metrics: SpeakingMetrics,
}

impl Transcript {
    /// Compute metrics for `text` and bundle them with it.
    pub fn analyze(calculator: &MetricsCalculator, text: &str, duration_seconds: f64) -> Self {
        Self {
            text: text.to_string(),
            duration_seconds,
            metrics: calculator.compute(text, duration_seconds),
        }
    }

    pub fn word_count(&self) -> usize {
        self.metrics.word_count
    }

    pub fn words_per_minute(&self) -> f64 {
        self.metrics.words_per_minute
    }
}

/// Computes word count, speaking rate and pacing score.
pub struct MetricsCalculator {
    ideal_min_wpm: f64,
    ideal_max_wpm: f64,
    fillers: Vec<(String, Regex)>,
}

impl MetricsCalculator {
    pub fn new() -> Self {
        Self::with_settings(&MetricsSettings::default())
    }

    pub fn with_settings(settings: &MetricsSettings) -> Self {
        let fillers = settings
            .filler_words
            .iter()
            .filter(|w| !w.trim().is_empty())
            .filter_map(|word| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(word.trim()));
                Regex::new(&pattern).ok().map(|re| (word.trim().to_string(), re))
            })
            .collect();

        Self {
            ideal_min_wpm: settings.ideal_min_wpm,
            ideal_max_wpm: settings.ideal_max_wpm,
            fillers,
        }
    }

    /// Compute all metrics for a transcript.
    pub fn compute(&self, transcript_text: &str, duration_seconds: f64) -> SpeakingMetrics {
        let word_count = transcript_text.split_whitespace().count();
        let words_per_minute = words_per_minute(word_count, duration_seconds);

        SpeakingMetrics {
            word_count,
            words_per_minute,
            length_score: self.length_score(words_per_minute),
            filler_counts: self.filler_counts(transcript_text),
        }
    }

    /// Pacing score for a speaking rate, rounded to hundredths.
    pub fn length_score(&self, words_per_minute: f64) -> f64 {
        let score = if words_per_minute >= self.ideal_min_wpm && words_per_minute <= self.ideal_max_wpm {
            1.0
        } else if words_per_minute > self.ideal_max_wpm {
            self.ideal_max_wpm / words_per_minute
        } else if self.ideal_min_wpm > 0.0 {
            words_per_minute / self.ideal_min_wpm
        } else {
            0.0
        };
        round_hundredths(score)
    }

    fn filler_counts(&self, text: &str) -> BTreeMap<String, usize> {
        self.fillers
            .iter()
            .map(|(word, re)| (word.clone(), re.find_iter(text).count()))
            .collect()
    }
}

impl Default for MetricsCalculator {
    fn default() -> Self {
        Self::new()
    }
}

/// Words per minute, 0 when the duration is not a positive finite number.
pub fn words_per_minute(word_count: usize, duration_seconds: f64) -> f64 {
    if duration_seconds.is_finite() && duration_seconds > 0.0 {
        word_count as f64 / (duration_seconds / 60.0)
    } else {
        0.0
    }
}

pub(crate) fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_per_minute() {
        assert_eq!(words_per_minute(5, 2.5), 120.0);
        assert_eq!(words_per_minute(150, 60.0), 150.0);
        assert_eq!(words_per_minute(42, 0.0), 0.0);
        assert_eq!(words_per_minute(42, -3.0), 0.0);
        assert_eq!(words_per_minute(42, f64::NAN), 0.0);
    }

    #[test]
    fn test_length_score_band() {
        let calc = MetricsCalculator::new();
        assert_eq!(calc.length_score(120.0), 1.0);
        assert_eq!(calc.length_score(100.0), 1.0);
        assert_eq!(calc.length_score(140.0), 1.0);
        assert_eq!(calc.length_score(200.0), 0.7);
        assert_eq!(calc.length_score(50.0), 0.5);
        assert_eq!(calc.length_score(0.0), 0.0);
        assert_eq!(calc.length_score(12.0), 0.12);
    }

    #[test]
    fn test_compute_short_transcript() {
        let calc = MetricsCalculator::new();
        let metrics = calc.compute("This is a test transcript", 2.5);
        assert_eq!(metrics.word_count, 5);
        assert_eq!(metrics.words_per_minute, 120.0);
        assert_eq!(metrics.length_score, 1.0);
    }

    #[test]
    fn test_compute_zero_duration() {
        let calc = MetricsCalculator::new();
        let metrics = calc.compute("one two three", 0.0);
        assert_eq!(metrics.word_count, 3);
        assert_eq!(metrics.words_per_minute, 0.0);
        assert_eq!(metrics.length_score, 0.0);
    }

    #[test]
    fn test_word_count_ignores_extra_whitespace() {
        let calc = MetricsCalculator::new();
        let metrics = calc.compute("  hello\n\tworld   again ", 60.0);
        assert_eq!(metrics.word_count, 3);
    }

    #[test]
    fn test_filler_counts_match_whole_words() {
        let calc = MetricsCalculator::new();
        let metrics = calc.compute("Um, so I like... you know, UM. Sofa likely umbrella.", 10.0);
        assert_eq!(metrics.filler_counts["um"], 2);
        assert_eq!(metrics.filler_counts["so"], 1);
        assert_eq!(metrics.filler_counts["like"], 1);
        assert_eq!(metrics.filler_counts["you know"], 1);
        assert_eq!(metrics.filler_counts["uh"], 0);
    }

    #[test]
    fn test_transcript_serializes_flat() {
        let calc = MetricsCalculator::new();
        let transcript = Transcript::analyze(&calc, "This is a test transcript", 2.5);
        let json = serde_json::to_value(&transcript).unwrap();
        assert_eq!(json["word_count"], 5);
        assert_eq!(json["words_per_minute"], 120.0);
        assert_eq!(json["duration_seconds"], 2.5);
    }
}
