//! Rubric schema declarations.

/// Which direction of a metric's raw value is good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    HigherIsBetter,
    /// The backend reports an amount (e.g. filler density); the score is `1 - raw`.
    LowerIsBetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSpec {
    pub name: &'static str,
    pub orientation: Orientation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategorySpec {
    pub name: &'static str,
    pub metrics: &'static [MetricSpec],
}

/// An ordered set of categories, each an ordered set of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RubricSchema {
    pub name: &'static str,
    pub categories: &'static [CategorySpec],
}

const fn higher(name: &'static str) -> MetricSpec {
    MetricSpec {
        name,
        orientation: Orientation::HigherIsBetter,
    }
}

const fn lower(name: &'static str) -> MetricSpec {
    MetricSpec {
        name,
        orientation: Orientation::LowerIsBetter,
    }
}

/// Linguistic rubric graded from the transcript.
pub const TEXT_RUBRIC: RubricSchema = RubricSchema {
    name: "text",
    categories: &[
        CategorySpec {
            name: "content_quality",
            metrics: &[
                higher("clarity_score"),
                higher("relevance_score"),
                higher("example_usage_score"),
            ],
        },
        CategorySpec {
            name: "structure",
            metrics: &[
                higher("logical_flow_score"),
                higher("transition_score"),
                higher("balance_score"),
            ],
        },
        CategorySpec {
            name: "vocabulary_style",
            metrics: &[
                higher("lexical_richness"),
                higher("word_appropriateness"),
                lower("repetition_score"),
            ],
        },
        CategorySpec {
            name: "grammar_fluency",
            metrics: &[
                higher("grammar_correctness"),
                higher("sentence_fluency"),
                lower("filler_word_density"),
            ],
        },
        CategorySpec {
            name: "rhetoric_persuasion",
            metrics: &[
                higher("rhetorical_device_score"),
                higher("call_to_action_score"),
                higher("emotional_valence"),
            ],
        },
    ],
};

/// Delivery rubric graded from the recording, compared against references.
pub const AUDIO_RUBRIC: RubricSchema = RubricSchema {
    name: "audio",
    categories: &[
        CategorySpec {
            name: "vocal_delivery",
            metrics: &[
                higher("clarity_score"),
                higher("pronunciation_score"),
                higher("tone_score"),
            ],
        },
        CategorySpec {
            name: "pacing_fluency",
            metrics: &[higher("pacing_score"), lower("filler_word_density")],
        },
        CategorySpec {
            name: "engagement",
            metrics: &[higher("engagement_score"), higher("vocal_variety_score")],
        },
        CategorySpec {
            name: "reference_comparison",
            metrics: &[higher("reference_similarity_score")],
        },
    ],
};

impl RubricSchema {
    /// `category.metric` names whose raw values are inverted.
    pub fn lower_is_better(&self) -> Vec<String> {
        self.categories
            .iter()
            .flat_map(|c| {
                c.metrics
                    .iter()
                    .filter(|m| m.orientation == Orientation::LowerIsBetter)
                    .map(move |m| format!("{}.{}", c.name, m.name))
            })
            .collect()
    }

    pub fn metric_count(&self) -> usize {
        self.categories.iter().map(|c| c.metrics.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_is_better() {
        assert_eq!(
            TEXT_RUBRIC.lower_is_better(),
            vec!["vocabulary_style.repetition_score", "grammar_fluency.filler_word_density"]
        );
        assert_eq!(
            AUDIO_RUBRIC.lower_is_better(),
            vec!["pacing_fluency.filler_word_density"]
        );
    }

    #[test]
    fn test_metric_count() {
        assert_eq!(TEXT_RUBRIC.metric_count(), 15);
        assert_eq!(AUDIO_RUBRIC.metric_count(), 8);
    }
}
