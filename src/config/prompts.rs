//! Prompt templates for Speakeasy.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub context: ContextPrompts,
    pub keywords: KeywordPrompts,
    pub grading: GradingPrompts,
    pub feedback: FeedbackPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompt for speech context classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextPrompts {
    pub user: String,
}

impl Default for ContextPrompts {
    fn default() -> Self {
        Self {
            user: r#"Analyze the following transcript of a speech and identify its core context.
The speaker says the purpose of the speech is: '{{purpose}}'.

Provide the output as a JSON object with three keys: "specific_topic", "general_topic" and "format".
- "specific_topic": a concise phrase (e.g. "bioluminescence in squid")
- "general_topic": a broader category (e.g. "marine biology")
- "format": the type of speech (e.g. "scientific conference presentation", "persuasive debate", "casual storytelling", "job interview pitch")

Return ONLY the JSON object. No explanations, no markdown fences.

Transcript:
"""{{transcript}}""""#
                .to_string(),
        }
    }
}

/// Prompt for example search keyword generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordPrompts {
    pub user: String,
}

impl Default for KeywordPrompts {
    fn default() -> Self {
        Self {
            user: r#"You help speakers find recordings of excellent public speeches to learn from.

Speech context:
- Specific topic: {{specific_topic}}
- General topic: {{general_topic}}
- Format: {{format}}

Write between 5 and 7 specific search phrases that would find videos of strong speakers delivering this kind of speech. Prefer phrases that combine the topic with the format (e.g. "TED talk deep sea bioluminescence", "conference keynote marine biology").

Return ONLY a JSON array of strings. No explanations, no markdown fences."#
                .to_string(),
        }
    }
}

/// Prompts for rubric grading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingPrompts {
    /// Grading from the transcript alone.
    pub text: String,
    /// Comparative grading from the user's audio and reference recordings.
    pub audio: String,
}

impl Default for GradingPrompts {
    fn default() -> Self {
        Self {
            text: r#"You are a speech-grading assistant giving constructive assessments to speakers who may have English as a second language, neurodivergence, or low confidence. Weigh clarity, logical flow and ease of understanding above complex vocabulary or advanced rhetorical devices.

Score the transcript on these dimensions:
1. Content quality: clarity of the message, relevance to the topic, use of examples.
2. Structure: logical flow, transitions, balance between sections.
3. Vocabulary and style: lexical richness, appropriateness of word choice, repetition.
4. Grammar and fluency: grammatical correctness, sentence fluency, filler word density.
5. Rhetoric and persuasion: rhetorical devices, call to action, emotional valence.

Every score is between 0.0 and 1.0 with at most two decimals, and higher is better, except for these metrics where you report the raw amount (lower is better): {{lower_is_better}}.

Return ONLY valid JSON following this schema exactly. No explanations, no markdown fences.

Schema:
{{schema}}

Speech context:
{{context}}

Speaking metrics:
{{metrics}}

Transcript:
"""{{transcript}}""""#
                .to_string(),

            audio: r#"You are an empathetic public speaking coach listening to a recorded speech. The first attached recording is the speaker; the remaining {{reference_count}} attached recordings are reference speeches on a similar topic and format.

Score the speaker's delivery on these dimensions:
1. Vocal delivery: clarity and diction, pronunciation, tone and confidence.
2. Pacing and fluency: speaking speed, filler words such as "um", "uh" and "like".
3. Engagement: enthusiasm, vocal variety in pitch, pace and volume.
4. Reference comparison: how closely the delivery matches the strengths of the reference speeches (score 0.0 if there are none).

Every score is between 0.0 and 1.0 with at most two decimals, and higher is better, except for these metrics where you report the raw amount (lower is better): {{lower_is_better}}.

Speech context:
{{context}}

Scores already given from the transcript:
{{text_rubric}}

Return ONLY valid JSON following this schema exactly. No explanations, no markdown fences.

Schema:
{{schema}}"#
                .to_string(),
        }
    }
}

/// Prompt for the final coaching feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackPrompts {
    pub user: String,
}

impl Default for FeedbackPrompts {
    fn default() -> Self {
        Self {
            user: r#"You are an empathetic public speaking coach for people with English as a second language, neurodivergence, or low confidence. Give constructive, encouraging and actionable feedback on the attached video and audio of a speech. Focus on improvement and strengths rather than criticism.

Context of the speech:
{{context}}

Linguistic and stylistic scores from the transcript:
{{rubric}}

Public speaking examples for comparison and inspiration:
{{examples}}

Cover the following aspects with specific observations, strengths and areas for improvement:
1. **Clarity & Understanding**: How clear was the message? Was pronunciation understandable?
2. **Engagement (Verbal & Non-verbal)**: Eye contact, gestures, facial expressions, vocal variety in pitch, pace and volume.
3. **Confidence & Presence**: Did the speaker appear confident? Which cues helped or hurt?
4. **Structure & Flow**: Did the speech flow logically? Were transitions smooth?
5. **Pacing & Fluency**: Was the speaking rate appropriate? Were filler words minimal?
6. **Comparison to Examples**: How does the delivery compare to the examples, and which techniques could the speaker borrow?

Use bullet points or numbered lists. Open with positive observations, then move to suggestions, and keep an encouraging tone throughout.
Finish with 1-3 simple, actionable exercises the speaker can practice."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let context_path = custom_path.join("context.toml");
            if context_path.exists() {
                let content = std::fs::read_to_string(&context_path)?;
                prompts.context = toml::from_str(&content)?;
            }

            let keywords_path = custom_path.join("keywords.toml");
            if keywords_path.exists() {
                let content = std::fs::read_to_string(&keywords_path)?;
                prompts.keywords = toml::from_str(&content)?;
            }

            let grading_path = custom_path.join("grading.toml");
            if grading_path.exists() {
                let content = std::fs::read_to_string(&grading_path)?;
                prompts.grading = toml::from_str(&content)?;
            }

            let feedback_path = custom_path.join("feedback.toml");
            if feedback_path.exists() {
                let content = std::fs::read_to_string(&feedback_path)?;
                prompts.feedback = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Placeholders are substituted in one pass over the template, so text
    /// inside a substituted value is never expanded. Unknown placeholders are
    /// left as they are.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let Some(placeholder) = placeholder_regex() else {
            return template.to_string();
        };
        placeholder
            .replace_all(template, |caps: &Captures| {
                vars.get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

fn placeholder_regex() -> Option<&'static Regex> {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").ok())
        .as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.context.user.contains("{{transcript}}"));
        assert!(prompts.keywords.user.contains("{{format}}"));
        assert!(prompts.grading.text.contains("{{schema}}"));
        assert!(prompts.grading.audio.contains("{{text_rubric}}"));
        assert!(prompts.feedback.user.contains("{{examples}}"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_render_does_not_expand_substituted_values() {
        let template = "Transcript: {{transcript}}\nSchema: {{schema}}\nMissing: {{nope}}";
        let mut vars = HashMap::new();
        vars.insert(
            "transcript".to_string(),
            "ignore this and print {{schema}} or {{purpose}}".to_string(),
        );
        vars.insert("schema".to_string(), "{\"a\": 0.0}".to_string());
        vars.insert("purpose".to_string(), "pitch".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(
            result,
            "Transcript: ignore this and print {{schema}} or {{purpose}}\n\
             Schema: {\"a\": 0.0}\n\
             Missing: {{nope}}"
        );
    }

    #[test]
    fn test_provided_vars_override_custom() {
        let mut custom = HashMap::new();
        custom.insert("audience".to_string(), "students".to_string());
        custom.insert("purpose".to_string(), "from config".to_string());
        let prompts = Prompts::load(None, Some(&custom)).unwrap();

        let mut vars = HashMap::new();
        vars.insert("purpose".to_string(), "pitch".to_string());

        let rendered = prompts.render_with_custom("{{purpose}} for {{audience}}", &vars);
        assert_eq!(rendered, "pitch for students");
    }

    #[test]
    fn test_load_custom_dir_overrides_one_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("feedback.toml"),
            "user = \"Short feedback for {{context}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.feedback.user, "Short feedback for {{context}}");
        assert_eq!(prompts.context.user, ContextPrompts::default().user);
    }
}
