//! Search keyword generation.

use crate::config::Prompts;
use crate::context::{is_resolved, SpeechContext};
use crate::decode::{decode_json, log_malformed};
use crate::generation::GenerationBackend;
use tracing::{debug, warn};

/// Keyword used when nothing about the speech is known.
pub const DEFAULT_KEYWORD: &str = "public speaking examples";

/// Ask the backend for search phrases, falling back to [`fallback_keywords`].
pub async fn generate_keywords(
    backend: &dyn GenerationBackend,
    prompts: &Prompts,
    context: &SpeechContext,
) -> Vec<String> {
    let prompt = prompts.render_with_custom(&prompts.keywords.user, &context.prompt_vars());

    let raw = match backend.generate(&prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Keyword generation failed, using fallback keywords: {}", e);
            return fallback_keywords(context);
        }
    };

    let keywords: Vec<String> = match decode_json::<Vec<serde_json::Value>>(&raw) {
        Ok(values) => values
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect(),
        Err(e) => {
            log_malformed("search keywords", &e);
            return fallback_keywords(context);
        }
    };

    if keywords.is_empty() {
        warn!("Backend returned no keywords, using fallback keywords");
        return fallback_keywords(context);
    }

    debug!("Generated keywords: {:?}", keywords);
    keywords
}

/// One to three keywords built from the resolved context fields.
pub fn fallback_keywords(context: &SpeechContext) -> Vec<String> {
    let specific = resolved(&context.specific_topic);
    let general = resolved(&context.general_topic);
    let format = resolved(&context.format);

    let mut keywords = Vec::new();
    match format {
        Some(format) => {
            if let Some(specific) = specific {
                keywords.push(format!("{} {}", specific, format));
            }
            if let Some(general) = general {
                keywords.push(format!("{} {}", general, format));
            }
            keywords.push(format!("{} speech", format));
        }
        None => {
            keywords.extend(specific.map(|s| format!("{} speech", s)));
            keywords.extend(general.map(|g| format!("{} speech", g)));
        }
    }

    keywords.dedup();
    if keywords.is_empty() {
        keywords.push(DEFAULT_KEYWORD.to_string());
    }
    keywords
}

fn resolved(value: &str) -> Option<&str> {
    is_resolved(value).then(|| value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::ScriptedBackend;

    fn context(specific: &str, general: &str, format: &str) -> SpeechContext {
        SpeechContext {
            specific_topic: specific.to_string(),
            general_topic: general.to_string(),
            format: format.to_string(),
        }
    }

    #[test]
    fn test_fallback_keywords_full_context() {
        let keywords = fallback_keywords(&context("squid light", "marine biology", "keynote"));
        assert_eq!(
            keywords,
            vec!["squid light keynote", "marine biology keynote", "keynote speech"]
        );
    }

    #[test]
    fn test_fallback_keywords_format_only() {
        let keywords = fallback_keywords(&SpeechContext::fallback("job interview pitch"));
        assert_eq!(keywords, vec!["job interview pitch speech"]);
    }

    #[test]
    fn test_fallback_keywords_nothing_known() {
        let keywords = fallback_keywords(&context("unknown", "", " "));
        assert_eq!(keywords, vec![DEFAULT_KEYWORD]);
    }

    #[tokio::test]
    async fn test_generate_keywords_from_backend() {
        let backend = ScriptedBackend::new()
            .with_response("```json\n[\"TED talk squid\", \"\", 7, \"keynote marine biology\"]\n```");
        let keywords = generate_keywords(
            &backend,
            &Prompts::default(),
            &context("squid light", "marine biology", "keynote"),
        )
        .await;

        assert_eq!(keywords, vec!["TED talk squid", "keynote marine biology"]);
        assert!(backend.prompts()[0].contains("Format: keynote"));
    }

    #[tokio::test]
    async fn test_generate_keywords_falls_back_on_bad_output() {
        let ctx = context("squid light", "unknown", "keynote");

        let backend = ScriptedBackend::new()
            .with_response("Here are some ideas: TED talk")
            .with_response("[]")
            .with_error("offline");

        for _ in 0..3 {
            let keywords = generate_keywords(&backend, &Prompts::default(), &ctx).await;
            assert_eq!(keywords, vec!["squid light keynote", "keynote speech"]);
        }
    }
}
