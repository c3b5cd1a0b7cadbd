//! Strict decoding of structured output from the generation backend.
//!
//! Backends are asked for bare JSON but often wrap it in markdown fences.
//! [`decode_json`] strips the fences and parses what is left, nothing more:
//! it returns either a decoded value or a `MalformedResponse` carrying the raw
//! payload, and never panics.

use crate::error::{Result, SpeakeasyError};
use serde::de::DeserializeOwned;
use tracing::warn;

/// Longest raw payload preview written to the log.
const LOG_PREVIEW_CHARS: usize = 500;

/// Remove a leading ```` ``` ```` / ```` ```json ```` line and a trailing ```` ``` ````.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string ("json", "JSON", ...) up to the end of the fence line.
        text = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
    }

    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

/// Decode a backend response as JSON of type `T`.
pub fn decode_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let stripped = strip_code_fences(raw);

    if stripped.is_empty() {
        return Err(SpeakeasyError::malformed("empty response", raw));
    }

    serde_json::from_str(stripped)
        .map_err(|e| SpeakeasyError::malformed(format!("invalid JSON: {}", e), raw))
}

/// Decode a response, substituting `fallback` on failure.
pub fn decode_or<T: DeserializeOwned>(raw: &str, fallback: T, what: &str) -> T {
    match decode_json(raw) {
        Ok(value) => value,
        Err(e) => {
            log_malformed(what, &e);
            fallback
        }
    }
}

/// Log a decode failure together with a preview of the offending payload.
pub fn log_malformed(what: &str, err: &SpeakeasyError) {
    match err.raw_payload() {
        Some(raw) => warn!(
            "Failed to decode {} from backend: {}. Raw output: {}",
            what,
            err,
            preview(raw)
        ),
        None => warn!("Failed to decode {} from backend: {}", what, err),
    }
}

/// First `LOG_PREVIEW_CHARS` characters of a payload.
pub fn preview(raw: &str) -> String {
    raw.chars().take(LOG_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n[1, 2]\n```\n"), "[1, 2]");
        assert_eq!(strip_code_fences("```json{\"a\": 1}```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_decode_plain_and_fenced() {
        let plain: Value = decode_json(r#"{"format": "debate"}"#).unwrap();
        assert_eq!(plain["format"], "debate");

        let fenced: Vec<String> = decode_json("```json\n[\"a\", \"b\"]\n```").unwrap();
        assert_eq!(fenced, vec!["a", "b"]);
    }

    #[test]
    fn test_decode_rejects_surrounding_prose() {
        let response = "Here are the scores:\n{\"structure\": {\"balance_score\": 0.5}}\nHope this helps.";
        let err = decode_json::<Value>(response).unwrap_err();
        assert!(matches!(err, SpeakeasyError::MalformedResponse { .. }));
        assert_eq!(err.raw_payload(), Some(response));

        let chatty = "Sure! Here is my guess {\"specific_topic\": \"x\"} hope it helps";
        assert!(decode_json::<Value>(chatty).is_err());
    }

    #[test]
    fn test_decode_failure_keeps_raw_payload() {
        let err = decode_json::<Value>("definitely not json").unwrap_err();
        assert_eq!(err.raw_payload(), Some("definitely not json"));

        let err = decode_json::<Value>("```json\n```").unwrap_err();
        assert!(matches!(err, SpeakeasyError::MalformedResponse { .. }));
    }

    #[test]
    fn test_decode_or_uses_fallback() {
        let value: Vec<String> = decode_or("{broken", vec!["fallback".to_string()], "keywords");
        assert_eq!(value, vec!["fallback"]);
    }
}
