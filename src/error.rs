//! Error types for Speakeasy.

use thiserror::Error;

/// Library-level error type for Speakeasy operations.
#[derive(Error, Debug)]
pub enum SpeakeasyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Generation backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend answered, but not with something we could decode.
    #[error("Malformed backend response: {message}")]
    MalformedResponse { message: String, raw: String },

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Reference media download failed: {0}")]
    Download(String),

    #[error("Cleanup failed: {0}")]
    Cleanup(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SpeakeasyError {
    /// Build a `MalformedResponse`, keeping the raw payload for diagnostics.
    pub fn malformed(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
            raw: raw.into(),
        }
    }

    /// Raw backend payload, if this error carries one.
    pub fn raw_payload(&self) -> Option<&str> {
        match self {
            Self::MalformedResponse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// Result type alias for Speakeasy operations.
pub type Result<T> = std::result::Result<T, SpeakeasyError>;
