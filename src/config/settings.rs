//! Configuration settings for Speakeasy.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub generation: GenerationSettings,
    pub retrieval: RetrievalSettings,
    pub metrics: MetricsSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for transient session files (reference media).
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            temp_dir: "/tmp/speakeasy".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Generation backend provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    /// Google Gemini (default, multimodal).
    #[default]
    Gemini,
    /// OpenAI chat completions (text only).
    OpenAi,
    /// No backend; every stage falls back to its default.
    Null,
}

impl std::str::FromStr for GenerationProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(GenerationProvider::Gemini),
            "openai" => Ok(GenerationProvider::OpenAi),
            "null" | "none" => Ok(GenerationProvider::Null),
            _ => Err(format!("Unknown generation provider: {}", s)),
        }
    }
}

impl std::fmt::Display for GenerationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationProvider::Gemini => write!(f, "gemini"),
            GenerationProvider::OpenAi => write!(f, "openai"),
            GenerationProvider::Null => write!(f, "null"),
        }
    }
}

/// Generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Backend provider (gemini, openai, null).
    pub provider: GenerationProvider,
    /// Model for text-only calls (context, keywords, text grading).
    pub model: String,
    /// Model for calls carrying uploaded media (audio grading, feedback).
    pub multimodal_model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Sampling temperature.
    pub temperature: f32,
    /// How many times to poll an uploaded file before giving up on it becoming active.
    pub file_poll_attempts: u32,
    /// Delay between upload state polls, in milliseconds.
    pub file_poll_interval_ms: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: GenerationProvider::Gemini,
            model: "gemini-1.5-flash".to_string(),
            multimodal_model: "gemini-2.5-pro".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 300,
            temperature: 0.4,
            file_poll_attempts: 30,
            file_poll_interval_ms: 2000,
        }
    }
}

impl GenerationSettings {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Search backend provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    /// yt-dlp `ytsearch` queries (default).
    #[default]
    Ytdlp,
    /// No search; the example set is always empty.
    Disabled,
}

impl std::str::FromStr for SearchProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ytdlp" | "yt-dlp" | "youtube" => Ok(SearchProvider::Ytdlp),
            "disabled" | "none" => Ok(SearchProvider::Disabled),
            _ => Err(format!("Unknown search provider: {}", s)),
        }
    }
}

impl std::fmt::Display for SearchProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchProvider::Ytdlp => write!(f, "ytdlp"),
            SearchProvider::Disabled => write!(f, "disabled"),
        }
    }
}

/// Reference example retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Search provider (ytdlp, disabled).
    pub provider: SearchProvider,
    /// Maximum number of examples returned per session.
    pub example_limit: usize,
    /// Maximum hits requested per keyword query.
    pub results_per_keyword: usize,
    /// Download example audio for the comparative audio grading.
    pub download_reference_media: bool,
    /// Maximum number of reference recordings downloaded per session.
    pub max_reference_media: usize,
    /// Timeout for a single search query, in seconds.
    pub search_timeout_secs: u64,
    /// Timeout for a single reference download, in seconds.
    pub download_timeout_secs: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            provider: SearchProvider::Ytdlp,
            example_limit: 3,
            results_per_keyword: 3,
            download_reference_media: true,
            max_reference_media: 3,
            search_timeout_secs: 60,
            download_timeout_secs: 300,
        }
    }
}

/// Speaking metric settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Lower bound of the ideal speaking rate, in words per minute.
    pub ideal_min_wpm: f64,
    /// Upper bound of the ideal speaking rate, in words per minute.
    pub ideal_max_wpm: f64,
    /// Filler words and phrases counted in the transcript.
    pub filler_words: Vec<String>,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            ideal_min_wpm: 100.0,
            ideal_max_wpm: 140.0,
            filler_words: ["um", "uh", "like", "you know", "so"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SpeakeasyError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("speakeasy")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Root under which each session gets its own reference media directory.
    pub fn sessions_dir(&self) -> PathBuf {
        self.temp_dir().join("sessions")
    }
}
