//! Configuration module for Speakeasy.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{ContextPrompts, FeedbackPrompts, GradingPrompts, KeywordPrompts, Prompts};
pub use settings::{
    GeneralSettings, GenerationProvider, GenerationSettings, MetricsSettings, PromptSettings,
    RetrievalSettings, SearchProvider, Settings,
};
