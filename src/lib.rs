//! Speakeasy - Speech Coaching Pipeline
//!
//! Turns a recorded speech into rubric scores, topic context, comparable
//! reference examples and written coaching feedback.
//!
//! # Overview
//!
//! A session takes an already transcribed recording and:
//! - Computes speaking metrics (word count, pace, filler words)
//! - Classifies the speech's topic and format
//! - Finds and downloads comparable reference speeches
//! - Grades the transcript and the delivery against fixed rubrics
//! - Synthesizes coaching feedback from the video, audio and scores
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `metrics` - Deterministic speaking metrics
//! - `decode` - Tolerant JSON decoding of backend output
//! - `generation` - Text and multimodal generation backends
//! - `search` - Reference example search
//! - `audio` - Reference audio download, media probing
//! - `context` - Speech context classification
//! - `retrieval` - Example retrieval and session reference media
//! - `rubric` - Rubric schemas and grading
//! - `feedback` - Coaching feedback synthesis
//! - `orchestrator` - Session coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use speakeasy::config::Settings;
//! use speakeasy::orchestrator::{PipelineOrchestrator, SessionInput};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = PipelineOrchestrator::new(settings)?;
//!
//!     let result = orchestrator
//!         .run(SessionInput {
//!             video_path: "talk.mp4".into(),
//!             audio_path: "talk.wav".into(),
//!             transcript_text: std::fs::read_to_string("talk.txt")?,
//!             duration_seconds: 92.0,
//!             purpose: "conference talk".to_string(),
//!         })
//!         .await?;
//!     println!("Overall score: {:.2}", result.overall_score);
//!
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod context;
pub mod decode;
pub mod error;
pub mod feedback;
pub mod generation;
pub mod metrics;
pub mod orchestrator;
pub mod retrieval;
pub mod rubric;
pub mod search;

pub use error::{Result, SpeakeasyError};
