//! CLI module for Speakeasy.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Speakeasy - Speech Coaching Pipeline
///
/// Grades a recorded speech, finds comparable reference speeches and writes
/// coaching feedback.
#[derive(Parser, Debug)]
#[command(name = "speakeasy")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a recorded speech and print coaching feedback
    Analyze {
        /// Video recording of the speech
        #[arg(long)]
        video: String,

        /// Audio track extracted from the video
        #[arg(long)]
        audio: String,

        /// Text file containing the transcript
        #[arg(long)]
        transcript: String,

        /// Recording length in seconds (probed from the audio with ffprobe if omitted)
        #[arg(long)]
        duration: Option<f64>,

        /// What the speech is for (e.g. "job interview pitch")
        #[arg(short, long, default_value = "general speech")]
        purpose: String,

        /// Write the full result as JSON to this file
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::try_parse_from([
            "speakeasy",
            "-vv",
            "analyze",
            "--video",
            "talk.mp4",
            "--audio",
            "talk.wav",
            "--transcript",
            "talk.txt",
            "--duration",
            "92.5",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Analyze {
                duration, purpose, output, ..
            } => {
                assert_eq!(duration, Some(92.5));
                assert_eq!(purpose, "general speech");
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_analyze_requires_inputs() {
        assert!(Cli::try_parse_from(["speakeasy", "analyze", "--video", "talk.mp4"]).is_err());
    }
}
