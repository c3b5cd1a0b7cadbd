//! Pre-flight checks before running a session.
//!
//! A missing API key fails fast: every stage would otherwise silently fall
//! back to its default. Missing tools only disable reference retrieval, so
//! they are reported as warnings.

use crate::config::{GenerationProvider, SearchProvider, Settings};
use crate::error::{Result, SpeakeasyError};
use std::process::Command;

/// Run pre-flight checks shared by `analyze` and `serve`.
///
/// Returns warnings for optional requirements that are missing, or an error
/// for required ones.
pub fn check(settings: &Settings) -> Result<Vec<String>> {
    check_api_key(settings)?;

    let warnings = required_tools(settings)
        .into_iter()
        .filter_map(|tool| check_tool(tool).err())
        .map(|e| format!("{} (reference examples will be limited)", e))
        .collect();
    Ok(warnings)
}

/// External tools the configured retrieval needs.
pub fn required_tools(settings: &Settings) -> Vec<&'static str> {
    let mut tools = Vec::new();
    if settings.retrieval.provider == SearchProvider::Ytdlp {
        tools.push("yt-dlp");
        if settings.retrieval.download_reference_media {
            tools.push("ffmpeg");
        }
    }
    tools
}

/// Check that the configured provider has an API key.
fn check_api_key(settings: &Settings) -> Result<()> {
    if settings.generation.provider == GenerationProvider::Null {
        return Ok(());
    }
    let var = &settings.generation.api_key_env;
    match std::env::var(var) {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(SpeakeasyError::Config(format!(
            "{var} is empty. Set it with: export {var}='...'"
        ))),
        Err(_) => Err(SpeakeasyError::Config(format!(
            "{var} not set. Set it with: export {var}='...'"
        ))),
    }
}

/// Check if an external tool is available.
fn check_tool(name: &str) -> Result<()> {
    // ffmpeg/ffprobe use -version (single dash), others use --version
    let version_arg = match name {
        "ffmpeg" | "ffprobe" => "-version",
        _ => "--version",
    };
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(SpeakeasyError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SpeakeasyError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(SpeakeasyError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
