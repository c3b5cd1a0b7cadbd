//! Doctor command - verify system requirements and configuration.

use crate::cli::preflight::required_tools;
use crate::cli::Output;
use crate::config::{GenerationProvider, Settings};
use console::style;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Speakeasy Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    // Tools needed by the configured retrieval are errors, the rest warnings.
    println!("{}", style("External Tools").bold());
    let needed = required_tools(settings);
    let tools = [
        ("yt-dlp", "yt-dlp --version", install_hint_ytdlp()),
        ("ffmpeg", "ffmpeg -version", install_hint_ffmpeg()),
        ("ffprobe", "ffprobe -version", install_hint_ffmpeg()),
    ];
    for (name, version_cmd, hint) in tools {
        let mut check = check_tool(name, version_cmd, hint);
        if check.status == CheckStatus::Error && !needed.contains(&name) {
            check.status = CheckStatus::Warning;
        }
        check.print();
        checks.push(check);
    }

    println!();

    println!("{}", style("Generation Backend").bold());
    let api_check = check_api_key(settings);
    api_check.print();
    checks.push(api_check);

    println!();

    println!("{}", style("Directories").bold());
    let dir_check = check_temp_dir(settings);
    dir_check.print();
    checks.push(dir_check);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file();
    config_check.print();
    checks.push(config_check);

    println!();

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Speakeasy.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!(
            "All checks passed with {} warning(s).",
            warnings
        ));
    } else {
        Output::success("All checks passed! Speakeasy is ready to use.");
    }

    Ok(())
}

/// Check if an external tool is available.
fn check_tool(name: &str, version_cmd: &str, hint: &str) -> CheckResult {
    let mut parts = version_cmd.split_whitespace();
    let Some(cmd) = parts.next() else {
        return CheckResult::error(name, "no command to run", hint);
    };
    let args: Vec<&str> = parts.collect();

    match Command::new(cmd).args(&args).output() {
        Ok(output) if output.status.success() => {
            // Try to extract version from first line
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();

            CheckResult::ok(name, &truncate(&version, 50))
        }
        Ok(_) => CheckResult::error(name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, "not found", hint)
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), hint),
    }
}

/// Check that the configured generation provider has an API key.
fn check_api_key(settings: &Settings) -> CheckResult {
    let provider = settings.generation.provider;
    if provider == GenerationProvider::Null {
        return CheckResult::warning(
            "Provider",
            "null (every stage returns its fallback)",
            "Set generation.provider to gemini or openai",
        );
    }

    let var = settings.generation.api_key_env.as_str();
    let hint = format!("Set with: export {}='...'", var);
    match std::env::var(var) {
        Ok(key) if key.chars().count() > 12 => CheckResult::ok(
            var,
            &format!("configured for {} ({})", provider, mask_key(&key)),
        ),
        Ok(key) if key.is_empty() => CheckResult::error(var, "empty", &hint),
        Ok(_) => CheckResult::warning(var, "set but looks too short", &hint),
        Err(_) => CheckResult::error(var, "not set", &hint),
    }
}

/// First and last four characters of a key.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let head: String = chars.iter().take(4).collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Check the transient session directory.
fn check_temp_dir(settings: &Settings) -> CheckResult {
    let temp_dir = settings.temp_dir();
    if temp_dir.exists() {
        CheckResult::ok("Temp directory", &format!("{}", temp_dir.display()))
    } else {
        CheckResult::warning(
            "Temp directory",
            &format!("{} (will be created)", temp_dir.display()),
            "Directory will be created on first use",
        )
    }
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            &format!("Create {} to override defaults", config_path.display()),
        )
    }
}

/// Shorten long version strings on a character boundary.
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Platform-specific install hint for yt-dlp.
fn install_hint_ytdlp() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install yt-dlp"
    } else if cfg!(target_os = "linux") {
        "Install with: pip install yt-dlp (or your package manager)"
    } else {
        "Install from: https://github.com/yt-dlp/yt-dlp"
    }
}

/// Platform-specific install hint for ffmpeg.
fn install_hint_ffmpeg() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install ffmpeg"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install ffmpeg (or your package manager)"
    } else {
        "Install from: https://ffmpeg.org/download.html"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_ok() {
        let result = CheckResult::ok("test", "passed");
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.hint.is_none());
    }

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_mask_key_counts_characters() {
        assert_eq!(mask_key("AIzaSyABCDEFGHIJ1234"), "AIza...1234");
        assert_eq!(mask_key("ключ-очень-длинный-ключ"), "ключ...ключ");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 50), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }

    #[test]
    fn test_null_provider_is_a_warning() {
        let mut settings = Settings::default();
        settings.generation.provider = GenerationProvider::Null;
        assert_eq!(check_api_key(&settings).status, CheckStatus::Warning);
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let mut settings = Settings::default();
        settings.generation.api_key_env = "SPEAKEASY_DOCTOR_UNSET_KEY".to_string();
        let check = check_api_key(&settings);
        assert_eq!(check.status, CheckStatus::Error);
        assert_eq!(check.name, "SPEAKEASY_DOCTOR_UNSET_KEY");
    }
}
