use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Name used when a title sanitizes down to nothing
pub const DEFAULT_AUDIO_NAME: &str = "youtube_audio";

/// Longest file stem produced by `sanitize_filename`
const MAX_FILENAME_CHARS: usize = 120;

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// Format a duration in seconds as `m:ss`.
///
/// Missing, zero, negative or non-finite durations render as an empty string.
pub fn format_duration(seconds: Option<f64>) -> String {
    let total = match seconds {
        Some(s) if s.is_finite() && s > 0.0 => s,
        _ => return String::new(),
    };

    let minutes = (total / 60.0).floor() as u64;
    let secs = (total % 60.0).floor() as u64;
    format!("{}:{:02}", minutes, secs)
}

/// Turn a video title into a safe download file stem.
///
/// Only ASCII letters, digits, `_` and `-` survive, so the name is always valid header text.
pub fn sanitize_filename(title: &str) -> String {
    static DISALLOWED: OnceLock<Regex> = OnceLock::new();
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    static UNDERSCORES: OnceLock<Regex> = OnceLock::new();

    let disallowed = DISALLOWED.get_or_init(|| Regex::new(r"[^A-Za-z0-9_\s-]").expect("valid regex"));
    let whitespace = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"));
    let underscores = UNDERSCORES.get_or_init(|| Regex::new(r"_+").expect("valid regex"));

    let cleaned = disallowed.replace_all(title, "");
    let cleaned = whitespace.replace_all(&cleaned, "_");
    let cleaned = underscores.replace_all(&cleaned, "_");

    let truncated: String = cleaned.chars().take(MAX_FILENAME_CHARS).collect();
    let trimmed = truncated.trim();

    if trimmed.is_empty() {
        DEFAULT_AUDIO_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Generate a unique filename from a millisecond timestamp plus a random suffix
pub fn generate_unique_filename(prefix: &str, extension: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let random_suffix = &uuid::Uuid::new_v4().simple().to_string()[..12];

    format!("{}_{}_{}.{}", prefix, timestamp, random_suffix, extension)
}

/// Place `filename` in `dir`, adding a counter if the name is taken
pub fn non_clobbering_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(filename);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(DEFAULT_AUDIO_NAME);
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("mp3");

    (1..)
        .map(|n| dir.join(format!("{}_{}.{}", stem, n, extension)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Check if the current environment has the tools yt-dlp relies on
pub async fn check_dependencies() -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available("ffmpeg", "-version").await {
        missing.push("ffmpeg - required by yt-dlp to transcode audio to MP3".to_string());
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str, version_flag: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg(version_flag)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
