use anyhow::Result;
use std::fmt::Write;
use std::path::Path;

use crate::captions::TranscriptResult;
use crate::cli::OutputFormat;
use crate::extractors::VideoMetadata;

/// Render a transcript in the requested format
pub fn render(result: &TranscriptResult, format: &OutputFormat, include_timestamps: bool) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => format_as_text(result, include_timestamps),
        OutputFormat::Json => format_as_json(result)?,
        OutputFormat::Srt => format_as_srt(result),
    })
}

/// Save a transcript to file
pub async fn save_to_file(
    result: &TranscriptResult,
    path: &Path,
    format: &OutputFormat,
    include_timestamps: bool,
) -> Result<()> {
    let content = render(result, format, include_timestamps)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print a transcript to stdout
pub fn print_to_console(result: &TranscriptResult, format: &OutputFormat, include_timestamps: bool) -> Result<()> {
    println!("{}", render(result, format, include_timestamps)?);
    Ok(())
}

/// Plain text; one `[m:ss] line` per segment when timestamps are requested
pub fn format_as_text(result: &TranscriptResult, include_timestamps: bool) -> String {
    if !include_timestamps {
        return result.plain_text.clone();
    }

    let mut out = String::new();
    for segment in &result.segments {
        let _ = writeln!(out, "[{}] {}", format_timestamp(segment.offset), segment.text);
    }
    out.trim_end().to_string()
}

/// Same body the `/transcript` endpoint returns, pretty-printed
pub fn format_as_json(result: &TranscriptResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

pub fn format_as_srt(result: &TranscriptResult) -> String {
    let mut out = String::new();
    for (i, segment) in result.segments.iter().enumerate() {
        let _ = writeln!(out, "{}", i + 1);
        let _ = writeln!(
            out,
            "{} --> {}",
            format_srt_timestamp(segment.offset),
            format_srt_timestamp(segment.offset + segment.duration)
        );
        let _ = writeln!(out, "{}\n", segment.text);
    }
    out
}

pub fn format_metadata(metadata: &VideoMetadata) -> String {
    let or_unknown = |s: &str| if s.is_empty() { "unknown".to_string() } else { s.to_string() };

    format!(
        "Video ID:  {}\nTitle:     {}\nDuration:  {}\nThumbnail: {}",
        metadata.video_id,
        or_unknown(&metadata.title),
        or_unknown(&metadata.duration),
        or_unknown(&metadata.thumbnail)
    )
}

/// `m:ss`, or `h:mm:ss` past the hour
fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// `HH:MM:SS,mmm`
fn format_srt_timestamp(seconds: f64) -> String {
    let millis = (seconds.max(0.0) * 1000.0).round() as u64;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        millis / 3_600_000,
        (millis % 3_600_000) / 60_000,
        (millis % 60_000) / 1000,
        millis % 1000
    )
}
