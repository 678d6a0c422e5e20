use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

use super::provision::BinaryProvisioner;
use super::VideoExtractor;
use crate::Result;

/// Options passed to yt-dlp, rendered as command line flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YtDlpOptions {
    /// Output template (`-o`)
    pub output: Option<String>,

    /// Format selector (`-f`)
    pub format: Option<String>,

    pub extract_audio: bool,
    pub audio_format: Option<String>,

    /// 0 (best) to 10 (worst)
    pub audio_quality: Option<u8>,

    pub dump_single_json: bool,
    pub skip_download: bool,
    pub prefer_free_formats: bool,
    pub no_warnings: bool,
    pub no_call_home: bool,
    pub no_check_certificates: bool,
    pub no_playlist: bool,
}

impl YtDlpOptions {
    /// Dump metadata only, quietly
    pub fn metadata() -> Self {
        Self {
            dump_single_json: true,
            skip_download: true,
            prefer_free_formats: true,
            ..Self::quiet()
        }
    }

    /// Best available audio transcoded to MP3 at maximum quality
    pub fn mp3(output_template: impl Into<String>) -> Self {
        Self {
            output: Some(output_template.into()),
            format: Some("bestaudio/best".to_string()),
            extract_audio: true,
            audio_format: Some("mp3".to_string()),
            audio_quality: Some(0),
            ..Self::quiet()
        }
    }

    fn quiet() -> Self {
        Self {
            no_warnings: true,
            no_call_home: true,
            no_check_certificates: true,
            no_playlist: true,
            ..Self::default()
        }
    }

    /// Render as arguments, with `url` last
    pub fn to_args(&self, url: &str) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(output) = &self.output {
            args.push("--output".to_string());
            args.push(output.clone());
        }
        if let Some(format) = &self.format {
            args.push("--format".to_string());
            args.push(format.clone());
        }
        if self.extract_audio {
            args.push("--extract-audio".to_string());
        }
        if let Some(audio_format) = &self.audio_format {
            args.push("--audio-format".to_string());
            args.push(audio_format.clone());
        }
        if let Some(quality) = self.audio_quality {
            args.push("--audio-quality".to_string());
            args.push(quality.to_string());
        }

        let flags = [
            (self.dump_single_json, "--dump-single-json"),
            (self.skip_download, "--skip-download"),
            (self.prefer_free_formats, "--prefer-free-formats"),
            (self.no_warnings, "--no-warnings"),
            (self.no_call_home, "--no-call-home"),
            (self.no_check_certificates, "--no-check-certificates"),
            (self.no_playlist, "--no-playlist"),
        ];
        args.extend(flags.iter().filter(|(on, _)| *on).map(|(_, flag)| flag.to_string()));

        args.push(url.to_string());
        args
    }
}

/// YouTube extractor backed by the provisioned yt-dlp binary
pub struct YtDlpExtractor {
    provisioner: Arc<BinaryProvisioner>,
}

impl YtDlpExtractor {
    pub fn new(provisioner: Arc<BinaryProvisioner>) -> Self {
        Self { provisioner }
    }

    /// Run yt-dlp and return its stdout
    async fn run(&self, options: &YtDlpOptions, url: &str) -> Result<Vec<u8>> {
        let binary = self.provisioner.acquire().await?;
        let args = options.to_args(url);

        tracing::debug!("Running {} {}", binary.display(), args.join(" "));

        // The child is killed if the request is dropped mid-extraction
        let output = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", binary.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!("yt-dlp stderr: {}", stderr);
            anyhow::bail!("{}", summarize_stderr(&stderr, output.status));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl VideoExtractor for YtDlpExtractor {
    async fn dump_metadata(&self, url: &str) -> Result<Value> {
        let stdout = self.run(&YtDlpOptions::metadata(), url).await?;
        let info: Value = serde_json::from_slice(&stdout).context("yt-dlp returned invalid JSON")?;

        Ok(info)
    }

    async fn extract_audio(&self, url: &str, output: &Path) -> Result<()> {
        // yt-dlp picks the extension itself; after conversion it lands on `.mp3`
        let template = output.with_extension("%(ext)s");
        self.run(&YtDlpOptions::mp3(template.to_string_lossy()), url).await?;

        Ok(())
    }

    fn tool_name(&self) -> &'static str {
        "yt-dlp"
    }
}

/// One readable line from yt-dlp's stderr: the last `ERROR:` line if any, else the last
/// non-empty line, else the exit status.
fn summarize_stderr(stderr: &str, status: std::process::ExitStatus) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    lines
        .iter()
        .rev()
        .find(|line| line.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|line| line.to_string())
        .unwrap_or_else(|| format!("yt-dlp exited with {}", status))
}
