use anyhow::Context;
use async_trait::async_trait;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;

use crate::platform::Platform;
use crate::Result;

/// Directory name (under the temp dir) that holds the managed yt-dlp binary
pub const BINARY_DIR_NAME: &str = "youtube_utilizer_ytdlp";

/// Fetches a release asset to a local path
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReleaseDownloader: Send + Sync {
    async fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Downloads release assets over HTTP
pub struct HttpReleaseDownloader {
    client: reqwest::Client,
}

impl HttpReleaseDownloader {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client }
    }
}

impl Default for HttpReleaseDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReleaseDownloader for HttpReleaseDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP {} from {}", response.status(), url);
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create {}", dest.display()))?;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        Ok(())
    }
}

/// Owns the one yt-dlp binary shared by every request in the process.
///
/// The first `acquire` installs the binary; concurrent callers wait on that single
/// install. A failed install is not remembered, so the next call tries again.
pub struct BinaryProvisioner {
    platform: Arc<dyn Platform>,
    downloader: Arc<dyn ReleaseDownloader>,
    binary_dir: PathBuf,
    release_url: String,
    pinned: Option<PathBuf>,
    handle: OnceCell<PathBuf>,
}

impl BinaryProvisioner {
    pub fn new(platform: Arc<dyn Platform>, downloader: Arc<dyn ReleaseDownloader>) -> Self {
        let binary_dir = platform.temp_dir().join(BINARY_DIR_NAME);
        let release_url = platform.release_url().to_string();

        Self {
            platform,
            downloader,
            binary_dir,
            release_url,
            pinned: None,
            handle: OnceCell::new(),
        }
    }

    /// Install into `dir` instead of the default temp location
    pub fn with_binary_dir(mut self, dir: PathBuf) -> Self {
        self.binary_dir = dir;
        self
    }

    pub fn with_release_url(mut self, url: impl Into<String>) -> Self {
        self.release_url = url.into();
        self
    }

    /// Use an existing executable and never download
    pub fn with_pinned_binary(mut self, path: PathBuf) -> Self {
        self.pinned = Some(path);
        self
    }

    /// Path of the managed binary (whether or not it exists yet)
    pub fn binary_path(&self) -> PathBuf {
        self.pinned
            .clone()
            .unwrap_or_else(|| self.binary_dir.join(self.platform.binary_name()))
    }

    /// Return the binary path, installing it on first use.
    ///
    /// Callers that arrive during an install wait for it. If it fails, the failure goes
    /// only to the caller that ran it; each queued caller then runs its own install in
    /// turn, so during an outage N waiting requests make N download attempts in a row.
    pub async fn acquire(&self) -> Result<PathBuf> {
        if let Some(path) = self.handle.get() {
            return Ok(path.clone());
        }

        self.handle
            .get_or_try_init(|| self.install())
            .await
            .cloned()
    }

    async fn install(&self) -> Result<PathBuf> {
        if let Some(path) = &self.pinned {
            tracing::info!("Using configured yt-dlp binary: {}", path.display());
            return Ok(path.clone());
        }

        tokio::fs::create_dir_all(&self.binary_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.binary_dir.display()))?;

        let binary = self.binary_path();
        let present = tokio::fs::try_exists(&binary).await.unwrap_or(false);

        if !present {
            // Written under a temporary name so a half-written file is never executed
            let partial = binary.with_extension("part");
            tracing::info!("Downloading yt-dlp from {} to {}", self.release_url, binary.display());

            if let Err(e) = self.downloader.download(&self.release_url, &partial).await {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e.context("Failed to download yt-dlp"));
            }

            tokio::fs::rename(&partial, &binary)
                .await
                .with_context(|| format!("Failed to move yt-dlp into {}", binary.display()))?;
        } else {
            tracing::debug!("Reusing yt-dlp binary at {}", binary.display());
        }

        if let Err(e) = self.platform.make_executable(&binary) {
            tracing::debug!("Could not mark {} executable: {}", binary.display(), e);
        }

        Ok(binary)
    }
}
