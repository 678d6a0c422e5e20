//! Audio relay: extract a video's audio to a temp MP3 and hand it to the caller.
//!
//! A download moves through `Extracting -> Streaming -> {Completed, Failed, Cancelled}`.
//! The temp file is owned by a [`TempAudioFile`] guard that deletes it exactly once,
//! whichever way the request ends: the stream removes it at end of file or on a read
//! error, and dropping the guard (client disconnect, failed extraction) removes it too.

use anyhow::Context;
use async_stream::stream;
use axum::body::Bytes;
use futures_util::Stream;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

use crate::extractors::{VideoExtractor, VideoId};
use crate::utils::{generate_unique_filename, sanitize_filename, DEFAULT_AUDIO_NAME};
use crate::Result;

/// Read size for streaming the temp file
const CHUNK_SIZE: usize = 64 * 1024;

/// A temporary MP3 owned by one download.
///
/// yt-dlp writes intermediates next to the MP3 (`<stem>.webm.part`, `<stem>.m4a`,
/// `<stem>.ytdl`), so removal sweeps every file in the directory named `<stem>.*`.
pub struct TempAudioFile {
    path: PathBuf,
    removed: bool,
}

impl TempAudioFile {
    /// Reserve a fresh path in `dir`. Nothing is created on disk.
    pub fn allocate(dir: &Path) -> Self {
        Self {
            path: dir.join(generate_unique_filename("youtube_mp3", "mp3")),
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the MP3 and any yt-dlp leftovers. Later calls, and the drop, do nothing.
    pub async fn remove(&mut self) {
        if std::mem::replace(&mut self.removed, true) {
            return;
        }

        log_removal(&self.path, tokio::fs::remove_file(&self.path).await);

        let (Some(dir), Some(prefix)) = (self.path.parent(), self.sibling_prefix()) else {
            return;
        };
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to scan {} for leftovers: {}", dir.display(), e);
                return;
            }
        };
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) if entry.file_name().to_string_lossy().starts_with(&prefix) => {
                    let leftover = entry.path();
                    log_removal(&leftover, tokio::fs::remove_file(&leftover).await);
                }
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Failed to scan {} for leftovers: {}", dir.display(), e);
                    break;
                }
            }
        }
    }

    /// `<stem>.`, the name prefix shared by the MP3 and its intermediates
    fn sibling_prefix(&self) -> Option<String> {
        self.path
            .file_stem()
            .map(|stem| format!("{}.", stem.to_string_lossy()))
    }

    fn remove_blocking(&mut self) {
        self.removed = true;
        log_removal(&self.path, std::fs::remove_file(&self.path));

        let (Some(dir), Some(prefix)) = (self.path.parent(), self.sibling_prefix()) else {
            return;
        };
        match std::fs::read_dir(dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    if entry.file_name().to_string_lossy().starts_with(&prefix) {
                        let leftover = entry.path();
                        log_removal(&leftover, std::fs::remove_file(&leftover));
                    }
                }
            }
            Err(e) => tracing::warn!("Failed to scan {} for leftovers: {}", dir.display(), e),
        }
    }
}

impl Drop for TempAudioFile {
    fn drop(&mut self) {
        if !self.removed {
            self.remove_blocking();
        }
    }
}

fn log_removal(path: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => tracing::debug!("Deleted temp file {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("Temp file {} was never created", path.display())
        }
        Err(e) => tracing::warn!("Failed to delete temp file {}: {}", path.display(), e),
    }
}

/// An extracted MP3 ready to be streamed
pub struct PreparedAudio {
    pub file: TempAudioFile,

    /// Download filename, `<sanitized title>.mp3`
    pub filename: String,

    pub size: u64,
}

impl PreparedAudio {
    /// Byte stream of the file; the temp file is deleted when the stream finishes,
    /// fails, or is dropped
    pub fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        stream_audio(self.file)
    }

    /// Copy the MP3 into `dir` under its download filename and delete the temp file
    pub async fn persist(mut self, dir: &Path) -> Result<PathBuf> {
        let target = crate::utils::non_clobbering_path(dir, &self.filename);
        tokio::fs::copy(self.file.path(), &target)
            .await
            .with_context(|| format!("Failed to write {}", target.display()))?;
        self.file.remove().await;

        Ok(target)
    }
}

/// Extract audio for `video_id` into `temp_dir` and work out its download filename.
///
/// Extraction finishes before metadata is fetched. On any error the temp file is
/// deleted before returning.
pub async fn prepare_audio(
    extractor: &dyn VideoExtractor,
    temp_dir: &Path,
    video_id: &VideoId,
) -> Result<PreparedAudio> {
    let url = video_id.watch_url();
    let mut file = TempAudioFile::allocate(temp_dir);

    match extract(extractor, &url, &file).await {
        Ok((filename, size)) => Ok(PreparedAudio { file, filename, size }),
        Err(e) => {
            file.remove().await;
            Err(e)
        }
    }
}

async fn extract(extractor: &dyn VideoExtractor, url: &str, file: &TempAudioFile) -> Result<(String, u64)> {
    tracing::info!("Extracting audio from {} to {}", url, file.path().display());
    extractor.extract_audio(url, file.path()).await?;

    let size = tokio::fs::metadata(file.path())
        .await
        .with_context(|| format!("{} finished without producing an audio file", extractor.tool_name()))?
        .len();
    tracing::debug!("Extracted {} bytes to {}", size, file.path().display());

    let info = extractor.dump_metadata(url).await?;
    let title = info.get("title").and_then(Value::as_str).unwrap_or(DEFAULT_AUDIO_NAME);

    Ok((format!("{}.mp3", sanitize_filename(title)), size))
}

fn stream_audio(mut file: TempAudioFile) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    stream! {
        match tokio::fs::File::open(file.path()).await {
            Ok(mut reader) => {
                let mut buf = vec![0u8; CHUNK_SIZE];
                loop {
                    match reader.read(&mut buf).await {
                        Ok(0) => {
                            drop(reader);
                            file.remove().await;
                            break;
                        }
                        Ok(n) => yield Ok(Bytes::copy_from_slice(&buf[..n])),
                        Err(e) => {
                            tracing::error!("MP3 stream error for {}: {}", file.path().display(), e);
                            drop(reader);
                            file.remove().await;
                            yield Err(e);
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!("Failed to open {} for streaming: {}", file.path().display(), e);
                file.remove().await;
                yield Err(e);
            }
        }
    }
}
