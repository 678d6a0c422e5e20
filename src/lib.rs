//! YouTube Utilizer - caption retrieval and MP3 extraction for YouTube videos
//!
//! This library backs a small HTTP service (and a matching CLI) that validates YouTube
//! URLs, fetches caption tracks through a pluggable caption source, and relays yt-dlp
//! audio extractions to the caller as MP3 downloads.

pub mod captions;
pub mod cli;
pub mod config;
pub mod extractors;
pub mod output;
pub mod platform;
pub mod relay;
pub mod server;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use captions::{CaptionError, CaptionFetcher, CaptionSegment, CaptionSource, TranscriptResult};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extractors::{ValidationError, VideoExtractor, VideoId, VideoMetadata};
pub use relay::{PreparedAudio, TempAudioFile};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Errors surfaced to callers of the HTTP endpoints
#[derive(thiserror::Error, Debug)]
pub enum UtilizerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{context}: {message}")]
    ExternalTool {
        context: &'static str,
        message: String,
    },
}

impl UtilizerError {
    /// Wrap an external tool failure with the operation that was attempted.
    ///
    /// The message carries the whole cause chain (`outer: inner: ...`).
    pub fn external(context: &'static str, error: &anyhow::Error) -> Self {
        UtilizerError::ExternalTool {
            context,
            message: format!("{:#}", error),
        }
    }
}

impl From<CaptionError> for UtilizerError {
    fn from(error: CaptionError) -> Self {
        match error {
            CaptionError::NoSegments => UtilizerError::NotFound(CaptionError::NoSegments.to_string()),
            CaptionError::Unavailable(reason) => {
                tracing::debug!("Captions unavailable: {}", reason);
                UtilizerError::NotFound(
                    "Transcript not available. This video might have captions disabled or restricted.".to_string(),
                )
            }
            CaptionError::Source(e) => UtilizerError::external("Failed to fetch transcript", &e),
        }
    }
}
