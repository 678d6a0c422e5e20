use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

pub mod adapter;
pub mod innertube;

pub use adapter::extract_segment_list;
pub use innertube::InnerTubeCaptions;

use crate::extractors::VideoId;

/// Languages tried, in order, when the default caption track cannot be fetched
pub const DEFAULT_FALLBACK_LANGUAGES: [&str; 10] =
    ["en", "ar", "es", "fr", "de", "pt", "ru", "ja", "ko", "zh"];

/// Language reported when nothing better is known
pub const UNKNOWN_LANGUAGE: &str = "auto";

/// Language reported when the default track was used and carried no tag
pub const AUTO_DETECTED_LANGUAGE: &str = "auto-detected";

/// Error messages from caption sources that mean "this video has no captions"
const UNAVAILABLE_MARKERS: [&str; 3] = ["Could not find", "disabled", "No transcript"];

/// One timed unit of caption text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptionSegment {
    pub text: String,

    /// Start offset in seconds
    #[serde(rename = "start")]
    pub offset: f64,

    /// Duration in seconds
    pub duration: f64,

    #[serde(skip_serializing)]
    pub lang: Option<String>,
}

/// Captions for one video, shaped for the `/transcript` response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResult {
    pub video_id: String,

    #[serde(rename = "transcript")]
    pub segments: Vec<CaptionSegment>,

    /// All segment texts joined by single spaces
    pub plain_text: String,

    pub total_segments: usize,

    pub language: String,
}

impl TranscriptResult {
    pub fn new(video_id: &VideoId, segments: Vec<CaptionSegment>, language: String) -> Self {
        let plain_text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let language = if language.is_empty() {
            UNKNOWN_LANGUAGE.to_string()
        } else {
            language
        };

        Self {
            video_id: video_id.to_string(),
            total_segments: segments.len(),
            segments,
            plain_text,
            language,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CaptionError {
    /// The source answered but had no segments
    #[error("No transcript available for this video. The video might not have captions enabled.")]
    NoSegments,

    /// The source reported that captions are missing or disabled
    #[error("Transcript not available: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Source(#[from] anyhow::Error),
}

impl CaptionError {
    fn classify(error: anyhow::Error) -> Self {
        let message = error.to_string();
        if UNAVAILABLE_MARKERS.iter().any(|marker| message.contains(marker)) {
            CaptionError::Unavailable(message)
        } else {
            CaptionError::Source(error)
        }
    }
}

/// Source of raw caption data for a video.
///
/// The response shape is not fixed; see [`adapter`] for how segments are located.
#[async_trait]
pub trait CaptionSource: Send + Sync {
    async fn fetch(&self, video_id: &str, lang: Option<&str>) -> anyhow::Result<Value>;
}

/// Fetches captions with language negotiation
pub struct CaptionFetcher {
    source: Arc<dyn CaptionSource>,
    fallback_languages: Vec<String>,
}

impl CaptionFetcher {
    pub fn new(source: Arc<dyn CaptionSource>) -> Self {
        Self {
            source,
            fallback_languages: DEFAULT_FALLBACK_LANGUAGES.iter().map(|l| l.to_string()).collect(),
        }
    }

    pub fn with_fallback_languages(mut self, languages: Vec<String>) -> Self {
        self.fallback_languages = languages;
        self
    }

    /// Fetch captions for a video.
    ///
    /// The default track is tried first. Only if that call errors are the fallback
    /// languages tried, in order, until one yields segments. When none do, the error
    /// from the default-track call is returned.
    pub async fn fetch_captions(&self, video_id: &VideoId) -> Result<TranscriptResult, CaptionError> {
        let first_error = match self.source.fetch(video_id.as_str(), None).await {
            Ok(response) => {
                let segments = extract_segment_list(&response);
                tracing::debug!("Default caption track for {} has {} segments", video_id, segments.len());

                if segments.is_empty() {
                    return Err(CaptionError::NoSegments);
                }
                let language = segment_language(&segments).unwrap_or_else(|| AUTO_DETECTED_LANGUAGE.to_string());
                return Ok(TranscriptResult::new(video_id, segments, language));
            }
            Err(e) => e,
        };

        tracing::info!("Default caption fetch failed for {}: {:#}", video_id, first_error);

        for lang in &self.fallback_languages {
            match self.source.fetch(video_id.as_str(), Some(lang.as_str())).await {
                Ok(response) => {
                    let segments = extract_segment_list(&response);
                    if segments.is_empty() {
                        tracing::debug!("No {} captions for {}", lang, video_id);
                        continue;
                    }

                    tracing::info!("Using {} captions for {}", lang, video_id);
                    return Ok(TranscriptResult::new(video_id, segments, lang.clone()));
                }
                Err(e) => {
                    tracing::debug!("Caption fetch for {} in {} failed: {}", video_id, lang, e);
                }
            }
        }

        Err(CaptionError::classify(first_error))
    }
}

fn segment_language(segments: &[CaptionSegment]) -> Option<String> {
    segments.first().and_then(|s| s.lang.clone())
}
