use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

pub mod provision;
pub mod video_id;
pub mod youtube;

pub use provision::{BinaryProvisioner, HttpReleaseDownloader, ReleaseDownloader};
pub use video_id::{ValidationError, VideoId};
pub use youtube::{YtDlpExtractor, YtDlpOptions};

use crate::utils::format_duration;
use crate::Result;

/// Display metadata for a single video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub video_id: String,

    /// Title, empty if the extractor did not report one
    pub title: String,

    /// Thumbnail URL, empty if the extractor did not report one
    pub thumbnail: String,

    /// Duration as `m:ss`, empty when unknown
    pub duration: String,
}

impl VideoMetadata {
    /// Build metadata from a yt-dlp info document
    pub fn from_info(video_id: &VideoId, info: &Value) -> Self {
        let text = |key: &str| {
            info.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Self {
            video_id: video_id.to_string(),
            title: text("title"),
            thumbnail: text("thumbnail"),
            duration: format_duration(info.get("duration").and_then(Value::as_f64)),
        }
    }
}

/// Something that can describe a video and extract its audio
#[async_trait]
pub trait VideoExtractor: Send + Sync {
    /// Dump the video's metadata as JSON without downloading media
    async fn dump_metadata(&self, url: &str) -> Result<Value>;

    /// Extract the best available audio as MP3 into `output`
    async fn extract_audio(&self, url: &str, output: &Path) -> Result<()>;

    /// Name of the underlying tool, for logs
    fn tool_name(&self) -> &'static str;
}

/// Fetch title/thumbnail/duration for a video
pub async fn fetch_metadata(extractor: &dyn VideoExtractor, video_id: &VideoId) -> Result<VideoMetadata> {
    let url = video_id.watch_url();
    tracing::debug!("Fetching metadata for {} via {}", url, extractor.tool_name());

    let info = extractor.dump_metadata(&url).await?;
    Ok(VideoMetadata::from_info(video_id, &info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeExtractor;
    use serde_json::json;

    #[test]
    fn test_from_info_full() {
        let id = VideoId::parse("dQw4w9WgXcQ").unwrap();
        let info = json!({
            "title": "Never Gonna Give You Up",
            "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg",
            "duration": 213
        });

        let meta = VideoMetadata::from_info(&id, &info);
        assert_eq!(meta.title, "Never Gonna Give You Up");
        assert_eq!(meta.thumbnail, "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg");
        assert_eq!(meta.duration, "3:33");
    }

    #[test]
    fn test_from_info_missing_fields() {
        let id = VideoId::parse("dQw4w9WgXcQ").unwrap();
        let meta = VideoMetadata::from_info(&id, &json!({ "title": null }));

        assert_eq!(meta.title, "");
        assert_eq!(meta.thumbnail, "");
        assert_eq!(meta.duration, "");
    }

    #[test]
    fn test_metadata_serializes_camel_case() {
        let meta = VideoMetadata {
            video_id: "dQw4w9WgXcQ".into(),
            title: "t".into(),
            thumbnail: "".into(),
            duration: "0:05".into(),
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["videoId"], "dQw4w9WgXcQ");
        assert_eq!(value["duration"], "0:05");
    }

    #[tokio::test]
    async fn test_fetch_metadata_uses_canonical_url() {
        let extractor = FakeExtractor::new().with_info(json!({ "title": "Clip", "duration": 65.4 }));
        let id = VideoId::parse("https://youtu.be/dQw4w9WgXcQ?t=10").unwrap();

        let meta = fetch_metadata(&extractor, &id).await.unwrap();

        assert_eq!(meta.duration, "1:05");
        assert_eq!(
            extractor.urls(),
            vec!["https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fetch_metadata_surfaces_tool_error() {
        let extractor = FakeExtractor::new().failing_metadata("ERROR: Video unavailable");
        let id = VideoId::parse("dQw4w9WgXcQ").unwrap();

        let err = fetch_metadata(&extractor, &id).await.unwrap_err();
        assert_eq!(err.to_string(), "ERROR: Video unavailable");
    }
}
