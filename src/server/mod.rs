//! HTTP surface: `/transcript`, `/mp3-info`, `/download-mp3` and `/health`.

use anyhow::Context;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::captions::{CaptionFetcher, InnerTubeCaptions, TranscriptResult};
use crate::config::Config;
use crate::extractors::{
    fetch_metadata, BinaryProvisioner, HttpReleaseDownloader, VideoExtractor, VideoId, VideoMetadata, YtDlpExtractor,
};
use crate::platform::{HostPlatform, Platform};
use crate::relay::prepare_audio;
use crate::utils::DEFAULT_AUDIO_NAME;
use crate::UtilizerError;

/// Shared services, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<dyn VideoExtractor>,
    pub captions: Arc<CaptionFetcher>,
    pub temp_dir: PathBuf,
}

impl AppState {
    pub fn new(extractor: Arc<dyn VideoExtractor>, captions: Arc<CaptionFetcher>, temp_dir: PathBuf) -> Self {
        Self {
            extractor,
            captions,
            temp_dir,
        }
    }

    /// Wire the yt-dlp extractor and InnerTube caption source from configuration
    pub fn from_config(config: &Config) -> Self {
        let platform: Arc<dyn Platform> = Arc::new(HostPlatform::with_temp_dir(config.app.temp_dir.clone()));
        let temp_dir = platform.temp_dir();

        let mut provisioner = BinaryProvisioner::new(platform, Arc::new(HttpReleaseDownloader::new()));
        if let Some(dir) = &config.ytdlp.binary_dir {
            provisioner = provisioner.with_binary_dir(dir.clone());
        }
        if let Some(url) = &config.ytdlp.release_url {
            provisioner = provisioner.with_release_url(url.clone());
        }
        if let Some(path) = &config.ytdlp.binary_path {
            provisioner = provisioner.with_pinned_binary(path.clone());
        }

        let captions = CaptionFetcher::new(Arc::new(InnerTubeCaptions::new()))
            .with_fallback_languages(config.captions.fallback_languages.clone());

        Self::new(
            Arc::new(YtDlpExtractor::new(Arc::new(provisioner))),
            Arc::new(captions),
            temp_dir,
        )
    }
}

/// Request body shared by every endpoint
#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    #[serde(default)]
    pub url: Option<String>,
}

impl UrlRequest {
    fn video_id(payload: Result<Json<UrlRequest>, JsonRejection>) -> Result<VideoId, UtilizerError> {
        let Json(request) = payload.map_err(|e| UtilizerError::InvalidRequest(e.body_text()))?;
        Ok(VideoId::parse(request.url.as_deref().unwrap_or_default())?)
    }
}

impl IntoResponse for UtilizerError {
    fn into_response(self) -> Response {
        let status = match &self {
            UtilizerError::Validation(_) | UtilizerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            UtilizerError::NotFound(_) => StatusCode::NOT_FOUND,
            UtilizerError::ExternalTool { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, UtilizerError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/transcript", post(transcript_handler))
        .route("/mp3-info", post(mp3_info_handler))
        .route("/download-mp3", post(download_mp3_handler))
        .with_state(state)
        .layer(middleware::from_fn(log_requests))
}

/// Bind `addr` and serve until Ctrl-C
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;
    tracing::info!("{} {} -> {} in {:?}", method, path, response.status().as_u16(), started.elapsed());

    response
}

async fn health() -> &'static str {
    "OK"
}

async fn transcript_handler(
    State(state): State<AppState>,
    payload: Result<Json<UrlRequest>, JsonRejection>,
) -> ApiResult<Json<TranscriptResult>> {
    let video_id = UrlRequest::video_id(payload)?;
    tracing::info!("Fetching transcript for {}", video_id);

    let result = state.captions.fetch_captions(&video_id).await?;
    Ok(Json(result))
}

async fn mp3_info_handler(
    State(state): State<AppState>,
    payload: Result<Json<UrlRequest>, JsonRejection>,
) -> ApiResult<Json<VideoMetadata>> {
    let video_id = UrlRequest::video_id(payload)?;

    let metadata = fetch_metadata(state.extractor.as_ref(), &video_id)
        .await
        .map_err(|e| UtilizerError::external("Failed to fetch video info", &e))?;
    Ok(Json(metadata))
}

async fn download_mp3_handler(
    State(state): State<AppState>,
    payload: Result<Json<UrlRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let video_id = UrlRequest::video_id(payload)?;

    let prepared = prepare_audio(state.extractor.as_ref(), &state.temp_dir, &video_id)
        .await
        .map_err(|e| UtilizerError::external("MP3 download failed", &e))?;
    tracing::info!("Streaming {} ({} bytes) for {}", prepared.filename, prepared.size, video_id);

    let disposition = content_disposition(&prepared.filename);
    let size = prepared.size;

    let mut response = Body::from_stream(prepared.into_stream()).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg"));
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));

    Ok(response)
}

fn content_disposition(filename: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename)).unwrap_or_else(|_| {
        HeaderValue::from_str(&format!("attachment; filename=\"{}.mp3\"", DEFAULT_AUDIO_NAME))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeExtractor, ScriptedCaptions};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    fn state(extractor: FakeExtractor, captions: ScriptedCaptions, temp_dir: &std::path::Path) -> AppState {
        AppState::new(
            Arc::new(extractor),
            Arc::new(CaptionFetcher::new(Arc::new(captions)).with_fallback_languages(vec!["en".into()])),
            temp_dir.to_path_buf(),
        )
    }

    fn post(uri: &str, body: impl Into<Body>) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request {
        post(uri, body.to_string())
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(state(FakeExtractor::new(), ScriptedCaptions::new(), dir.path()));

        let response = app
            .oneshot(axum::http::Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"OK");
    }

    #[tokio::test]
    async fn test_validation_errors_are_bad_requests() {
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            (json!({}), "YouTube URL is required"),
            (json!({ "url": "   " }), "YouTube URL is required"),
            (
                json!({ "url": "https://www.youtube.com/playlist?list=PL123" }),
                "Playlist URLs are not supported. Please provide a single video URL.",
            ),
            (
                json!({ "url": "https://vimeo.com/12345" }),
                "Invalid YouTube URL. Please provide a valid YouTube video URL.",
            ),
        ];

        for uri in ["/transcript", "/mp3-info", "/download-mp3"] {
            for (body, message) in &cases {
                let extractor = FakeExtractor::new();
                let captions = ScriptedCaptions::new();
                let app = router(state(extractor, captions, dir.path()));

                let response = app.oneshot(post_json(uri, body.clone())).await.unwrap();
                assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{} {}", uri, body);
                assert_eq!(body_json(response).await, json!({ "error": message }));
            }
        }
    }

    #[tokio::test]
    async fn test_validation_runs_before_external_calls() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(FakeExtractor::new());
        let captions = Arc::new(ScriptedCaptions::new());
        let app = router(AppState::new(
            extractor.clone(),
            Arc::new(CaptionFetcher::new(captions.clone())),
            dir.path().to_path_buf(),
        ));

        let response = app
            .clone()
            .oneshot(post_json("/mp3-info", json!({ "url": "not a url" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = app
            .oneshot(post_json("/transcript", json!({ "url": "not a url" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert!(extractor.urls().is_empty());
        assert!(captions.calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(state(FakeExtractor::new(), ScriptedCaptions::new(), dir.path()));

        let response = app.oneshot(post("/transcript", "{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn test_transcript_success() {
        let dir = tempfile::tempdir().unwrap();
        let captions = ScriptedCaptions::new().respond(
            None,
            json!({ "transcript": [
                { "text": "never gonna", "offset": 0.0, "duration": 1.5, "lang": "en" },
                { "text": "give you up", "offset": 1.5, "duration": 2.0, "lang": "en" }
            ]}),
        );
        let app = router(state(FakeExtractor::new(), captions, dir.path()));

        let response = app
            .oneshot(post_json("/transcript", json!({ "url": "https://youtu.be/dQw4w9WgXcQ" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["videoId"], "dQw4w9WgXcQ");
        assert_eq!(body["plainText"], "never gonna give you up");
        assert_eq!(body["totalSegments"], 2);
        assert_eq!(body["language"], "en");
        assert_eq!(body["transcript"][1], json!({ "text": "give you up", "start": 1.5, "duration": 2.0 }));
    }

    #[tokio::test]
    async fn test_transcript_empty_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let captions = ScriptedCaptions::new().respond_everything(json!({ "items": [] }));
        let app = router(state(FakeExtractor::new(), captions, dir.path()));

        let response = app.oneshot(post_json("/transcript", json!({ "url": VIDEO_URL }))).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await["error"],
            "No transcript available for this video. The video might not have captions enabled."
        );
    }

    #[tokio::test]
    async fn test_transcript_disabled_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let captions = ScriptedCaptions::new()
            .fail(None, "Transcript is disabled on this video (dQw4w9WgXcQ)")
            .fail_everything_else("No transcript found for language en");
        let app = router(state(FakeExtractor::new(), captions, dir.path()));

        let response = app.oneshot(post_json("/transcript", json!({ "url": VIDEO_URL }))).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await["error"],
            "Transcript not available. This video might have captions disabled or restricted."
        );
    }

    #[tokio::test]
    async fn test_transcript_source_failure_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let captions = ScriptedCaptions::new()
            .fail(None, "connection reset")
            .fail_everything_else("connection reset");
        let app = router(state(FakeExtractor::new(), captions, dir.path()));

        let response = app.oneshot(post_json("/transcript", json!({ "url": VIDEO_URL }))).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await["error"],
            "Failed to fetch transcript: connection reset"
        );
    }

    #[tokio::test]
    async fn test_mp3_info() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(state(FakeExtractor::new(), ScriptedCaptions::new(), dir.path()));

        let response = app.oneshot(post_json("/mp3-info", json!({ "url": VIDEO_URL }))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({
                "videoId": "dQw4w9WgXcQ",
                "title": "Artist: Song (Live) #1!",
                "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg",
                "duration": "1:01"
            })
        );
    }

    #[tokio::test]
    async fn test_provisioning_failure_reports_cause() {
        use crate::extractors::provision::MockReleaseDownloader;
        use crate::testing::FakePlatform;

        let dir = tempfile::tempdir().unwrap();
        let mut downloader = MockReleaseDownloader::new();
        downloader
            .expect_download()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("connection reset by peer")));

        let provisioner = BinaryProvisioner::new(Arc::new(FakePlatform::new(dir.path())), Arc::new(downloader));
        let app = router(AppState::new(
            Arc::new(YtDlpExtractor::new(Arc::new(provisioner))),
            Arc::new(CaptionFetcher::new(Arc::new(ScriptedCaptions::new()))),
            dir.path().to_path_buf(),
        ));

        let response = app.oneshot(post_json("/mp3-info", json!({ "url": VIDEO_URL }))).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await["error"],
            "Failed to fetch video info: Failed to download yt-dlp: connection reset by peer"
        );
    }

    #[tokio::test]
    async fn test_mp3_info_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FakeExtractor::new().failing_metadata("ERROR: Private video");
        let app = router(state(extractor, ScriptedCaptions::new(), dir.path()));

        let response = app.oneshot(post_json("/mp3-info", json!({ "url": VIDEO_URL }))).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await["error"],
            "Failed to fetch video info: ERROR: Private video"
        );
    }

    #[tokio::test]
    async fn test_download_streams_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let payload = b"ID3 streamed".repeat(10_000);
        let extractor = FakeExtractor::new().with_audio(payload.clone());
        let app = router(state(extractor, ScriptedCaptions::new(), dir.path()));

        let response = app
            .oneshot(post_json("/download-mp3", json!({ "url": VIDEO_URL })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Artist_Song_Live_1.mp3\""
        );
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::CONTENT_LENGTH], payload.len().to_string().as_str());

        assert_eq!(body_bytes(response).await, payload);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_download_failure_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FakeExtractor::new().failing_audio("ERROR: Requested format is not available");
        let app = router(state(extractor, ScriptedCaptions::new(), dir.path()));

        let response = app
            .oneshot(post_json("/download-mp3", json!({ "url": VIDEO_URL })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await["error"],
            "MP3 download failed: ERROR: Requested format is not available"
        );
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_content_disposition_is_ascii() {
        let filename = format!("{}.mp3", crate::utils::sanitize_filename("Café Müller"));
        let value = content_disposition(&filename);
        assert_eq!(value, "attachment; filename=\"Caf_Mller.mp3\"");

        let fallback = content_disposition("bad\nname.mp3");
        assert_eq!(fallback, "attachment; filename=\"youtube_audio.mp3\"");
    }
}
