use anyhow::{bail, Context};
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::OnceLock;

use super::{CaptionSegment, CaptionSource};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const CLIENT_VERSION: &str = "2.20241126.01.00";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    captions: Option<Captions>,
    playability_status: Option<PlayabilityStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayabilityStatus {
    status: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Captions {
    player_captions_tracklist_renderer: Option<TracklistRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TracklistRenderer {
    caption_tracks: Option<Vec<CaptionTrack>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    language_code: String,
}

/// Caption source that reads YouTube's own caption tracks through the InnerTube API
pub struct InnerTubeCaptions {
    client: reqwest::Client,
}

impl InnerTubeCaptions {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn caption_tracks(&self, video_id: &str, lang: Option<&str>) -> anyhow::Result<Vec<CaptionTrack>> {
        let watch_url = format!("https://www.youtube.com/watch?v={}", video_id);
        tracing::debug!("Fetching watch page: {}", watch_url);

        let page = self
            .client
            .get(&watch_url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let api_key = extract_api_key(&page)?;

        let player_url = format!(
            "https://www.youtube.com/youtubei/v1/player?key={}&prettyPrint=false",
            api_key
        );
        let body = json!({
            "context": {
                "client": {
                    "hl": lang.unwrap_or("en"),
                    "gl": "US",
                    "clientName": "WEB",
                    "clientVersion": CLIENT_VERSION
                }
            },
            "videoId": video_id
        });

        let response: PlayerResponse = self
            .client
            .post(&player_url)
            .header("User-Agent", USER_AGENT)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("Unexpected player response")?;

        if let Some(status) = &response.playability_status {
            if status.status.as_deref().is_some_and(|s| s != "OK") {
                bail!(
                    "Could not find captions: {}",
                    status.reason.as_deref().unwrap_or("video is not playable")
                );
            }
        }

        let tracks = response
            .captions
            .and_then(|c| c.player_captions_tracklist_renderer)
            .and_then(|r| r.caption_tracks)
            .unwrap_or_default();

        if tracks.is_empty() {
            bail!("Transcript is disabled on this video ({})", video_id);
        }

        Ok(tracks)
    }
}

impl Default for InnerTubeCaptions {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptionSource for InnerTubeCaptions {
    async fn fetch(&self, video_id: &str, lang: Option<&str>) -> anyhow::Result<Value> {
        let tracks = self.caption_tracks(video_id, lang).await?;

        let track = match lang {
            Some(lang) => tracks
                .iter()
                .find(|t| t.language_code == lang)
                .with_context(|| format!("No transcript found for language {}", lang))?,
            None => &tracks[0],
        };
        tracing::debug!("Using caption track {} for {}", track.language_code, video_id);

        let xml = self
            .client
            .get(&track.base_url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let segments: Vec<Value> = parse_caption_xml(&xml, &track.language_code)?
            .into_iter()
            .map(|s| {
                json!({
                    "text": s.text,
                    "offset": s.offset,
                    "duration": s.duration,
                    "lang": s.lang,
                })
            })
            .collect();

        Ok(Value::Array(segments))
    }
}

fn api_key_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#,
            r#"innertubeApiKey\s*[=:]\s*"([^"]+)""#,
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("api key pattern is valid"))
        .collect()
    })
}

fn extract_api_key(html: &str) -> anyhow::Result<String> {
    api_key_patterns()
        .iter()
        .find_map(|pattern| pattern.captures(html))
        .map(|caps| caps[1].to_string())
        .context("could not extract InnerTube API key from watch page")
}

/// Parse a timedtext XML document (`<text start=".." dur="..">..</text>`)
fn parse_caption_xml(xml: &str, lang: &str) -> anyhow::Result<Vec<CaptionSegment>> {
    let mut reader = Reader::from_str(xml);
    let mut segments = Vec::new();
    let mut timing: Option<(f64, f64)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"text" => {
                let mut start = 0.0;
                let mut dur = 0.0;
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).parse::<f64>().ok();
                    match attr.key.as_ref() {
                        b"start" => start = value.unwrap_or(0.0),
                        b"dur" => dur = value.unwrap_or(0.0),
                        _ => {}
                    }
                }
                timing = Some((start, dur));
            }
            Ok(Event::Text(ref e)) => {
                if let Some((offset, duration)) = timing.take() {
                    let raw = e.unescape().unwrap_or_default();
                    let text = html_escape::decode_html_entities(raw.trim()).into_owned();
                    if !text.is_empty() {
                        segments.push(CaptionSegment {
                            text,
                            offset,
                            duration,
                            lang: Some(lang.to_string()),
                        });
                    }
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"text" => {
                timing = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => bail!("error parsing caption XML: {}", e),
            _ => {}
        }
    }

    Ok(segments)
}
