use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use url::Url;

/// Reasons user input cannot be turned into a single video
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("YouTube URL is required")]
    EmptyInput,

    #[error("Playlist URLs are not supported. Please provide a single video URL.")]
    PlaylistNotSupported,

    #[error("Invalid YouTube URL. Please provide a valid YouTube video URL.")]
    InvalidUrl,
}

/// An 11-character YouTube video identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

/// Recognized input forms, tried in this order. The first capture wins.
fn patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // youtube.com/watch?v=ID (v may follow other params)
            r"youtube\.com/watch\?(?:[^#]*?&)?v=([A-Za-z0-9_-]{11})(?:[&#/]|$)",
            // youtu.be/ID
            r"youtu\.be/([A-Za-z0-9_-]{11})(?:[?&#/]|$)",
            // youtube.com/embed/ID
            r"youtube\.com/embed/([A-Za-z0-9_-]{11})(?:[?&#/]|$)",
            // youtube.com/v/ID
            r"youtube\.com/v/([A-Za-z0-9_-]{11})(?:[?&#/]|$)",
            // bare ID
            r"^([A-Za-z0-9_-]{11})$",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("video id pattern is valid"))
        .collect()
    })
}

impl VideoId {
    /// Parse user input into a video identifier.
    ///
    /// Playlist detection runs before extraction, so a playlist URL that also names a
    /// video is still rejected.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let input = raw.trim();
        if input.is_empty() {
            return Err(ValidationError::EmptyInput);
        }

        if has_playlist_marker(input) {
            return Err(ValidationError::PlaylistNotSupported);
        }

        patterns()
            .iter()
            .find_map(|pattern| pattern.captures(input))
            .map(|caps| VideoId(caps[1].to_string()))
            .ok_or(ValidationError::InvalidUrl)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch URL, independent of the form the user typed
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VideoId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VideoId::parse(s)
    }
}

/// True when the input carries a `list` query parameter.
/// Scheme-less input such as `youtube.com/watch?...` is read as https.
fn has_playlist_marker(input: &str) -> bool {
    let parsed = Url::parse(input).or_else(|_| Url::parse(&format!("https://{}", input)));

    match parsed {
        Ok(url) => url.query_pairs().any(|(key, _)| key == "list"),
        Err(_) => false,
    }
}
