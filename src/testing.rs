//! Test doubles shared by unit tests across modules.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::captions::CaptionSource;
use crate::extractors::VideoExtractor;
use crate::platform::{HostPlatform, Platform};

/// Platform rooted in a scratch directory
pub struct FakePlatform {
    root: PathBuf,
    chmod_fails: bool,
}

impl FakePlatform {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            chmod_fails: false,
        }
    }

    pub fn failing_chmod(mut self) -> Self {
        self.chmod_fails = true;
        self
    }
}

impl Platform for FakePlatform {
    fn temp_dir(&self) -> PathBuf {
        self.root.clone()
    }

    fn binary_name(&self) -> &'static str {
        "yt-dlp"
    }

    fn release_url(&self) -> &'static str {
        "https://example.invalid/releases/yt-dlp"
    }

    fn make_executable(&self, path: &Path) -> std::io::Result<()> {
        if self.chmod_fails {
            return Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only fs"));
        }
        HostPlatform::new().make_executable(path)
    }
}

#[derive(Clone)]
enum AudioBehavior {
    Write(Vec<u8>),
    Fail(String),
    WritePartialThenFail(String),
    WriteNothing,
}

/// Extractor that writes canned audio and returns canned metadata
pub struct FakeExtractor {
    info: Result<Value, String>,
    audio: AudioBehavior,
    urls: Mutex<Vec<String>>,
    outputs: Mutex<Vec<PathBuf>>,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self {
            info: Ok(json!({
                "title": "Artist: Song (Live) #1!",
                "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg",
                "duration": 61
            })),
            audio: AudioBehavior::Write(b"ID3 fake mp3 payload".repeat(1024)),
            urls: Mutex::new(Vec::new()),
            outputs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_info(mut self, info: Value) -> Self {
        self.info = Ok(info);
        self
    }

    pub fn failing_metadata(mut self, message: &str) -> Self {
        self.info = Err(message.to_string());
        self
    }

    pub fn with_audio(mut self, bytes: Vec<u8>) -> Self {
        self.audio = AudioBehavior::Write(bytes);
        self
    }

    pub fn failing_audio(mut self, message: &str) -> Self {
        self.audio = AudioBehavior::Fail(message.to_string());
        self
    }

    pub fn failing_audio_after_partial_write(mut self, message: &str) -> Self {
        self.audio = AudioBehavior::WritePartialThenFail(message.to_string());
        self
    }

    pub fn writing_nothing(mut self) -> Self {
        self.audio = AudioBehavior::WriteNothing;
        self
    }

    /// URLs passed to either operation, in call order
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    /// Output paths requested for audio extraction
    pub fn outputs(&self) -> Vec<PathBuf> {
        self.outputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoExtractor for FakeExtractor {
    async fn dump_metadata(&self, url: &str) -> crate::Result<Value> {
        self.urls.lock().unwrap().push(url.to_string());
        self.info.clone().map_err(|message| anyhow::anyhow!(message))
    }

    async fn extract_audio(&self, url: &str, output: &Path) -> crate::Result<()> {
        self.urls.lock().unwrap().push(url.to_string());
        self.outputs.lock().unwrap().push(output.to_path_buf());

        match &self.audio {
            AudioBehavior::Write(bytes) => {
                tokio::fs::write(output, bytes).await?;
                Ok(())
            }
            AudioBehavior::Fail(message) => anyhow::bail!("{}", message),
            AudioBehavior::WritePartialThenFail(message) => {
                tokio::fs::write(output, b"partial").await?;
                anyhow::bail!("{}", message)
            }
            AudioBehavior::WriteNothing => Ok(()),
        }
    }

    fn tool_name(&self) -> &'static str {
        "fake"
    }
}

/// Caption source answering from a per-language script
pub struct ScriptedCaptions {
    script: HashMap<Option<String>, Result<Value, String>>,
    otherwise: Option<Result<Value, String>>,
    calls: Mutex<Vec<Option<String>>>,
}

impl ScriptedCaptions {
    pub fn new() -> Self {
        Self {
            script: HashMap::new(),
            otherwise: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(mut self, lang: Option<&str>, response: Value) -> Self {
        self.script.insert(lang.map(str::to_string), Ok(response));
        self
    }

    pub fn fail(mut self, lang: Option<&str>, message: &str) -> Self {
        self.script.insert(lang.map(str::to_string), Err(message.to_string()));
        self
    }

    pub fn respond_everything(mut self, response: Value) -> Self {
        self.otherwise = Some(Ok(response));
        self
    }

    pub fn fail_everything_else(mut self, message: &str) -> Self {
        self.otherwise = Some(Err(message.to_string()));
        self
    }

    /// Language hints received, in call order
    pub fn calls(&self) -> Vec<Option<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CaptionSource for ScriptedCaptions {
    async fn fetch(&self, _video_id: &str, lang: Option<&str>) -> anyhow::Result<Value> {
        let key = lang.map(str::to_string);
        self.calls.lock().unwrap().push(key.clone());

        let answer = self
            .script
            .get(&key)
            .or(self.otherwise.as_ref())
            .cloned()
            .unwrap_or_else(|| Err(format!("unscripted language {:?}", key)));

        answer.map_err(|message| anyhow::anyhow!(message))
    }
}
