use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::captions::DEFAULT_FALLBACK_LANGUAGES;

/// Directory name under the user config dir
const CONFIG_DIR_NAME: &str = "youtube-utilizer";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// yt-dlp binary management
    pub ytdlp: YtDlpConfig,

    /// Caption language negotiation
    pub captions: CaptionsConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server listens on
    pub bind: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct YtDlpConfig {
    /// Use this executable instead of downloading one
    pub binary_path: Option<PathBuf>,

    /// Where the downloaded binary is kept
    pub binary_dir: Option<PathBuf>,

    /// Release asset to download instead of the platform default
    pub release_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionsConfig {
    /// Languages tried in order when the default caption track fails
    pub fallback_languages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Temporary directory for MP3 extraction
    pub temp_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

impl Default for CaptionsConfig {
    fn default() -> Self {
        Self {
            fallback_languages: DEFAULT_FALLBACK_LANGUAGES.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default locations.
    ///
    /// An explicit path must exist. Without one, a missing file means defaults.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::config_path().filter(|p| p.exists()),
        };

        let config = match config_path {
            Some(path) => {
                tracing::debug!("Loading config from {}", path.display());
                let content = fs_err::read_to_string(&path).context("Failed to read config file")?;
                Self::from_yaml(&content)?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML document; omitted keys take their defaults
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).context("Failed to parse config file")
    }

    /// Default config file location: `./config.yaml` if present, else the user config dir
    pub fn config_path() -> Option<PathBuf> {
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Some(local_config);
        }

        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;

        if self.captions.fallback_languages.iter().any(|l| l.trim().is_empty()) {
            anyhow::bail!("captions.fallback_languages must not contain empty entries");
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .with_context(|| format!("Invalid server.bind address: {}", self.server.bind))
    }

    /// Display current configuration
    pub fn display(&self) {
        let unset = || "(default)".to_string();
        let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string()).unwrap_or_else(unset);

        println!("Current Configuration:");
        println!("  Bind Address: {}", self.server.bind);
        println!("  yt-dlp Binary: {}", path(&self.ytdlp.binary_path));
        println!("  yt-dlp Directory: {}", path(&self.ytdlp.binary_dir));
        println!(
            "  yt-dlp Release: {}",
            self.ytdlp.release_url.clone().unwrap_or_else(unset)
        );
        println!("  Caption Fallbacks: {}", self.captions.fallback_languages.join(", "));
        println!("  Temp Directory: {}", path(&self.app.temp_dir));
        if let Some(path) = Self::config_path() {
            println!("  Config File: {}", path.display());
        }
    }
}
