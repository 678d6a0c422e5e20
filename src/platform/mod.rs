use std::path::{Path, PathBuf};

/// Host environment details the rest of the crate should not probe directly.
pub trait Platform: Send + Sync {
    /// Directory used for scratch files (temp MP3s, the managed yt-dlp binary)
    fn temp_dir(&self) -> PathBuf;

    /// File name of the yt-dlp executable on this platform
    fn binary_name(&self) -> &'static str;

    /// Release asset matching this platform
    fn release_url(&self) -> &'static str;

    /// Mark a file as executable. A no-op where the concept does not apply.
    fn make_executable(&self, path: &Path) -> std::io::Result<()>;
}

/// The platform the process is running on
#[derive(Debug, Clone, Default)]
pub struct HostPlatform {
    temp_dir: Option<PathBuf>,
}

impl HostPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `dir` instead of the system temp directory
    pub fn with_temp_dir(dir: Option<PathBuf>) -> Self {
        Self { temp_dir: dir }
    }
}

impl Platform for HostPlatform {
    fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    fn binary_name(&self) -> &'static str {
        if cfg!(target_os = "windows") {
            "yt-dlp.exe"
        } else {
            "yt-dlp"
        }
    }

    fn release_url(&self) -> &'static str {
        if cfg!(target_os = "windows") {
            "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp.exe"
        } else if cfg!(target_os = "macos") {
            "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp_macos"
        } else if cfg!(target_arch = "aarch64") {
            "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp_linux_aarch64"
        } else {
            "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp"
        }
    }

    #[cfg(unix)]
    fn make_executable(&self, path: &Path) -> std::io::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
    }

    #[cfg(not(unix))]
    fn make_executable(&self, _path: &Path) -> std::io::Result<()> {
        Ok(())
    }
}
