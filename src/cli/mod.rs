use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ytutil",
    about = "YouTube Utilizer - fetch captions and download audio as MP3 from YouTube videos",
    version,
    long_about = "Runs a small HTTP service that returns YouTube captions, video metadata and MP3 downloads, \
                  and exposes the same operations from the command line. Audio extraction uses yt-dlp, \
                  which is downloaded on first use."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (defaults to ./config.yaml, then the user config directory)
    #[arg(short, long, global = true, value_name = "FILE", env = "YTUTIL_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(short, long, value_name = "ADDR", env = "YTUTIL_BIND")]
        bind: Option<String>,
    },

    /// Fetch the captions of a video
    Transcript {
        /// YouTube video URL or 11-character video ID
        #[arg(value_name = "URL")]
        url: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Prefix each line with its start time (text format only)
        #[arg(long)]
        timestamps: bool,
    },

    /// Show title, thumbnail and duration of a video
    Info {
        /// YouTube video URL or 11-character video ID
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Download the audio of a video as MP3
    Mp3 {
        /// YouTube video URL or 11-character video ID
        #[arg(value_name = "URL")]
        url: String,

        /// Directory to save the MP3 into
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output: PathBuf,
    },

    /// Show the effective configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON, same shape as the /transcript endpoint
    Json,
    /// SRT subtitle format
    Srt,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Srt => write!(f, "srt"),
        }
    }
}
