use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use youtube_utilizer::extractors::fetch_metadata;
use youtube_utilizer::server::{self, AppState};
use youtube_utilizer::utils::{self, format_file_size};
use youtube_utilizer::{output, relay, Cli, Commands, Config, VideoId};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "youtube_utilizer=debug" } else { "youtube_utilizer=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            let addr = config.bind_addr()?;

            warn_missing_dependencies().await;
            server::serve(AppState::from_config(&config), addr).await?;
        }
        Commands::Transcript {
            url,
            format,
            output,
            timestamps,
        } => {
            let video_id = VideoId::parse(&url)?;
            let state = AppState::from_config(&config);

            tracing::info!("Fetching transcript for {}", video_id);
            let result = state.captions.fetch_captions(&video_id).await?;

            match output {
                Some(path) => {
                    output::save_to_file(&result, &path, &format, timestamps).await?;
                    println!(
                        "Transcript ({} segments, {}) saved to: {}",
                        result.total_segments,
                        result.language,
                        path.display()
                    );
                }
                None => output::print_to_console(&result, &format, timestamps)?,
            }
        }
        Commands::Info { url } => {
            let video_id = VideoId::parse(&url)?;
            let state = AppState::from_config(&config);

            let metadata = fetch_metadata(state.extractor.as_ref(), &video_id).await?;
            println!("{}", output::format_metadata(&metadata));
        }
        Commands::Mp3 { url, output } => {
            let video_id = VideoId::parse(&url)?;
            warn_missing_dependencies().await;
            let state = AppState::from_config(&config);

            let progress = ProgressBar::new_spinner();
            progress.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
            progress.enable_steady_tick(Duration::from_millis(120));
            progress.set_message(format!("Extracting audio for {} with yt-dlp...", video_id));

            let prepared = match relay::prepare_audio(state.extractor.as_ref(), &state.temp_dir, &video_id).await {
                Ok(prepared) => prepared,
                Err(e) => {
                    progress.abandon_with_message(format!("{}", style("MP3 download failed").red()));
                    return Err(e);
                }
            };

            let size = prepared.size;
            progress.set_message("Saving MP3...");
            tokio::fs::create_dir_all(&output).await?;
            let saved = prepared.persist(&output).await?;
            progress.finish_and_clear();

            println!(
                "{} {} ({})",
                style("Saved").green().bold(),
                saved.display(),
                format_file_size(size)
            );
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                match Config::config_path() {
                    Some(path) => println!("Edit the config file to change settings:\n  {}", path.display()),
                    None => println!("No config directory available; pass --config FILE"),
                }
                println!("Use `ytutil config --show` to print the effective configuration.");
            }
        }
    }

    Ok(())
}

/// yt-dlp needs ffmpeg to transcode; warn early but keep going
async fn warn_missing_dependencies() {
    let missing = utils::check_dependencies().await;
    if missing.is_empty() {
        return;
    }

    eprintln!("{}", style("Dependency check warnings:").yellow().bold());
    for dep in missing {
        eprintln!("   • {}", dep);
    }
    eprintln!("   (Continuing anyway - tools may be available)");
}
