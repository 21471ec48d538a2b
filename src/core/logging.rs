//! Logger initialization and startup diagnostics

use anyhow::Result;
use simplelog::*;
use std::fs::File;
use std::path::Path;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the external tools and limits the bot starts with.
pub fn log_startup_configuration() {
    log::info!("yt-dlp binary: {}", *config::YTDL_BIN);
    log::info!("ffmpeg binary: {}", *config::FFMPEG_BIN);
    log::info!("Temp dir: {}", *config::TEMP_FILES_DIR);
    log::info!(
        "Upload ceiling: {} bytes, provider concurrency: {}",
        *config::upload::MAX_UPLOAD_BYTES,
        *config::provider::CONCURRENCY
    );

    match config::YTDL_COOKIES_FILE.as_deref() {
        Some(cookies) => {
            let expanded = shellexpand::tilde(cookies).to_string();
            if Path::new(&expanded).exists() {
                log::info!("YTDL_COOKIES_FILE: {}", expanded);
            } else {
                log::error!("YTDL_COOKIES_FILE: {} (file not found, YouTube may refuse downloads)", expanded);
            }
        }
        None => log::warn!("YTDL_COOKIES_FILE not set"),
    }
}
