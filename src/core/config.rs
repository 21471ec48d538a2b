use once_cell::sync::Lazy;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Reads an environment variable and parses it, falling back to `default`
/// when the variable is missing or malformed.
fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Ignoring malformed {}={:?}, using default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// ffmpeg binary used to remux webm audio into m4a
/// Read from FFMPEG_BIN, defaults to "ffmpeg"
pub static FFMPEG_BIN: Lazy<String> = Lazy::new(|| env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string()));

/// Path to cookies file passed to yt-dlp (YouTube mostly needs it)
/// Read from YTDL_COOKIES_FILE environment variable
pub static YTDL_COOKIES_FILE: Lazy<Option<String>> =
    Lazy::new(|| env::var("YTDL_COOKIES_FILE").ok().filter(|v| !v.trim().is_empty()));

/// Temporary directory for downloaded media
/// Read from TEMP_FILES_DIR environment variable, supports tilde (~) expansion
/// Files here live only between download and upload
pub static TEMP_FILES_DIR: Lazy<String> = Lazy::new(|| {
    let raw = env::var("TEMP_FILES_DIR").unwrap_or_else(|_| "/tmp/vidrelay".to_string());
    shellexpand::tilde(&raw).to_string()
});

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: database.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "database.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: app.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "app.log".to_string()));

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Custom Bot API server (local telegram-bot-api raises the upload limit to 2 GB)
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| env::var("BOT_API_URL").ok());

/// Upload size configuration
pub mod upload {
    use once_cell::sync::Lazy;

    /// Hard ceiling for one upload through the chat platform.
    /// 2 GiB is the local Bot API server limit.
    pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 2 * 1024 * 1024 * 1024;

    /// Read from MAX_UPLOAD_BYTES
    pub static MAX_UPLOAD_BYTES: Lazy<u64> =
        Lazy::new(|| super::env_parse("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES));
}

/// Provider call configuration
pub mod provider {
    use super::Duration;
    use once_cell::sync::Lazy;

    /// Maximum number of concurrent calls per provider.
    /// Kept low to avoid 403 rate limiting upstream.
    pub const DEFAULT_CONCURRENCY: usize = 2;

    /// Timeout for yt-dlp metadata probes (in seconds)
    pub const PROBE_TIMEOUT_SECS: u64 = 90;

    /// Timeout for a full yt-dlp download (in seconds)
    pub const DOWNLOAD_TIMEOUT_SECS: u64 = 900;

    /// Retries after the first attempt for transient provider failures
    pub const MAX_RETRIES: u32 = 2;

    /// Read from PROVIDER_CONCURRENCY
    pub static CONCURRENCY: Lazy<usize> =
        Lazy::new(|| super::env_parse("PROVIDER_CONCURRENCY", DEFAULT_CONCURRENCY).max(1));

    pub fn probe_timeout() -> Duration {
        Duration::from_secs(super::env_parse("PROBE_TIMEOUT_SECS", PROBE_TIMEOUT_SECS))
    }

    pub fn download_timeout() -> Duration {
        Duration::from_secs(super::env_parse("DOWNLOAD_TIMEOUT_SECS", DOWNLOAD_TIMEOUT_SECS))
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API requests (in seconds)
    /// Large video uploads through a local Bot API server take a while
    pub const REQUEST_TIMEOUT_SECS: u64 = 900;

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Retry configuration
pub mod retry {
    use super::Duration;

    /// Maximum number of retries for dispatcher reconnection
    pub const MAX_DISPATCHER_RETRIES: u32 = 5;

    /// Delay between dispatcher retry attempts (in seconds)
    pub const DISPATCHER_RETRY_DELAY_SECS: u64 = 5;

    pub fn dispatcher_delay() -> Duration {
        Duration::from_secs(DISPATCHER_RETRY_DELAY_SECS)
    }
}
