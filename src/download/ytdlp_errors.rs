//! Classification of yt-dlp failures from its stderr.

use crate::download::provider::ProviderError;

/// Kinds of yt-dlp failure the bot tells apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YtDlpErrorType {
    /// Private, removed, age-gated or geo-blocked media
    VideoUnavailable,
    /// Cookies expired or YouTube wants a sign-in
    InvalidCookies,
    /// YouTube throttling or blocking automated requests
    BotDetection,
    /// Timeouts, resets, DNS
    NetworkError,
    Unknown,
}

/// Analyzes yt-dlp stderr and determines the error type.
pub fn analyze_ytdlp_error(stderr: &str) -> YtDlpErrorType {
    let stderr_lower = stderr.to_lowercase();

    if stderr_lower.contains("private video")
        || stderr_lower.contains("video unavailable")
        || stderr_lower.contains("this video is not available")
        || stderr_lower.contains("video is private")
        || stderr_lower.contains("has been removed")
        || stderr_lower.contains("does not exist")
        || stderr_lower.contains("available in your country")
        || stderr_lower.contains("geo restriction")
        || stderr_lower.contains("blocked it in your country")
        || stderr_lower.contains("http error 404")
        || stderr_lower.contains("requested format is not available")
    {
        return YtDlpErrorType::VideoUnavailable;
    }

    if stderr_lower.contains("cookies are no longer valid")
        || stderr_lower.contains("sign in to confirm")
        || stderr_lower.contains("please sign in")
        || stderr_lower.contains("use --cookies")
    {
        return YtDlpErrorType::InvalidCookies;
    }

    if stderr_lower.contains("http error 403")
        || stderr_lower.contains("http error 429")
        || stderr_lower.contains("too many requests")
    {
        return YtDlpErrorType::BotDetection;
    }

    if stderr_lower.contains("timed out")
        || stderr_lower.contains("timeout")
        || stderr_lower.contains("connection reset")
        || stderr_lower.contains("connection refused")
        || stderr_lower.contains("temporary failure in name resolution")
        || stderr_lower.contains("network is unreachable")
        || stderr_lower.contains("http error 5")
    {
        return YtDlpErrorType::NetworkError;
    }

    YtDlpErrorType::Unknown
}

/// Maps a failed yt-dlp run onto the provider error taxonomy.
///
/// Rate limiting counts as transient so the gate backs off and retries.
pub fn to_provider_error(stderr: &str) -> ProviderError {
    let detail = last_error_line(stderr);
    match analyze_ytdlp_error(stderr) {
        YtDlpErrorType::VideoUnavailable => ProviderError::Unavailable(detail),
        YtDlpErrorType::NetworkError | YtDlpErrorType::BotDetection => ProviderError::Transient(detail),
        YtDlpErrorType::InvalidCookies => {
            log::error!("yt-dlp rejected the cookies, refresh YTDL_COOKIES_FILE: {}", detail);
            ProviderError::Failed(detail)
        }
        YtDlpErrorType::Unknown => ProviderError::Failed(detail),
    }
}

/// The most informative line of yt-dlp stderr, usually the final `ERROR:` line.
fn last_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|l| l.contains("ERROR"))
        .or_else(|| stderr.lines().rev().find(|l| !l.trim().is_empty()))
        .unwrap_or("yt-dlp failed without output")
        .trim()
        .to_string()
}
