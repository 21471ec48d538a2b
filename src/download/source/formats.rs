//! yt-dlp JSON model, URL routing and per-provider rendition selection.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use url::Url;

use crate::core::types::{FormatDescriptor, ProviderKind};
use crate::core::utils::{bytes_to_megabytes, format_megabytes};

static YOUTUBE_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)^(https?://)?(www\.|m\.|music\.)?(youtube\.com|youtu\.be)/\S+").ok());
static TIKTOK_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)^(https?://)?([a-z]+\.)?tiktok\.com/\S+").ok());
static VK_VIDEO_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)^(https?://)?(www\.|m\.)?(vk\.com|vkvideo\.ru)/video-?\d+_\d+").ok());

fn matches(re: &Lazy<Option<Regex>>, text: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(text))
}

/// Which provider a link belongs to, if any.
pub fn provider_for_url(url: &str) -> Option<ProviderKind> {
    let url = url.trim();
    if matches(&YOUTUBE_RE, url) {
        Some(ProviderKind::YouTube)
    } else if matches(&TIKTOK_RE, url) {
        Some(ProviderKind::TikTok)
    } else if matches(&VK_VIDEO_RE, url) {
        Some(ProviderKind::Vk)
    } else {
        None
    }
}

/// A YouTube link pointing at a playlist rather than a single video
/// (`list=` without `v=`, or a `/playlist` path).
pub fn is_playlist_url(url: &Url) -> bool {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    if !(host.ends_with("youtube.com") || host.ends_with("youtu.be")) {
        return false;
    }

    let mut has_list = false;
    let mut has_video = false;
    for (key, _) in url.query_pairs() {
        match key.as_ref() {
            "list" => has_list = true,
            "v" => has_video = true,
            _ => {}
        }
    }
    let short_link = host.ends_with("youtu.be") && url.path().len() > 1;

    url.path().starts_with("/playlist") || (has_list && !has_video && !short_link)
}

/// Parses user text into a URL, adding a scheme when it is missing.
pub fn parse_link(text: &str) -> Option<Url> {
    let text = text.trim();
    Url::parse(text)
        .ok()
        .or_else(|| Url::parse(&format!("https://{}", text)).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
}

/// Subset of the `yt-dlp -J` output used by the bot.
#[derive(Debug, Clone, Deserialize)]
pub struct YtDlpInfo {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub uploader_id: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub channel_follower_count: Option<i64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YtDlpFormat {
    pub format_id: String,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub filesize: Option<f64>,
    #[serde(default)]
    pub tbr: Option<f64>,
    #[serde(default)]
    pub abr: Option<f64>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub resolution: Option<String>,
}

impl YtDlpFormat {
    fn has_video(&self) -> bool {
        self.vcodec.as_deref().is_some_and(|v| v != "none")
    }

    fn is_audio_only(&self) -> bool {
        self.vcodec.as_deref() == Some("none")
    }

    fn has_audio(&self) -> bool {
        self.acodec.as_deref().is_some_and(|a| a != "none")
    }

    /// "WxH" when both dimensions are known.
    fn dimensions(&self) -> Option<String> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(format!("{}x{}", w, h)),
            _ => None,
        }
    }

    fn size_label(&self) -> Option<String> {
        self.filesize
            .filter(|s| *s > 0.0)
            .map(|s| format_megabytes(bytes_to_megabytes(s as u64)))
    }
}

/// Renditions offered to the user for a probed video.
pub fn select_formats(kind: ProviderKind, info: &YtDlpInfo) -> Vec<FormatDescriptor> {
    match kind {
        ProviderKind::YouTube => select_youtube(&info.formats),
        ProviderKind::TikTok => select_tiktok(&info.formats),
        ProviderKind::Vk => select_vk(&info.formats, info.duration),
    }
}

/// Largest audio-only stream, plus one video per resolution with the highest bitrate.
/// Streams without a size or a video codec are skipped.
fn select_youtube(formats: &[YtDlpFormat]) -> Vec<FormatDescriptor> {
    let mut selected = Vec::new();

    let best_audio = formats
        .iter()
        .filter(|f| f.is_audio_only() && f.has_audio() && f.filesize.is_some_and(|s| s > 0.0))
        .max_by(|a, b| a.filesize.unwrap_or(0.0).total_cmp(&b.filesize.unwrap_or(0.0)));
    if let Some(audio) = best_audio {
        selected.push(FormatDescriptor::audio(&audio.format_id, audio.size_label()));
    }

    let mut best_video: Vec<(String, &YtDlpFormat)> = Vec::new();
    for f in formats {
        if !f.has_video() || !f.filesize.is_some_and(|s| s > 0.0) {
            continue;
        }
        let resolution = f.dimensions().unwrap_or_else(|| "N/A".to_string());
        match best_video.iter_mut().find(|(res, _)| *res == resolution) {
            Some(slot) => {
                if f.tbr.unwrap_or(0.0) > slot.1.tbr.unwrap_or(0.0) {
                    slot.1 = f;
                }
            }
            None => best_video.push((resolution, f)),
        }
    }

    selected.extend(
        best_video
            .into_iter()
            .map(|(_, f)| FormatDescriptor::video(&f.format_id, f.dimensions(), f.size_label())),
    );
    selected
}

/// One video per resolution, the largest file wins.
fn select_tiktok(formats: &[YtDlpFormat]) -> Vec<FormatDescriptor> {
    let mut best: Vec<(Option<String>, &YtDlpFormat)> = Vec::new();
    for f in formats.iter().filter(|f| f.has_video()) {
        let resolution = f.dimensions();
        match best.iter_mut().find(|(res, _)| *res == resolution) {
            Some(slot) => {
                if f.filesize.unwrap_or(0.0) > slot.1.filesize.unwrap_or(0.0) {
                    slot.1 = f;
                }
            }
            None => best.push((resolution, f)),
        }
    }

    best.into_iter()
        .map(|(res, f)| FormatDescriptor::video(&f.format_id, res, f.size_label()))
        .collect()
}

/// Best audio by `abr` plus the first video seen per resolution. Sizes are
/// estimated from bitrate and duration since VK rarely reports them.
fn select_vk(formats: &[YtDlpFormat], duration: Option<f64>) -> Vec<FormatDescriptor> {
    let estimate = |f: &YtDlpFormat| match (f.tbr, duration) {
        (Some(tbr), Some(d)) if d > 0.0 => Some(format_megabytes(tbr * d / (8.0 * 1024.0))),
        _ => None,
    };

    let mut selected = Vec::new();

    let best_audio = formats
        .iter()
        .filter(|f| f.is_audio_only())
        .max_by(|a, b| a.abr.unwrap_or(0.0).total_cmp(&b.abr.unwrap_or(0.0)));
    if let Some(audio) = best_audio {
        selected.push(FormatDescriptor::audio(&audio.format_id, estimate(audio)));
    }

    let mut seen: Vec<Option<String>> = Vec::new();
    for f in formats.iter().filter(|f| !f.is_audio_only()) {
        let resolution = f.dimensions().or_else(|| f.resolution.clone());
        if seen.contains(&resolution) {
            continue;
        }
        seen.push(resolution.clone());
        selected.push(FormatDescriptor::video(&f.format_id, resolution, estimate(f)));
    }
    selected
}
