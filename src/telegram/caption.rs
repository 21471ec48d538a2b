//! Plain-text captions for previews and delivered files.

use crate::core::utils::{format_count, format_duration, format_upload_date};
use crate::download::provider::MediaSnapshot;
use crate::storage::registry::{Channel, Video};

/// Telegram caption limit, in characters
const MAX_CAPTION_CHARS: usize = 1024;

fn truncate(text: String) -> String {
    if text.chars().count() <= MAX_CAPTION_CHARS {
        return text;
    }
    let mut cut: String = text.chars().take(MAX_CAPTION_CHARS - 1).collect();
    cut.push('…');
    cut
}

/// Caption sent with a delivered audio or video.
pub fn media_caption(snapshot: &MediaSnapshot) -> String {
    let mut lines = vec![format!("🎭 {}", snapshot.title)];
    if let Some(author) = &snapshot.author {
        lines.push(format!("👤 {}", author));
    }
    if let Some(duration) = snapshot.duration_secs.filter(|d| *d > 0) {
        lines.push(format!("🕦 {}", format_duration(duration as u64)));
    }
    if let Some(resolution) = snapshot.resolution.as_deref().filter(|r| *r != "audio") {
        lines.push(format!("🎥 {}", resolution));
    }
    truncate(lines.join("\n"))
}

/// Caption of the preview photo shown above the format keyboard.
pub fn preview_caption(video: &Video, channel: Option<&Channel>) -> String {
    let mut text = format!("Видео: {}\n", video.title);

    if let Some(name) = channel.and_then(|c| c.name.as_deref()).or(video.author.as_deref()) {
        match channel.and_then(|c| c.subscriber_count) {
            Some(subs) => text.push_str(&format!("👤 {} ({} подписчиков)\n", name, format_count(subs.max(0) as u64))),
            None => text.push_str(&format!("👤 {}\n", name)),
        }
    }
    if let Some(duration) = video.duration_secs.filter(|d| *d > 0) {
        text.push_str(&format!("🕦 {}\n", format_duration(duration as u64)));
    }
    if let Some(date) = &video.upload_date {
        text.push_str(&format!("🎬 {}\n", format_upload_date(date)));
    }

    text.push_str("\n📺 Выберите формат для скачивания:");
    truncate(text)
}
