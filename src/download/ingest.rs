//! Link ingest: turns a pasted link into a registered video with its formats.
//!
//! A URL already in the registry is answered from storage alone; the provider is
//! probed only for links never seen before.

use crate::core::utils::sanitize_title;
use crate::download::dispatch::ProviderRegistry;
use crate::download::error::DeliveryError;
use crate::download::source::{is_playlist_url, parse_link};
use crate::storage::registry::{self, Channel, Info, NewVideo, Video};
use crate::storage::DbPool;

pub const INVALID_LINK_MESSAGE: &str = "Неправильный формат ссылки. Отправьте корректную ссылку на видео.";
pub const PLAYLIST_MESSAGE: &str = "Эта ссылка содержит плейлист! Скачивание плейлистов пока не поддерживается.";

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub video: Video,
    pub channel: Option<Channel>,
    /// True when this call created the video row
    pub is_new: bool,
    /// Presentation order: audio first, then video by ascending width
    pub formats: Vec<Info>,
}

fn channel_of(pool: &DbPool, video: &Video) -> Option<Channel> {
    match registry::get_channel(pool, &video.channel_id) {
        Ok(channel) => Some(channel),
        Err(e) => {
            log::debug!("No channel {} for video {}: {}", video.channel_id, video.id, e);
            None
        }
    }
}

pub async fn ingest(pool: &DbPool, providers: &ProviderRegistry, text: &str) -> Result<IngestOutcome, DeliveryError> {
    let url = parse_link(text).ok_or_else(|| DeliveryError::UnsupportedUrl(INVALID_LINK_MESSAGE.to_string()))?;
    if is_playlist_url(&url) {
        return Err(DeliveryError::UnsupportedUrl(PLAYLIST_MESSAGE.to_string()));
    }
    let canonical = url.to_string();

    if let Some(video) = registry::resolve_video(pool, &canonical)? {
        let formats = registry::list_formats(pool, video.id)?;
        if !formats.is_empty() {
            log::info!("Link {} already registered as video {}", canonical, video.id);
            let channel = channel_of(pool, &video);
            return Ok(IngestOutcome {
                video,
                channel,
                is_new: false,
                formats,
            });
        }
        log::warn!("Video {} has no formats, probing again", video.id);
    }

    let gate = providers
        .resolve(&url)
        .ok_or_else(|| DeliveryError::UnsupportedUrl(INVALID_LINK_MESSAGE.to_string()))?;
    let probe = gate.probe(&url).await?;

    let channel_id = registry::create_or_update_channel(pool, probe.channel.to_patch())?;
    let mut title = sanitize_title(&probe.title);
    if title.is_empty() {
        title = probe.provider_video_id.clone();
    }

    let (video, is_new) = registry::resolve_or_create_video(
        pool,
        NewVideo {
            provider: probe.provider,
            provider_video_id: probe.provider_video_id.clone(),
            title,
            author: probe.author.clone(),
            url: canonical,
            channel_id,
            duration_secs: probe.duration_secs,
            upload_date: probe.upload_date.clone(),
            thumbnail: probe.thumbnail.clone(),
        },
    )?;
    let added = registry::register_formats(pool, video.id, &probe.formats)?;
    let formats = registry::list_formats(pool, video.id)?;
    log::info!(
        "Ingested {} video {} ({} new formats, {} total)",
        video.provider,
        video.id,
        added,
        formats.len()
    );

    let channel = channel_of(pool, &video);
    Ok(IngestOutcome {
        video,
        channel,
        is_new,
        formats,
    })
}
