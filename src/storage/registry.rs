//! Identity & format registry.
//!
//! Durable record of every video seen (keyed by URL), its channel, every format
//! observed for it and the chat-platform handle of each format delivered once.
//! Rows are never deleted. Unique constraints (`videos.url`,
//! `infos(video_id, format_id)`, `files.info_id`) resolve concurrent writers: the
//! loser of a race re-reads the winner's row instead of failing.

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use thiserror::Error;

use super::db::{get_connection, DbPool};
use crate::core::types::{FormatDescriptor, FormatKind, ProviderKind};
use crate::core::utils::resolution_width;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Uploader of a video. Every field but the id is advisory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub channel_id: String,
    pub name: Option<String>,
    /// Only set when a provider reports one; yt-dlp probes do not
    pub avatar: Option<String>,
    pub subscriber_count: Option<i64>,
    pub video_count: Option<i64>,
}

/// Partial channel update: `None` fields keep what is stored.
#[derive(Debug, Clone, Default)]
pub struct ChannelPatch {
    pub channel_id: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub subscriber_count: Option<i64>,
    pub video_count: Option<i64>,
}

impl ChannelPatch {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Video {
    pub id: i64,
    pub provider: ProviderKind,
    pub provider_video_id: String,
    pub title: String,
    pub author: Option<String>,
    pub url: String,
    pub channel_id: String,
    pub duration_secs: Option<i64>,
    /// Provider layout, usually `YYYYMMDD`
    pub upload_date: Option<String>,
    /// Remote URL until the first preview, then a chat-platform photo handle
    pub thumbnail: Option<String>,
}

/// Everything needed to create a video row.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub provider: ProviderKind,
    pub provider_video_id: String,
    pub title: String,
    pub author: Option<String>,
    pub url: String,
    pub channel_id: String,
    pub duration_secs: Option<i64>,
    pub upload_date: Option<String>,
    pub thumbnail: Option<String>,
}

/// One registered format of a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Info {
    pub id: i64,
    pub video_id: i64,
    pub format_id: String,
    pub kind: FormatKind,
    pub resolution: Option<String>,
    pub approx_size: Option<String>,
    pub materialized: bool,
}

/// Stored chat-platform handle of a delivered format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub id: i64,
    pub video_id: i64,
    pub info_id: i64,
    pub playlist_id: Option<i64>,
    pub handle: String,
}

const VIDEO_COLUMNS: &str =
    "id, provider, provider_video_id, title, author, url, channel_id, duration_secs, upload_date, thumbnail";
const INFO_COLUMNS: &str = "id, video_id, format_id, kind, resolution, approx_size, materialized";
const FILE_COLUMNS: &str = "id, video_id, info_id, playlist_id, handle";

fn video_from_row(row: &Row<'_>) -> rusqlite::Result<Video> {
    Ok(Video {
        id: row.get(0)?,
        provider: row.get(1)?,
        provider_video_id: row.get(2)?,
        title: row.get(3)?,
        author: row.get(4)?,
        url: row.get(5)?,
        channel_id: row.get(6)?,
        duration_secs: row.get(7)?,
        upload_date: row.get(8)?,
        thumbnail: row.get(9)?,
    })
}

fn info_from_row(row: &Row<'_>) -> rusqlite::Result<Info> {
    Ok(Info {
        id: row.get(0)?,
        video_id: row.get(1)?,
        format_id: row.get(2)?,
        kind: row.get(3)?,
        resolution: row.get(4)?,
        approx_size: row.get(5)?,
        materialized: row.get::<_, i64>(6)? != 0,
    })
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        video_id: row.get(1)?,
        info_id: row.get(2)?,
        playlist_id: row.get(3)?,
        handle: row.get(4)?,
    })
}

fn video_by_url(conn: &Connection, url: &str) -> rusqlite::Result<Option<Video>> {
    conn.query_row(
        &format!("SELECT {} FROM videos WHERE url = ?1", VIDEO_COLUMNS),
        [url],
        video_from_row,
    )
    .optional()
}

fn video_by_id(conn: &Connection, video_id: i64) -> rusqlite::Result<Option<Video>> {
    conn.query_row(
        &format!("SELECT {} FROM videos WHERE id = ?1", VIDEO_COLUMNS),
        [video_id],
        video_from_row,
    )
    .optional()
}

fn info_by_id(conn: &Connection, info_id: i64) -> rusqlite::Result<Option<Info>> {
    conn.query_row(
        &format!("SELECT {} FROM infos WHERE id = ?1", INFO_COLUMNS),
        [info_id],
        info_from_row,
    )
    .optional()
}

fn file_by_info(conn: &Connection, info_id: i64) -> rusqlite::Result<Option<FileRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM files WHERE info_id = ?1", FILE_COLUMNS),
        [info_id],
        file_from_row,
    )
    .optional()
}

/// Exact-URL lookup.
pub fn resolve_video(pool: &DbPool, url: &str) -> RegistryResult<Option<Video>> {
    let conn = get_connection(pool)?;
    Ok(video_by_url(&conn, url)?)
}

/// Returns the video stored for `new.url`, creating it on first sight.
///
/// The boolean is true only for the caller whose insert created the row; concurrent
/// first callers converge on the same row. A bare channel row is created when the
/// channel is not known yet.
pub fn resolve_or_create_video(pool: &DbPool, new: NewVideo) -> RegistryResult<(Video, bool)> {
    let mut conn = get_connection(pool)?;

    if let Some(existing) = video_by_url(&conn, &new.url)? {
        return Ok((existing, false));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(
        "INSERT INTO channels (channel_id) VALUES (?1) ON CONFLICT(channel_id) DO NOTHING",
        [&new.channel_id],
    )?;
    let inserted = tx.execute(
        "INSERT INTO videos (provider, provider_video_id, title, author, url, channel_id, duration_secs, upload_date, thumbnail)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(url) DO NOTHING",
        params![
            new.provider,
            new.provider_video_id,
            new.title,
            new.author,
            new.url,
            new.channel_id,
            new.duration_secs,
            new.upload_date,
            new.thumbnail,
        ],
    )?;
    let video = video_by_url(&tx, &new.url)?
        .ok_or_else(|| RegistryError::NotFound(format!("video with url {}", new.url)))?;
    tx.commit()?;

    if inserted > 0 {
        log::info!("Registered video {} ({} {})", video.id, video.provider, video.provider_video_id);
    }
    Ok((video, inserted > 0))
}

/// Creates the channel or merges the given fields into the stored row.
pub fn create_or_update_channel(pool: &DbPool, patch: ChannelPatch) -> RegistryResult<String> {
    let conn = get_connection(pool)?;
    conn.execute(
        "INSERT INTO channels (channel_id, name, avatar, subscriber_count, video_count)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(channel_id) DO UPDATE SET
            name = COALESCE(excluded.name, channels.name),
            avatar = COALESCE(excluded.avatar, channels.avatar),
            subscriber_count = COALESCE(excluded.subscriber_count, channels.subscriber_count),
            video_count = COALESCE(excluded.video_count, channels.video_count)",
        params![
            patch.channel_id,
            patch.name,
            patch.avatar,
            patch.subscriber_count,
            patch.video_count,
        ],
    )?;
    Ok(patch.channel_id)
}

pub fn get_channel(pool: &DbPool, channel_id: &str) -> RegistryResult<Channel> {
    let conn = get_connection(pool)?;
    conn.query_row(
        "SELECT channel_id, name, avatar, subscriber_count, video_count FROM channels WHERE channel_id = ?1",
        [channel_id],
        |row| {
            Ok(Channel {
                channel_id: row.get(0)?,
                name: row.get(1)?,
                avatar: row.get(2)?,
                subscriber_count: row.get(3)?,
                video_count: row.get(4)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| RegistryError::NotFound(format!("channel {}", channel_id)))
}

pub fn get_video(pool: &DbPool, video_id: i64) -> RegistryResult<Video> {
    let conn = get_connection(pool)?;
    video_by_id(&conn, video_id)?.ok_or_else(|| RegistryError::NotFound(format!("video {}", video_id)))
}

/// Replaces the stored thumbnail (remote URL) with a chat-platform photo handle.
pub fn set_thumbnail(pool: &DbPool, video_id: i64, handle: &str) -> RegistryResult<()> {
    let conn = get_connection(pool)?;
    let updated = conn.execute("UPDATE videos SET thumbnail = ?1 WHERE id = ?2", params![handle, video_id])?;
    if updated == 0 {
        return Err(RegistryError::NotFound(format!("video {}", video_id)));
    }
    Ok(())
}

/// Inserts every format not yet known for the video and returns how many were new.
pub fn register_formats(pool: &DbPool, video_id: i64, formats: &[FormatDescriptor]) -> RegistryResult<usize> {
    let mut conn = get_connection(pool)?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if video_by_id(&tx, video_id)?.is_none() {
        return Err(RegistryError::NotFound(format!("video {}", video_id)));
    }

    let mut inserted = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO infos (video_id, format_id, kind, resolution, approx_size, materialized)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)
             ON CONFLICT(video_id, format_id) DO NOTHING",
        )?;
        for format in formats {
            inserted += stmt.execute(params![
                video_id,
                format.format_id,
                format.kind,
                format.resolution,
                format.approx_size,
            ])?;
        }
    }
    tx.commit()?;

    log::debug!("Video {}: {} of {} formats new", video_id, inserted, formats.len());
    Ok(inserted)
}

/// Formats of a video in presentation order: audio first, then ascending width
/// parsed from the resolution label (missing or unparsable counts as 0). Ties
/// keep registration order.
pub fn list_formats(pool: &DbPool, video_id: i64) -> RegistryResult<Vec<Info>> {
    let conn = get_connection(pool)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM infos WHERE video_id = ?1 ORDER BY id",
        INFO_COLUMNS
    ))?;
    let mut infos = stmt
        .query_map([video_id], info_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    sort_for_presentation(&mut infos);
    Ok(infos)
}

/// Stable sort: audio before everything else, then by resolution width.
pub fn sort_for_presentation(infos: &mut [Info]) {
    infos.sort_by_key(|info| (!info.kind.is_audio(), resolution_width(info.resolution.as_deref())));
}

pub fn get_format(pool: &DbPool, video_id: i64, format_id: &str) -> RegistryResult<Option<Info>> {
    let conn = get_connection(pool)?;
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM infos WHERE video_id = ?1 AND format_id = ?2", INFO_COLUMNS),
            params![video_id, format_id],
            info_from_row,
        )
        .optional()?)
}

pub fn get_format_by_id(pool: &DbPool, info_id: i64) -> RegistryResult<Option<Info>> {
    let conn = get_connection(pool)?;
    Ok(info_by_id(&conn, info_id)?)
}

/// Flags the format as delivered. Calling it again is a no-op.
pub fn mark_materialized(pool: &DbPool, info_id: i64) -> RegistryResult<()> {
    let conn = get_connection(pool)?;
    let updated = conn.execute("UPDATE infos SET materialized = 1 WHERE id = ?1", [info_id])?;
    if updated == 0 {
        return Err(RegistryError::NotFound(format!("format {}", info_id)));
    }
    Ok(())
}

pub fn find_file(pool: &DbPool, info_id: i64) -> RegistryResult<Option<FileRecord>> {
    let conn = get_connection(pool)?;
    Ok(file_by_info(&conn, info_id)?)
}

/// Stores the handle of a delivered format and flips its `materialized` flag in
/// one transaction.
///
/// If a File already exists for the format, that row (and its handle) is
/// returned unchanged.
pub fn record_file(pool: &DbPool, video_id: i64, info_id: i64, handle: &str) -> RegistryResult<FileRecord> {
    let mut conn = get_connection(pool)?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    match info_by_id(&tx, info_id)? {
        Some(info) if info.video_id == video_id => {}
        _ => {
            return Err(RegistryError::NotFound(format!(
                "format {} of video {}",
                info_id, video_id
            )))
        }
    }

    let inserted = tx.execute(
        "INSERT INTO files (video_id, info_id, handle) VALUES (?1, ?2, ?3)
         ON CONFLICT(info_id) DO NOTHING",
        params![video_id, info_id, handle],
    )?;
    tx.execute("UPDATE infos SET materialized = 1 WHERE id = ?1", [info_id])?;
    let file = file_by_info(&tx, info_id)?
        .ok_or_else(|| RegistryError::NotFound(format!("file for format {}", info_id)))?;
    tx.commit()?;

    if inserted == 0 {
        log::info!("Format {} already had a file, keeping existing handle", info_id);
    }
    Ok(file)
}

/// Rewrites the handle of an existing File in place.
pub fn replace_file_handle(pool: &DbPool, info_id: i64, handle: &str) -> RegistryResult<()> {
    let conn = get_connection(pool)?;
    let updated = conn.execute("UPDATE files SET handle = ?1 WHERE info_id = ?2", params![handle, info_id])?;
    if updated == 0 {
        return Err(RegistryError::NotFound(format!("file for format {}", info_id)));
    }
    Ok(())
}
