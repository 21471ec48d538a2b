//! Delivery cache.
//!
//! Given a (video, format) pair, either replays the stored chat-platform handle
//! with no provider call and no local I/O, or downloads the rendition, uploads it,
//! records the handle and flags the format as materialized.
//!
//! Per pair the state moves `UNMATERIALIZED -> MATERIALIZING -> MATERIALIZED`.
//! MATERIALIZING exists only in this process: concurrent `deliver` calls for the
//! same pair are serialized by the in-flight table, and the second caller takes
//! the hit path once the first finishes. Across processes the unique File row per
//! format decides the winner.

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::core::config;
use crate::download::dispatch::ProviderRegistry;
use crate::download::error::DeliveryError;
use crate::download::provider::{MaterializeRequest, MediaSnapshot};
use crate::download::transcode::{needs_normalization, FfmpegTranscoder, Transcoder};
use crate::storage::registry::{self, Info, RegistryError, Video};
use crate::storage::DbPool;
use crate::telegram::caption::media_caption;
use crate::telegram::platform::{ChatPlatform, PlatformError};

/// What the delivery cache needs from the environment.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Files larger than this are refused before upload
    pub max_upload_bytes: u64,
    /// Where downloads live until they are uploaded
    pub temp_dir: PathBuf,
}

impl DeliveryConfig {
    pub fn from_env() -> Self {
        Self {
            max_upload_bytes: *config::upload::MAX_UPLOAD_BYTES,
            temp_dir: PathBuf::from(config::TEMP_FILES_DIR.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    pub video_id: i64,
    pub format_id: String,
    pub chat_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPath {
    /// Stored handle replayed, nothing downloaded
    Replayed,
    /// First delivery of the pair
    Uploaded,
    /// Stored handle was rejected; downloaded and uploaded again
    Reuploaded,
}

#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub handle: String,
    pub snapshot: MediaSnapshot,
    pub path: DeliveryPath,
}

/// Owns every local file written for one materialization and deletes them when
/// dropped, whichever way the delivery ends.
pub struct TempMedia {
    dir: PathBuf,
    stem: String,
    tracked: Vec<PathBuf>,
}

impl TempMedia {
    pub fn new(dir: &Path, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.to_path_buf(),
            stem: stem.into(),
            tracked: Vec::new(),
        }
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Adds a file outside the `<stem>.*` pattern to the cleanup list.
    pub fn track(&mut self, path: &Path) {
        if !self.tracked.iter().any(|p| p == path) {
            self.tracked.push(path.to_path_buf());
        }
    }

    fn remove(path: &Path) {
        match std::fs::remove_file(path) {
            Ok(()) => log::debug!("Removed temp file {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove temp file {}: {}", path.display(), e),
        }
    }
}

impl Drop for TempMedia {
    fn drop(&mut self) {
        for path in &self.tracked {
            Self::remove(path);
        }

        let prefix = format!("{}.", self.stem);
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return;
        };
        for entry in entries.flatten() {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                Self::remove(&entry.path());
            }
        }
    }
}

/// Temp file stem unique to this attempt: `<video>_<format>_<nonce>`.
fn file_stem(video_id: i64, format_id: &str) -> String {
    let safe: String = format_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{}_{}_{:08x}", video_id, safe, rand::random::<u32>())
}

type PairKey = (i64, String);

pub struct DeliveryCache {
    pool: Arc<DbPool>,
    providers: Arc<ProviderRegistry>,
    platform: Arc<dyn ChatPlatform>,
    transcoder: Arc<dyn Transcoder>,
    config: DeliveryConfig,
    in_flight: DashMap<PairKey, Arc<Mutex<()>>>,
}

impl DeliveryCache {
    pub fn new(
        pool: Arc<DbPool>,
        providers: Arc<ProviderRegistry>,
        platform: Arc<dyn ChatPlatform>,
        config: DeliveryConfig,
    ) -> Self {
        Self {
            pool,
            providers,
            platform,
            transcoder: Arc::new(FfmpegTranscoder::new()),
            config,
            in_flight: DashMap::new(),
        }
    }

    #[must_use]
    pub fn with_transcoder(mut self, transcoder: Arc<dyn Transcoder>) -> Self {
        self.transcoder = transcoder;
        self
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Sends the requested format to the chat, downloading it only if no usable
    /// handle is stored.
    pub async fn deliver(&self, request: DeliveryRequest) -> Result<DeliveryOutcome, DeliveryError> {
        let video = match registry::get_video(&self.pool, request.video_id) {
            Ok(video) => video,
            Err(RegistryError::NotFound(_)) => return Err(DeliveryError::NotFound(request.video_id)),
            Err(e) => return Err(e.into()),
        };
        let info = registry::get_format(&self.pool, video.id, &request.format_id)?.ok_or_else(|| {
            DeliveryError::FormatNotFound {
                video_id: video.id,
                format_id: request.format_id.clone(),
            }
        })?;

        let key: PairKey = (video.id, info.format_id.clone());
        let slot = self.in_flight.entry(key.clone()).or_default().clone();
        let result = {
            let _guard = slot.lock().await;
            self.deliver_locked(&video, info.id, request.chat_id).await
        };
        drop(slot);
        self.in_flight.remove_if(&key, |_, m| Arc::strong_count(m) == 1);

        match &result {
            Ok(outcome) => log::info!(
                "Delivered video {} format {} to chat {} ({:?})",
                video.id,
                info.format_id,
                request.chat_id,
                outcome.path
            ),
            Err(e) => log::warn!(
                "Delivery of video {} format {} to chat {} failed [{}]: {}",
                video.id,
                info.format_id,
                request.chat_id,
                e.subcategory(),
                e
            ),
        }
        result
    }

    async fn deliver_locked(&self, video: &Video, info_id: i64, chat_id: i64) -> Result<DeliveryOutcome, DeliveryError> {
        // Re-read: a caller that held the slot before us may have materialized it.
        let info = registry::get_format_by_id(&self.pool, info_id)?.ok_or_else(|| DeliveryError::FormatNotFound {
            video_id: video.id,
            format_id: info_id.to_string(),
        })?;
        let snapshot = MediaSnapshot::new(video, &info);
        let caption = media_caption(&snapshot);

        let mut stale_handle = false;
        if info.materialized {
            match registry::find_file(&self.pool, info.id)? {
                Some(file) => match self
                    .platform
                    .send_existing(chat_id, &file.handle, info.kind, &caption)
                    .await
                {
                    Ok(()) => {
                        return Ok(DeliveryOutcome {
                            handle: file.handle,
                            snapshot,
                            path: DeliveryPath::Replayed,
                        })
                    }
                    Err(PlatformError::InvalidHandle(reason)) => {
                        log::warn!("Stored handle for format {} rejected ({}), downloading again", info.id, reason);
                        stale_handle = true;
                    }
                    Err(e) => return Err(e.into()),
                },
                None => log::warn!("Format {} is flagged materialized but has no file, downloading again", info.id),
            }
        }

        let handle = self.materialize_and_upload(video, &info, chat_id, &caption).await?;

        if stale_handle {
            registry::replace_file_handle(&self.pool, info.id, &handle)?;
            Ok(DeliveryOutcome {
                handle,
                snapshot,
                path: DeliveryPath::Reuploaded,
            })
        } else {
            let file = registry::record_file(&self.pool, video.id, info.id, &handle)?;
            Ok(DeliveryOutcome {
                handle: file.handle,
                snapshot,
                path: DeliveryPath::Uploaded,
            })
        }
    }

    async fn materialize_and_upload(
        &self,
        video: &Video,
        info: &Info,
        chat_id: i64,
        caption: &str,
    ) -> Result<String, DeliveryError> {
        let gate = self
            .providers
            .get(video.provider)
            .ok_or_else(|| DeliveryError::Provider(format!("no provider registered for {}", video.provider)))?;

        tokio::fs::create_dir_all(&self.config.temp_dir).await?;
        let mut temp = TempMedia::new(&self.config.temp_dir, file_stem(video.id, &info.format_id));

        let request = MaterializeRequest {
            url: video.url.clone(),
            provider_video_id: video.provider_video_id.clone(),
            format_id: info.format_id.clone(),
            kind: info.kind,
            output_dir: self.config.temp_dir.clone(),
            file_stem: temp.stem().to_string(),
        };
        let media = gate.materialize(&request).await?;
        temp.track(&media.path);

        let mut path = media.path;
        if info.kind.is_audio() && needs_normalization(&path) {
            let target = path.with_extension("m4a");
            temp.track(&target);
            self.transcoder
                .to_m4a(&path, &target)
                .await
                .map_err(DeliveryError::Transcode)?;
            TempMedia::remove(&path);
            path = target;
        }

        let size = tokio::fs::metadata(&path).await?.len();
        if size > self.config.max_upload_bytes {
            return Err(DeliveryError::TooLarge {
                size,
                limit: self.config.max_upload_bytes,
            });
        }

        log::info!("Uploading {} ({} bytes) to chat {}", path.display(), size, chat_id);
        let handle = self.platform.upload(chat_id, &path, info.kind, caption).await?;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_media_removes_stem_files_and_tracked() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let stem_file = dir.path().join("7_140_0000abcd.webm");
        let part_file = dir.path().join("7_140_0000abcd.webm.part");
        let unrelated = dir.path().join("8_140_00000000.webm");
        let tracked = outside.path().join("elsewhere.m4a");
        for p in [&stem_file, &part_file, &unrelated, &tracked] {
            std::fs::write(p, b"x").unwrap();
        }

        {
            let mut temp = TempMedia::new(dir.path(), "7_140_0000abcd");
            temp.track(&tracked);
        }

        assert!(!stem_file.exists());
        assert!(!part_file.exists());
        assert!(!tracked.exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_file_stem_is_filesystem_safe() {
        let stem = file_stem(12, "hls-720/p:1");
        assert!(stem.starts_with("12_hls-720_p_1_"));
        assert_eq!(stem.len(), "12_hls-720_p_1_".len() + 8);
    }
}
