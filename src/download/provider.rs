//! Media provider capability.
//!
//! A provider turns a URL into a canonical identity plus the list of renditions it
//! offers (`probe`), and downloads one rendition to a local file (`materialize`).

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

use crate::core::retry::Retryable;
use crate::core::types::{FormatDescriptor, FormatKind, ProviderKind};
use crate::storage::registry::{ChannelPatch, Info, Video};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Removed, private, geo-blocked or otherwise not downloadable
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Network trouble or timeout, worth another attempt
    #[error("transient: {0}")]
    Transient(String),

    #[error("failed: {0}")]
    Failed(String),
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }
}

/// Channel facts reported by a probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProbedChannel {
    pub channel_id: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub subscriber_count: Option<i64>,
    pub video_count: Option<i64>,
}

impl ProbedChannel {
    pub fn to_patch(&self) -> ChannelPatch {
        ChannelPatch {
            channel_id: self.channel_id.clone(),
            name: self.name.clone(),
            avatar: self.avatar.clone(),
            subscriber_count: self.subscriber_count,
            video_count: self.video_count,
        }
    }
}

/// Everything a probe learns about one URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub provider: ProviderKind,
    pub provider_video_id: String,
    /// Raw provider title, sanitized by the caller
    pub title: String,
    pub author: Option<String>,
    pub channel: ProbedChannel,
    pub duration_secs: Option<i64>,
    pub upload_date: Option<String>,
    pub thumbnail: Option<String>,
    pub formats: Vec<FormatDescriptor>,
}

/// Download order for one rendition.
#[derive(Debug, Clone)]
pub struct MaterializeRequest {
    pub url: String,
    pub provider_video_id: String,
    pub format_id: String,
    pub kind: FormatKind,
    /// Directory the file is written to
    pub output_dir: PathBuf,
    /// File name without extension; the provider picks the extension
    pub file_stem: String,
}

/// A downloaded file. The caller owns it and is responsible for deleting it.
#[derive(Debug, Clone)]
pub struct MaterializedMedia {
    pub path: PathBuf,
}

/// Metadata sent along with a delivered file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaSnapshot {
    pub title: String,
    pub author: Option<String>,
    pub duration_secs: Option<i64>,
    pub upload_date: Option<String>,
    pub resolution: Option<String>,
    pub approx_size: Option<String>,
}

impl MediaSnapshot {
    pub fn new(video: &Video, info: &Info) -> Self {
        Self {
            title: video.title.clone(),
            author: video.author.clone(),
            duration_secs: video.duration_secs,
            upload_date: video.upload_date.clone(),
            resolution: info.resolution.clone(),
            approx_size: info.approx_size.clone(),
        }
    }
}

/// Extraction backend for one video-sharing service.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether this provider handles the URL.
    fn supports_url(&self, url: &Url) -> bool;

    async fn probe(&self, url: &Url) -> Result<ProbeResult, ProviderError>;

    async fn materialize(&self, request: &MaterializeRequest) -> Result<MaterializedMedia, ProviderError>;
}
