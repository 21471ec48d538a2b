//! Stub providers, platform and transcoder with call counters.
//!
//! They stand in for yt-dlp, ffmpeg and the Bot API so delivery behavior can be
//! checked without network or external binaries.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

use vidrelay::core::types::{FormatDescriptor, FormatKind, ProviderKind};
use vidrelay::download::provider::{
    MaterializeRequest, MaterializedMedia, MediaProvider, ProbeResult, ProbedChannel, ProviderError,
};
use vidrelay::download::source::provider_for_url;
use vidrelay::download::transcode::Transcoder;
use vidrelay::telegram::platform::{ChatPlatform, PlatformError};

/// Configuration for [`StubProvider`]
#[derive(Debug, Clone)]
pub struct StubProviderConfig {
    pub kind: ProviderKind,
    pub formats: Vec<FormatDescriptor>,
    /// Bytes written per materialized file
    pub file_size: usize,
    /// Extension of the written file
    pub extension: &'static str,
    /// Simulated download time
    pub delay: Duration,
    /// Every call fails as unavailable
    pub unavailable: bool,
    /// Channel avatar reported by the probe
    pub avatar: Option<String>,
}

impl StubProviderConfig {
    pub fn new(kind: ProviderKind, formats: Vec<FormatDescriptor>) -> Self {
        Self {
            kind,
            formats,
            file_size: 1024,
            extension: "mp4",
            delay: Duration::ZERO,
            unavailable: false,
            avatar: None,
        }
    }

    pub fn with_file_size(mut self, size: usize) -> Self {
        self.file_size = size;
        self
    }

    pub fn with_extension(mut self, extension: &'static str) -> Self {
        self.extension = extension;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_avatar(mut self, avatar: &str) -> Self {
        self.avatar = Some(avatar.to_string());
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }
}

pub struct StubProvider {
    config: StubProviderConfig,
    pub probe_calls: AtomicUsize,
    pub materialize_calls: AtomicUsize,
}

impl StubProvider {
    pub fn new(config: StubProviderConfig) -> Self {
        Self {
            config,
            probe_calls: AtomicUsize::new(0),
            materialize_calls: AtomicUsize::new(0),
        }
    }

    pub fn probes(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn materializations(&self) -> usize {
        self.materialize_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaProvider for StubProvider {
    fn kind(&self) -> ProviderKind {
        self.config.kind
    }

    fn supports_url(&self, url: &Url) -> bool {
        provider_for_url(url.as_str()) == Some(self.config.kind)
    }

    async fn probe(&self, url: &Url) -> Result<ProbeResult, ProviderError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.config.unavailable {
            return Err(ProviderError::Unavailable("private video".to_string()));
        }

        let id = url.path().trim_matches('/').replace('/', "_");
        Ok(ProbeResult {
            provider: self.config.kind,
            provider_video_id: id.clone(),
            title: format!("Clip {} https://spam.example.com @someone", id),
            author: Some("Stub Author".to_string()),
            channel: ProbedChannel {
                channel_id: "stub-channel".to_string(),
                name: Some("Stub Channel".to_string()),
                subscriber_count: Some(1_500),
                avatar: self.config.avatar.clone(),
                ..Default::default()
            },
            duration_secs: Some(95),
            upload_date: Some("20240315".to_string()),
            thumbnail: Some(format!("https://img.example.com/{}.jpg", id)),
            formats: self.config.formats.clone(),
        })
    }

    async fn materialize(&self, request: &MaterializeRequest) -> Result<MaterializedMedia, ProviderError> {
        self.materialize_calls.fetch_add(1, Ordering::SeqCst);
        if !self.config.delay.is_zero() {
            tokio::time::sleep(self.config.delay).await;
        }
        if self.config.unavailable {
            return Err(ProviderError::Unavailable("private video".to_string()));
        }

        let path = request
            .output_dir
            .join(format!("{}.{}", request.file_stem, self.config.extension));
        tokio::fs::write(&path, vec![0u8; self.config.file_size])
            .await
            .map_err(|e| ProviderError::Failed(e.to_string()))?;
        Ok(MaterializedMedia { path })
    }
}

/// One file sent to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMedia {
    pub chat_id: i64,
    pub handle: String,
    pub kind: FormatKind,
    pub caption: String,
    pub replayed: bool,
}

#[derive(Default)]
pub struct StubPlatform {
    uploads: AtomicUsize,
    replays: AtomicUsize,
    invalid: Mutex<HashSet<String>>,
    sent: Mutex<Vec<SentMedia>>,
}

impl StubPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn replays(&self) -> usize {
        self.replays.load(Ordering::SeqCst)
    }

    /// Makes the platform reject `handle` from now on.
    pub fn invalidate(&self, handle: &str) {
        self.invalid.lock().unwrap().insert(handle.to_string());
    }

    pub fn sent(&self) -> Vec<SentMedia> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for StubPlatform {
    async fn upload(&self, chat_id: i64, path: &Path, kind: FormatKind, caption: &str) -> Result<String, PlatformError> {
        if !path.exists() {
            return Err(PlatformError::Request(format!("{} does not exist", path.display())));
        }
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = format!("handle-{}", n);
        self.sent.lock().unwrap().push(SentMedia {
            chat_id,
            handle: handle.clone(),
            kind,
            caption: caption.to_string(),
            replayed: false,
        });
        Ok(handle)
    }

    async fn send_existing(&self, chat_id: i64, handle: &str, kind: FormatKind, caption: &str) -> Result<(), PlatformError> {
        if self.invalid.lock().unwrap().contains(handle) {
            return Err(PlatformError::InvalidHandle(format!("wrong file identifier {}", handle)));
        }
        self.replays.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(SentMedia {
            chat_id,
            handle: handle.to_string(),
            kind,
            caption: caption.to_string(),
            replayed: true,
        });
        Ok(())
    }
}

/// Transcoder that copies the input, or fails when built with [`StubTranscoder::failing`].
pub struct StubTranscoder {
    fail: bool,
    pub calls: AtomicUsize,
}

impl StubTranscoder {
    pub fn copying() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Transcoder for StubTranscoder {
    async fn to_m4a(&self, input: &Path, output: &Path) -> Result<(), String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            // Leave a half-written output behind, as a crashed ffmpeg would
            std::fs::write(output, b"partial").map_err(|e| e.to_string())?;
            return Err("ffmpeg exited with 1".to_string());
        }
        std::fs::copy(input, output).map(|_| ()).map_err(|e| e.to_string())
    }
}
