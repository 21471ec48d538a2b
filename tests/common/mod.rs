//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use vidrelay::core::retry::RetryConfig;
use vidrelay::core::types::{FormatDescriptor, ProviderKind};
use vidrelay::download::{GateConfig, MediaProvider, ProviderRegistry};
use vidrelay::storage::registry::{self, ChannelPatch, Info, NewVideo, Video};
use vidrelay::{create_pool, DbPool};

/// A database and temp directory that live as long as the test.
pub struct TestEnvironment {
    _dir: TempDir,
    pub pool: Arc<DbPool>,
    pub temp_dir: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("vidrelay.sqlite");
        let pool = create_pool(db_path.to_str().expect("utf-8 path")).expect("pool");
        let temp_dir = dir.path().join("media");
        std::fs::create_dir_all(&temp_dir).expect("media dir");
        Self {
            _dir: dir,
            pool: Arc::new(pool),
            temp_dir,
        }
    }

    /// Files currently left in the media temp directory.
    pub fn temp_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.temp_dir)
            .map(|entries| entries.flatten().map(|e| e.path()).collect())
            .unwrap_or_default()
    }

    /// Registers a video with the given formats, bypassing any provider.
    pub fn seed_video(&self, provider: ProviderKind, url: &str, formats: &[FormatDescriptor]) -> (Video, Vec<Info>) {
        registry::create_or_update_channel(&self.pool, ChannelPatch::new("chan-1")).expect("channel");
        let (video, _) = registry::resolve_or_create_video(
            &self.pool,
            NewVideo {
                provider,
                provider_video_id: "vid-1".to_string(),
                title: "Test clip".to_string(),
                author: Some("Tester".to_string()),
                url: url.to_string(),
                channel_id: "chan-1".to_string(),
                duration_secs: Some(61),
                upload_date: Some("20240102".to_string()),
                thumbnail: None,
            },
        )
        .expect("video");
        registry::register_formats(&self.pool, video.id, formats).expect("formats");
        let infos = registry::list_formats(&self.pool, video.id).expect("list");
        (video, infos)
    }
}

/// Gate limits for tests: no retries, short timeouts.
pub fn test_gate_config() -> GateConfig {
    GateConfig {
        concurrency: 4,
        probe_timeout: Duration::from_secs(5),
        download_timeout: Duration::from_secs(5),
        retry: RetryConfig::new().max_retries(0),
    }
}

pub fn registry_with(provider: Arc<dyn MediaProvider>) -> Arc<ProviderRegistry> {
    let mut providers = ProviderRegistry::new();
    providers.register(provider, test_gate_config());
    Arc::new(providers)
}

pub fn youtube_formats() -> Vec<FormatDescriptor> {
    vec![
        FormatDescriptor::video("137", Some("1920x1080".to_string()), Some("80.00 MB".to_string())),
        FormatDescriptor::audio("140", Some("3.20 MB".to_string())),
        FormatDescriptor::video("18", Some("640x360".to_string()), Some("9.50 MB".to_string())),
    ]
}
