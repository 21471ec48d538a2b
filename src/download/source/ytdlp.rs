//! yt-dlp backed provider for YouTube, TikTok and VK Video.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use url::Url;

use crate::core::config;
use crate::core::process::{run_with_timeout, ProcessError};
use crate::core::types::{FormatKind, ProviderKind};
use crate::download::provider::{
    MaterializeRequest, MaterializedMedia, MediaProvider, ProbeResult, ProbedChannel, ProviderError,
};
use crate::download::source::formats::{is_playlist_url, provider_for_url, select_formats, YtDlpInfo};
use crate::download::ytdlp_errors::to_provider_error;

pub struct YtDlpProvider {
    kind: ProviderKind,
    bin: String,
    cookies_file: Option<String>,
}

impl YtDlpProvider {
    pub fn new(kind: ProviderKind) -> Self {
        let cookies_file = match kind {
            ProviderKind::YouTube => config::YTDL_COOKIES_FILE
                .as_deref()
                .map(|c| shellexpand::tilde(c).to_string()),
            _ => None,
        };
        Self {
            kind,
            bin: config::YTDL_BIN.clone(),
            cookies_file,
        }
    }

    fn base_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["--no-playlist", "--no-warnings", "--socket-timeout", "60", "--retries", "3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if let Some(cookies) = &self.cookies_file {
            args.push("--cookies".to_string());
            args.push(cookies.clone());
        }
        args
    }

    /// `-f` selector for a rendition. YouTube serves video-only streams, so the
    /// best audio is merged in.
    fn format_selector(&self, format_id: &str, kind: FormatKind) -> String {
        match (self.kind, kind) {
            (ProviderKind::YouTube, FormatKind::Video) => format!("{}+bestaudio/best", format_id),
            _ => format_id.to_string(),
        }
    }

    async fn run(&self, args: Vec<String>, timeout: std::time::Duration) -> Result<Vec<u8>, ProviderError> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(&args);

        let output = run_with_timeout(&mut cmd, timeout).await.map_err(|e| match e {
            ProcessError::Timeout(_) => ProviderError::Transient(e.to_string()),
            ProcessError::Io(_) => ProviderError::Failed(format!("{} could not be started: {}", self.bin, e)),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::warn!("{} yt-dlp exited with {}: {}", self.kind, output.status, stderr.trim());
            return Err(to_provider_error(&stderr));
        }
        Ok(output.stdout)
    }
}

/// File written by yt-dlp for `stem`, whatever extension it picked.
async fn find_output(dir: &Path, stem: &str) -> std::io::Result<Option<PathBuf>> {
    let prefix = format!("{}.", stem);
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && !name.ends_with(".part") && !name.ends_with(".ytdl") {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

fn probe_result(kind: ProviderKind, info: YtDlpInfo) -> ProbeResult {
    let formats = select_formats(kind, &info);
    let channel_id = info
        .channel_id
        .clone()
        .or_else(|| info.uploader_id.clone())
        .unwrap_or_else(|| format!("{}:{}", kind, info.uploader.as_deref().unwrap_or(&info.id)));

    ProbeResult {
        provider: kind,
        provider_video_id: info.id,
        title: info.title.unwrap_or_else(|| "Без названия".to_string()),
        author: info.uploader.clone().or_else(|| info.channel.clone()),
        channel: ProbedChannel {
            channel_id,
            name: info.channel.or(info.uploader),
            avatar: None,
            subscriber_count: info.channel_follower_count,
            video_count: None,
        },
        duration_secs: info.duration.map(|d| d.round() as i64),
        upload_date: info.upload_date,
        thumbnail: info.thumbnail,
        formats,
    }
}

#[async_trait]
impl MediaProvider for YtDlpProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn supports_url(&self, url: &Url) -> bool {
        provider_for_url(url.as_str()) == Some(self.kind)
    }

    async fn probe(&self, url: &Url) -> Result<ProbeResult, ProviderError> {
        if is_playlist_url(url) {
            return Err(ProviderError::Failed("playlist links are not supported".to_string()));
        }

        let mut args = self.base_args();
        args.push("-J".to_string());
        args.push(url.to_string());

        let stdout = self.run(args, config::provider::probe_timeout()).await?;
        let info: YtDlpInfo = serde_json::from_slice(&stdout)
            .map_err(|e| ProviderError::Failed(format!("unreadable yt-dlp JSON: {}", e)))?;

        let result = probe_result(self.kind, info);
        if result.formats.is_empty() {
            return Err(ProviderError::Unavailable("no downloadable formats".to_string()));
        }
        log::info!(
            "Probed {} {}: {} formats",
            self.kind,
            result.provider_video_id,
            result.formats.len()
        );
        Ok(result)
    }

    async fn materialize(&self, request: &MaterializeRequest) -> Result<MaterializedMedia, ProviderError> {
        let template = request.output_dir.join(format!("{}.%(ext)s", request.file_stem));

        let mut args = self.base_args();
        args.push("-f".to_string());
        args.push(self.format_selector(&request.format_id, request.kind));
        if self.kind == ProviderKind::YouTube && request.kind == FormatKind::Video {
            args.push("--merge-output-format".to_string());
            args.push("mp4".to_string());
        }
        args.push("-o".to_string());
        args.push(template.to_string_lossy().into_owned());
        args.push(request.url.clone());

        self.run(args, config::provider::download_timeout()).await?;

        let path = find_output(&request.output_dir, &request.file_stem)
            .await
            .map_err(|e| ProviderError::Failed(format!("cannot read {}: {}", request.output_dir.display(), e)))?
            .ok_or_else(|| ProviderError::Failed(format!("yt-dlp produced no file for {}", request.file_stem)))?;

        log::info!("Downloaded {} format {} to {}", self.kind, request.format_id, path.display());
        Ok(MaterializedMedia { path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_supports_url_by_kind() {
        let yt = YtDlpProvider::new(ProviderKind::YouTube);
        let vk = YtDlpProvider::new(ProviderKind::Vk);
        let url = Url::parse("https://youtu.be/abc").unwrap();
        assert!(yt.supports_url(&url));
        assert!(!vk.supports_url(&url));
    }

    #[test]
    fn test_format_selector_merges_youtube_audio() {
        let yt = YtDlpProvider::new(ProviderKind::YouTube);
        let tt = YtDlpProvider::new(ProviderKind::TikTok);
        assert_eq!(yt.format_selector("137", FormatKind::Video), "137+bestaudio/best");
        assert_eq!(yt.format_selector("140", FormatKind::Audio), "140");
        assert_eq!(tt.format_selector("h264_720p", FormatKind::Video), "h264_720p");
    }

    #[test]
    fn test_probe_result_falls_back_for_channel() {
        let info: YtDlpInfo = serde_json::from_str(
            r#"{"id": "7300", "title": "clip", "uploader": "dancer", "duration": 14.6,
                "formats": [{"format_id": "h264", "vcodec": "h264", "acodec": "aac", "width": 576, "height": 1024, "filesize": 1048576}]}"#,
        )
        .unwrap();
        let result = probe_result(ProviderKind::TikTok, info);

        assert_eq!(result.channel.channel_id, "tiktok:dancer");
        assert_eq!(result.author.as_deref(), Some("dancer"));
        assert_eq!(result.duration_secs, Some(15));
        assert_eq!(result.formats.len(), 1);
    }

    #[tokio::test]
    async fn test_find_output_ignores_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("42_137.mp4.part"), b"x").unwrap();
        assert!(find_output(dir.path(), "42_137").await.unwrap().is_none());

        std::fs::write(dir.path().join("42_137.mp4"), b"x").unwrap();
        let found = find_output(dir.path(), "42_137").await.unwrap().unwrap();
        assert_eq!(found, dir.path().join("42_137.mp4"));
    }

    #[tokio::test]
    async fn test_playlist_probe_rejected() {
        let yt = YtDlpProvider::new(ProviderKind::YouTube);
        let url = Url::parse("https://www.youtube.com/playlist?list=PL1").unwrap();
        assert!(matches!(yt.probe(&url).await, Err(ProviderError::Failed(_))));
    }
}
