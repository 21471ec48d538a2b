//! Audio normalization: webm/opus streams are re-encoded to m4a before upload,
//! since Telegram only plays m4a/mp3 audio inline.

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

use crate::core::config;
use crate::core::process::{run_with_timeout, FFMPEG_TIMEOUT};

/// Whether an audio file must be converted before it can be sent as audio.
pub fn needs_normalization(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("webm"))
}

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Writes `output` as m4a audio. On error `output` may be left half written.
    async fn to_m4a(&self, input: &Path, output: &Path) -> Result<(), String>;
}

pub struct FfmpegTranscoder {
    bin: String,
}

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self {
            bin: config::FFMPEG_BIN.clone(),
        }
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn to_m4a(&self, input: &Path, output: &Path) -> Result<(), String> {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-vn", "-c:a", "aac", "-b:a", "192k"])
            .arg(output);

        let out = run_with_timeout(&mut cmd, FFMPEG_TIMEOUT)
            .await
            .map_err(|e| format!("{}: {}", self.bin, e))?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let last = stderr.lines().last().unwrap_or_default().trim().to_string();
            return Err(format!("{} exited with {}: {}", self.bin, out.status, last));
        }

        log::info!("Converted {} to {}", input.display(), output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_normalization() {
        assert!(needs_normalization(Path::new("/tmp/a.webm")));
        assert!(needs_normalization(Path::new("/tmp/a.WEBM")));
        assert!(!needs_normalization(Path::new("/tmp/a.m4a")));
        assert!(!needs_normalization(Path::new("/tmp/noext")));
    }
}
