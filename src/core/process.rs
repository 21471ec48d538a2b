//! Running external tools (yt-dlp, ffmpeg) with a deadline.

use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Default timeout for an ffmpeg remux
pub const FFMPEG_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn process: {0}")]
    Io(#[from] std::io::Error),

    #[error("process timed out after {0}s")]
    Timeout(u64),
}

/// Runs `cmd` to completion or kills it once `timeout` elapses.
pub async fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output, ProcessError> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(ProcessError::Io(e)),
        Err(_) => Err(ProcessError::Timeout(timeout.as_secs())),
    }
}
