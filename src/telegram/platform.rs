//! Chat platform boundary used by the delivery cache.
//!
//! A handle is the platform's opaque id for an uploaded file (a Telegram `file_id`);
//! replaying it sends the same bytes without another transfer.

use async_trait::async_trait;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile};
use teloxide::RequestError;
use thiserror::Error;

use crate::core::types::FormatKind;

#[derive(Debug, Error)]
pub enum PlatformError {
    /// The platform no longer accepts a stored handle
    #[error("stored file handle rejected: {0}")]
    InvalidHandle(String),

    #[error("request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Uploads a local file to the chat and returns its handle.
    async fn upload(&self, chat_id: i64, path: &Path, kind: FormatKind, caption: &str) -> Result<String, PlatformError>;

    /// Sends a previously uploaded file by handle.
    async fn send_existing(&self, chat_id: i64, handle: &str, kind: FormatKind, caption: &str)
        -> Result<(), PlatformError>;
}

/// [`ChatPlatform`] over the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramPlatform {
    bot: Bot,
}

impl TelegramPlatform {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn send(&self, chat_id: i64, file: InputFile, kind: FormatKind, caption: &str) -> Result<Message, RequestError> {
        match kind {
            FormatKind::Audio => self.bot.send_audio(ChatId(chat_id), file).caption(caption).await,
            FormatKind::Video => {
                self.bot
                    .send_video(ChatId(chat_id), file)
                    .caption(caption)
                    .supports_streaming(true)
                    .await
            }
        }
    }
}

/// Whether a Bot API error means the file id itself is unusable.
pub fn is_invalid_handle_error(err: &RequestError) -> bool {
    match err {
        RequestError::Api(api) => {
            let text = api.to_string().to_lowercase();
            text.contains("wrong file") || text.contains("file identifier") || text.contains("wrong remote file")
        }
        _ => false,
    }
}

/// File id of the media carried by a sent message.
pub fn extract_handle(msg: &Message) -> Option<String> {
    msg.audio()
        .map(|a| a.file.id.0.clone())
        .or_else(|| msg.video().map(|v| v.file.id.0.clone()))
        .or_else(|| msg.document().map(|d| d.file.id.0.clone()))
}

#[async_trait]
impl ChatPlatform for TelegramPlatform {
    async fn upload(&self, chat_id: i64, path: &Path, kind: FormatKind, caption: &str) -> Result<String, PlatformError> {
        let msg = self
            .send(chat_id, InputFile::file(path.to_path_buf()), kind, caption)
            .await
            .map_err(|e| PlatformError::Request(e.to_string()))?;

        extract_handle(&msg).ok_or_else(|| PlatformError::Request("sent message carries no file".to_string()))
    }

    async fn send_existing(
        &self,
        chat_id: i64,
        handle: &str,
        kind: FormatKind,
        caption: &str,
    ) -> Result<(), PlatformError> {
        match self
            .send(chat_id, InputFile::file_id(FileId(handle.to_string())), kind, caption)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_invalid_handle_error(&e) => Err(PlatformError::InvalidHandle(e.to_string())),
            Err(e) => Err(PlatformError::Request(e.to_string())),
        }
    }
}
