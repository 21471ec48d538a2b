use thiserror::Error;

use crate::core::utils::format_size_limit;

use crate::download::provider::ProviderError;
use crate::storage::registry::RegistryError;
use crate::telegram::platform::PlatformError;

/// Structured error type for ingest and delivery.
///
/// The presentation layer turns it into chat text via [`DeliveryError::user_message`];
/// logs use [`DeliveryError::subcategory`].
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Video id unknown to the registry
    #[error("video {0} not found")]
    NotFound(i64),

    /// Format id unknown for an existing video
    #[error("format {format_id} not found for video {video_id}")]
    FormatNotFound { video_id: i64, format_id: String },

    /// Link not handled by any provider, or a playlist
    #[error("unsupported link: {0}")]
    UnsupportedUrl(String),

    /// Provider says the media is gone, private or geo-blocked
    #[error("media unavailable: {0}")]
    Unavailable(String),

    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("transcode failed: {0}")]
    Transcode(String),

    /// Provider kept failing with retryable errors
    #[error("provider temporarily failing: {0}")]
    TransientProvider(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("chat platform error: {0}")]
    Platform(String),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeliveryError {
    /// Returns subcategory for logs
    pub fn subcategory(&self) -> &'static str {
        match self {
            DeliveryError::NotFound(_) => "not_found",
            DeliveryError::FormatNotFound { .. } => "format_not_found",
            DeliveryError::UnsupportedUrl(_) => "unsupported_url",
            DeliveryError::Unavailable(_) => "unavailable",
            DeliveryError::TooLarge { .. } => "too_large",
            DeliveryError::Transcode(_) => "transcode",
            DeliveryError::TransientProvider(_) => "transient_provider",
            DeliveryError::Provider(_) => "provider",
            DeliveryError::Platform(_) => "platform",
            DeliveryError::Registry(_) => "registry",
            DeliveryError::Io(_) => "io",
        }
    }

    /// Text shown to the user in chat.
    pub fn user_message(&self) -> String {
        match self {
            DeliveryError::NotFound(_) | DeliveryError::FormatNotFound { .. } => {
                "⚠️ Этот вариант больше недоступен. Отправьте ссылку ещё раз.".to_string()
            }
            DeliveryError::UnsupportedUrl(msg) => format!("❌ {}", msg),
            DeliveryError::Unavailable(_) => "⚠️ Видео недоступно, удалено или заблокировано в вашем регионе.".to_string(),
            DeliveryError::TooLarge { limit, .. } => format!(
                "⚠️ Файл больше {}, Telegram не позволяет его отправить.",
                format_size_limit(*limit)
            ),
            DeliveryError::TransientProvider(_) => "⏳ Сервис видео сейчас не отвечает. Попробуйте чуть позже.".to_string(),
            DeliveryError::Transcode(_)
            | DeliveryError::Provider(_)
            | DeliveryError::Platform(_)
            | DeliveryError::Registry(_)
            | DeliveryError::Io(_) => "Что-то пошло не так, попробуйте позже...".to_string(),
        }
    }
}

impl From<ProviderError> for DeliveryError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable(msg) => DeliveryError::Unavailable(msg),
            ProviderError::Transient(msg) => DeliveryError::TransientProvider(msg),
            ProviderError::Failed(msg) => DeliveryError::Provider(msg),
        }
    }
}

impl From<PlatformError> for DeliveryError {
    fn from(err: PlatformError) -> Self {
        DeliveryError::Platform(err.to_string())
    }
}
