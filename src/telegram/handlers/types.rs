//! Handler types and dependencies

use std::sync::Arc;

use teloxide::types::{Message, UserId};

use crate::download::{DeliveryCache, ProviderRegistry};
use crate::storage::DbPool;
use crate::telegram::session::SessionStore;

/// Reply to any action while the user's delivery is still running
pub const BUSY_TEXT: &str = "⏳ Видео загружается, подождите немного...";

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
    pub providers: Arc<ProviderRegistry>,
    pub delivery: Arc<DeliveryCache>,
    pub sessions: Arc<dyn SessionStore>,
    pub bot_username: Option<String>,
    pub bot_id: UserId,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(
        db_pool: Arc<DbPool>,
        providers: Arc<ProviderRegistry>,
        delivery: Arc<DeliveryCache>,
        sessions: Arc<dyn SessionStore>,
        bot_username: Option<String>,
        bot_id: UserId,
    ) -> Self {
        Self {
            db_pool,
            providers,
            delivery,
            sessions,
            bot_username,
            bot_id,
        }
    }
}

/// Session key of the sender: the user id, or the chat id for channel posts.
pub fn sender_key(msg: &Message) -> i64 {
    msg.from
        .as_ref()
        .and_then(|u| i64::try_from(u.id.0).ok())
        .unwrap_or(msg.chat.id.0)
}
