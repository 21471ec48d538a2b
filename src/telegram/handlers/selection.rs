//! Format button presses: resolve the choice and run the delivery in the background.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ChatId, MessageId};

use super::types::{HandlerDeps, HandlerError, BUSY_TEXT};
use crate::core::utils::{exceeds_limit, format_size_limit};
use crate::download::DeliveryRequest;
use crate::storage::registry;
use crate::storage::DbPool;
use crate::telegram::keyboard::FormatCallback;
use crate::telegram::session::{ChoiceTable, SessionStore};
use crate::telegram::Bot;

const STARTED_TEXT: &str = "📥 Скачивание началось...";
const EXPIRED_TEXT: &str = "⚠️ Этот список форматов устарел. Отправьте ссылку ещё раз.";
const NEXT_LINK_TEXT: &str = "Жду следующую ссылку....";

/// Format id behind a pressed button.
///
/// Indexed buttons only resolve through the table rendered with them; direct
/// buttons fall back to the registry when the table is gone.
pub fn resolve_choice(pool: &DbPool, table: Option<&ChoiceTable>, callback: FormatCallback) -> Option<String> {
    let table = table.filter(|t| t.video_id == callback.video_id());
    match callback {
        FormatCallback::Index { index, .. } => table.and_then(|t| t.get(index)).map(|c| c.format_id.clone()),
        FormatCallback::Info { video_id, info_id } => match table.and_then(|t| t.find_info(info_id)) {
            Some(choice) => Some(choice.format_id.clone()),
            None => match registry::get_format_by_id(pool, info_id) {
                Ok(info) => info
                    .filter(|info| info.video_id == video_id)
                    .map(|info| info.format_id),
                Err(e) => {
                    log::error!("Failed to look up format {} of video {}: {}", info_id, video_id, e);
                    None
                }
            },
        },
    }
}

/// Alert text when the format's advertised size is already over `limit`.
///
/// Sizes are estimates; the delivery re-checks the real file.
pub fn oversize_alert(pool: &DbPool, video_id: i64, format_id: &str, limit: u64) -> Option<String> {
    let info = match registry::get_format(pool, video_id, format_id) {
        Ok(info) => info?,
        Err(e) => {
            log::warn!("Size check skipped for format {} of video {}: {}", format_id, video_id, e);
            return None;
        }
    };
    exceeds_limit(info.approx_size.as_deref(), limit).then(|| {
        format!(
            "К сожалению телеграмм не позволяет скачивать файлы больше {}.",
            format_size_limit(limit)
        )
    })
}

/// Holds the user's busy flag for one delivery.
///
/// The flag is cleared by [`DownloadSlot::release`], or from `Drop` if the
/// delivery task unwinds first.
struct DownloadSlot {
    sessions: Arc<dyn SessionStore>,
    user: i64,
    released: bool,
}

impl DownloadSlot {
    fn new(sessions: Arc<dyn SessionStore>, user: i64) -> Self {
        Self {
            sessions,
            user,
            released: false,
        }
    }

    async fn release(mut self) {
        self.sessions.finish_download(self.user).await;
        self.released = true;
    }
}

impl Drop for DownloadSlot {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let sessions = self.sessions.clone();
        let user = self.user;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { sessions.finish_download(user).await });
            }
            Err(_) => log::error!("No runtime to clear the busy flag of user {}", user),
        }
    }
}

async fn answer_quietly(bot: &Bot, q: &CallbackQuery, alert: Option<String>) {
    let request = bot.answer_callback_query(q.id.clone());
    let result = match alert {
        Some(text) => request.text(text).show_alert(true).await,
        None => request.await,
    };
    if let Err(e) = result {
        log::debug!("answer_callback_query failed: {}", e);
    }
}

pub(super) async fn handle_format_callback(bot: Bot, q: CallbackQuery, deps: HandlerDeps) -> Result<(), HandlerError> {
    let Some(callback) = q.data.as_deref().and_then(FormatCallback::parse) else {
        return Ok(());
    };

    let user = i64::try_from(q.from.id.0).unwrap_or_default();
    let message = q.regular_message();
    let chat_id = message.map(|m| m.chat.id).unwrap_or(ChatId(user));

    if !deps.sessions.try_begin_download(user).await {
        answer_quietly(&bot, &q, None).await;
        bot.send_message(chat_id, BUSY_TEXT).await?;
        return Ok(());
    }
    let slot = DownloadSlot::new(deps.sessions.clone(), user);

    let table = deps.sessions.take_choices(user).await;
    let Some(format_id) = resolve_choice(&deps.db_pool, table.as_ref(), callback) else {
        slot.release().await;
        answer_quietly(&bot, &q, None).await;
        bot.send_message(chat_id, EXPIRED_TEXT).await?;
        return Ok(());
    };

    // Nothing is downloaded for a format known to be over the ceiling; the
    // keyboard stays usable for the other formats
    let limit = deps.delivery.config().max_upload_bytes;
    if let Some(alert) = oversize_alert(&deps.db_pool, callback.video_id(), &format_id, limit) {
        log::info!(
            "User {} picked oversized format {} of video {}",
            user,
            format_id,
            callback.video_id()
        );
        if let Some(table) = table {
            deps.sessions.set_choices(user, table).await;
        }
        slot.release().await;
        answer_quietly(&bot, &q, Some(alert)).await;
        return Ok(());
    }
    answer_quietly(&bot, &q, None).await;

    if let Some(message) = message {
        deps.sessions.take_keyboard_message(user).await;
        let edited = if message.photo().is_some() {
            bot.edit_message_caption(chat_id, message.id)
                .caption(STARTED_TEXT)
                .await
                .map(|_| ())
        } else {
            bot.edit_message_text(chat_id, message.id, STARTED_TEXT).await.map(|_| ())
        };
        if let Err(e) = edited {
            log::debug!("Could not edit keyboard message {}: {}", message.id.0, e);
        }
    }

    log::info!(
        "User {} selected format {} of video {}",
        user,
        format_id,
        callback.video_id()
    );

    let request = DeliveryRequest {
        video_id: callback.video_id(),
        format_id,
        chat_id: chat_id.0,
    };
    let delivery = deps.delivery.clone();
    let status_message = message.map(|m| m.id);
    tokio::spawn(async move {
        let result = delivery.deliver(request).await;
        slot.release().await;

        match result {
            Ok(_) => {
                if let Some(id) = status_message {
                    delete_quietly(&bot, chat_id, id).await;
                }
                if let Err(e) = bot.send_message(chat_id, NEXT_LINK_TEXT).await {
                    log::error!("Failed to send follow-up to chat {}: {}", chat_id, e);
                }
            }
            Err(e) => {
                if let Err(send_err) = bot.send_message(chat_id, e.user_message()).await {
                    log::error!("Failed to report delivery error to chat {}: {}", chat_id, send_err);
                }
            }
        }
    });
    Ok(())
}

async fn delete_quietly(bot: &Bot, chat_id: ChatId, message_id: MessageId) {
    if let Err(e) = bot.delete_message(chat_id, message_id).await {
        log::debug!("Could not delete message {} in chat {}: {}", message_id.0, chat_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{FormatDescriptor, FormatKind, ProviderKind};
    use crate::storage::create_pool;
    use crate::storage::registry::{ChannelPatch, Info, NewVideo};
    use crate::telegram::session::InMemorySessionStore;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn seeded_pool() -> (tempfile::TempDir, DbPool, Vec<Info>) {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_pool(dir.path().join("t.sqlite").to_str().unwrap()).unwrap();
        registry::create_or_update_channel(&pool, ChannelPatch::new("c1")).unwrap();
        let (video, _) = registry::resolve_or_create_video(
            &pool,
            NewVideo {
                provider: ProviderKind::Vk,
                provider_video_id: "-1_2".to_string(),
                title: "clip".to_string(),
                author: None,
                url: "https://vk.com/video-1_2".to_string(),
                channel_id: "c1".to_string(),
                duration_secs: None,
                upload_date: None,
                thumbnail: None,
            },
        )
        .unwrap();
        registry::register_formats(
            &pool,
            video.id,
            &[
                FormatDescriptor::audio("audio_128", Some("3.20 MB".to_string())),
                FormatDescriptor::video("hls-720", Some("1280x720".to_string()), Some("2100.00 MB".to_string())),
            ],
        )
        .unwrap();
        let infos = registry::list_formats(&pool, video.id).unwrap();
        (dir, pool, infos)
    }

    #[test]
    fn test_index_needs_table() {
        let (_dir, pool, infos) = seeded_pool();
        let video_id = infos[0].video_id;
        let table = ChoiceTable::new(video_id, &infos);
        let cb = FormatCallback::Index { video_id, index: 2 };

        assert_eq!(resolve_choice(&pool, Some(&table), cb).as_deref(), Some("hls-720"));
        assert_eq!(resolve_choice(&pool, None, cb), None);
    }

    #[test]
    fn test_info_falls_back_to_registry() {
        let (_dir, pool, infos) = seeded_pool();
        let audio = infos.iter().find(|i| i.kind == FormatKind::Audio).unwrap();
        let cb = FormatCallback::Info {
            video_id: audio.video_id,
            info_id: audio.id,
        };
        assert_eq!(resolve_choice(&pool, None, cb).as_deref(), Some("audio_128"));

        let wrong_video = FormatCallback::Info {
            video_id: audio.video_id + 1,
            info_id: audio.id,
        };
        assert_eq!(resolve_choice(&pool, None, wrong_video), None);
    }

    #[test]
    fn test_registry_error_resolves_to_nothing() {
        let (_dir, pool, infos) = seeded_pool();
        let cb = FormatCallback::Info {
            video_id: infos[0].video_id,
            info_id: infos[0].id,
        };
        crate::storage::get_connection(&pool)
            .unwrap()
            .execute_batch("DROP TABLE files; DROP TABLE infos;")
            .unwrap();

        assert_eq!(resolve_choice(&pool, None, cb), None);
        assert_eq!(oversize_alert(&pool, infos[0].video_id, "hls-720", 1), None);
    }

    #[test]
    fn test_table_of_other_video_is_ignored() {
        let (_dir, pool, infos) = seeded_pool();
        let table = ChoiceTable::new(999, &infos);
        let cb = FormatCallback::Index {
            video_id: infos[0].video_id,
            index: 1,
        };
        assert_eq!(resolve_choice(&pool, Some(&table), cb), None);
    }

    #[test]
    fn test_oversize_alert_uses_advertised_size() {
        let (_dir, pool, infos) = seeded_pool();
        let video_id = infos[0].video_id;
        let two_gb: u64 = 2 << 30;

        let alert = oversize_alert(&pool, video_id, "hls-720", two_gb).unwrap();
        assert!(alert.contains("больше 2 ГБ"));
        assert_eq!(oversize_alert(&pool, video_id, "audio_128", two_gb), None);
        assert_eq!(oversize_alert(&pool, video_id, "missing", two_gb), None);

        let alert = oversize_alert(&pool, video_id, "audio_128", 1 << 20).unwrap();
        assert!(alert.contains("больше 1 МБ"));
    }

    #[tokio::test]
    async fn test_slot_release_clears_flag() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        assert!(store.try_begin_download(8).await);

        DownloadSlot::new(store.clone(), 8).release().await;
        assert!(!store.is_downloading(8).await);
    }

    #[tokio::test]
    async fn test_slot_cleared_when_delivery_task_panics() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        assert!(store.try_begin_download(8).await);

        let slot = DownloadSlot::new(store.clone(), 8);
        let joined = tokio::spawn(async move {
            let _slot = slot;
            panic!("delivery task failed");
        })
        .await;
        assert!(joined.unwrap_err().is_panic());

        for _ in 0..50 {
            if !store.is_downloading(8).await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!store.is_downloading(8).await);
        assert!(store.try_begin_download(8).await);
    }
}
