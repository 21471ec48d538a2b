//! Link messages: ingest the URL and show the preview with the format keyboard.

use teloxide::prelude::*;
use teloxide::types::{ChatAction, FileId, InputFile, Message, MessageId};

use super::types::{sender_key, HandlerDeps, HandlerError, BUSY_TEXT};
use crate::download::ingest;
use crate::storage::registry;
use crate::telegram::caption::preview_caption;
use crate::telegram::keyboard;
use crate::telegram::session::SessionStore;
use crate::telegram::Bot;

fn thumbnail_input(thumbnail: &str) -> Option<InputFile> {
    if thumbnail.starts_with("http://") || thumbnail.starts_with("https://") {
        url::Url::parse(thumbnail).ok().map(InputFile::url)
    } else {
        Some(InputFile::file_id(FileId(thumbnail.to_string())))
    }
}

/// Reply that replaces ingest while the user still waits for a delivery.
///
/// A link in that state must leave the choice table and keyboard untouched.
async fn busy_reply(sessions: &dyn SessionStore, user: i64) -> Option<&'static str> {
    sessions.is_downloading(user).await.then_some(BUSY_TEXT)
}

pub(super) async fn handle_link_message(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let user = sender_key(msg);
    let chat_id = msg.chat.id;

    if let Some(reply) = busy_reply(deps.sessions.as_ref(), user).await {
        log::debug!("User {} sent a link during a delivery", user);
        bot.send_message(chat_id, reply).await?;
        return Ok(());
    }

    if let Some(previous) = deps.sessions.take_keyboard_message(user).await {
        if let Err(e) = bot.delete_message(chat_id, MessageId(previous)).await {
            log::debug!("Could not delete old keyboard {} in chat {}: {}", previous, chat_id, e);
        }
    }

    if let Err(e) = bot.send_chat_action(chat_id, ChatAction::Typing).await {
        log::debug!("send_chat_action failed in chat {}: {}", chat_id, e);
    }

    let outcome = match ingest(&deps.db_pool, &deps.providers, text).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::warn!("Ingest failed for chat {} [{}]: {}", chat_id, e.subcategory(), e);
            bot.send_message(chat_id, e.user_message()).await?;
            return Ok(());
        }
    };

    let video = &outcome.video;
    let caption = preview_caption(video, outcome.channel.as_ref());
    let (markup, choices) = keyboard::render(video.provider, video.id, &outcome.formats);

    let photo = video.thumbnail.as_deref().and_then(thumbnail_input);
    let sent = match photo {
        Some(photo) => match bot
            .send_photo(chat_id, photo)
            .caption(caption.clone())
            .reply_markup(markup.clone())
            .await
        {
            Ok(sent) => sent,
            Err(e) => {
                log::warn!("Preview photo for video {} failed, sending text: {}", video.id, e);
                bot.send_message(chat_id, caption).reply_markup(markup).await?
            }
        },
        None => bot.send_message(chat_id, caption).reply_markup(markup).await?,
    };

    // The first preview turns the remote thumbnail into a reusable photo handle
    let remote_thumbnail = video
        .thumbnail
        .as_deref()
        .is_some_and(|t| t.starts_with("http://") || t.starts_with("https://"));
    if remote_thumbnail {
        if let Some(largest) = sent.photo().and_then(|sizes| sizes.last()) {
            if let Err(e) = registry::set_thumbnail(&deps.db_pool, video.id, &largest.file.id.0) {
                log::warn!("Failed to store thumbnail handle for video {}: {}", video.id, e);
            }
        }
    }

    deps.sessions.set_keyboard_message(user, sent.id.0).await;
    deps.sessions.set_choices(user, choices).await;
    log::info!(
        "Shown {} formats of video {} to {} (new: {})",
        outcome.formats.len(),
        video.id,
        user,
        outcome.is_new
    );
    Ok(())
}
