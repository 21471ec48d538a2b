//! Command handler implementations (/start, /help)

use teloxide::prelude::*;
use teloxide::types::Message;
use teloxide::utils::command::BotCommands;

use super::types::HandlerError;
use crate::telegram::bot::{Command, START_TEXT};
use crate::telegram::Bot;

/// Handle /start command
pub(super) async fn handle_start_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    log::info!("/start from chat {}", msg.chat.id);
    bot.send_message(msg.chat.id, START_TEXT).await?;
    Ok(())
}

/// Handle /help command
pub(super) async fn handle_help_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    let text = format!("{}\n\n{}", START_TEXT, Command::descriptions());
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}
