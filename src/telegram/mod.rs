//! Telegram bot integration and handlers

pub mod bot;
pub mod caption;
pub mod handlers;
pub mod keyboard;
pub mod platform;
pub mod session;

pub use teloxide::Bot;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use platform::{ChatPlatform, PlatformError, TelegramPlatform};
pub use session::{ChoiceTable, FormatChoice, InMemorySessionStore, SessionStore};
