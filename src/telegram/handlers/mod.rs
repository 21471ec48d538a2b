//! Telegram bot handler tree configuration
//!
//! This module provides the main dispatcher schema for the Telegram bot.
//! The handlers are organized in a testable way, allowing integration tests
//! to use the same handler tree as production code.

mod commands;
mod links;
mod schema;
mod selection;
mod types;

pub use schema::schema;
pub use selection::resolve_choice;
pub use types::{sender_key, HandlerDeps, HandlerError};
