//! vidrelay - Telegram bot delivering YouTube, TikTok and VK videos
//!
//! The core is a delivery cache keyed by (link -> video -> format): every
//! rendition is downloaded and uploaded at most once, later requests replay the
//! stored Telegram file handle.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, retry and shared types
//! - `storage`: SQLite pool, migrations and the identity & format registry
//! - `download`: providers, link ingest and the delivery cache
//! - `telegram`: bot setup, keyboards, sessions and handlers
//! - `cli`: command-line interface of the `vidrelay` binary

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod cli;
pub mod core;
pub mod download;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use download::{ingest, DeliveryCache, DeliveryConfig, DeliveryError, ProviderRegistry};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
pub use telegram::{schema, HandlerDeps};
