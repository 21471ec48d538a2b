//! Core utilities, configuration, and common functionality

pub mod config;
pub mod error;
pub mod logging;
pub mod process;
pub mod retry;
pub mod types;
pub mod utils;

pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_startup_configuration};
