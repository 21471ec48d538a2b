use thiserror::Error;

use crate::download::error::DeliveryError;
use crate::download::provider::ProviderError;

/// Errors surfacing at the application boundary (CLI commands).
///
/// Layer errors convert into this enum; `main` wraps it in `anyhow`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type AppResult<T> = Result<T, AppError>;
