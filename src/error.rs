//! Error types shared across the bot

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, BotError>;

/// Errors surfaced by the trading bot
#[derive(Debug, Error)]
pub enum BotError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Trade not found: {0}")]
    TradeNotFound(i64),

    #[error("Trade {0} is not open")]
    TradeNotOpen(i64),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Invalid value: {0}")]
    Invalid(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
