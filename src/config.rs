//! Runtime configuration
//!
//! Loaded from an optional TOML file, overridden by `BNBOT__*` environment
//! variables. Vendor credentials also fall back to the conventional
//! environment variables (`BENZINGA_API_KEY`, `ALPACA_API_KEY`,
//! `ALPACA_SECRET_KEY`) so a bare `.env` is enough to run.

use crate::error::{BotError, Result};
use config::{Environment, File};
use serde::Deserialize;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub benzinga: BenzingaConfig,
    #[serde(default)]
    pub alpaca: AlpacaConfig,
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    /// Load configuration from a TOML file (optional) plus environment
    pub fn load(path: &str) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("BNBOT")
                    .separator("__")
                    .try_parsing(true),
            );

        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| BotError::Config(e.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the sqlite file; `~` is expanded
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/trades.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BenzingaConfig {
    #[serde(default = "default_benzinga_key")]
    pub api_key: String,
    #[serde(default = "default_benzinga_url")]
    pub base_url: String,
    /// Articles per request
    #[serde(default = "default_pagesize")]
    pub pagesize: usize,
}

fn default_benzinga_key() -> String {
    std::env::var("BENZINGA_API_KEY").unwrap_or_default()
}

fn default_benzinga_url() -> String {
    "https://api.benzinga.com".to_string()
}

fn default_pagesize() -> usize {
    50
}

impl Default for BenzingaConfig {
    fn default() -> Self {
        Self {
            api_key: default_benzinga_key(),
            base_url: default_benzinga_url(),
            pagesize: default_pagesize(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaConfig {
    #[serde(default = "default_alpaca_key")]
    pub api_key_id: String,
    #[serde(default = "default_alpaca_secret")]
    pub api_secret_key: String,
    #[serde(default = "default_data_url")]
    pub data_url: String,
    #[serde(default = "default_trading_url")]
    pub trading_url: String,
}

fn default_alpaca_key() -> String {
    std::env::var("ALPACA_API_KEY").unwrap_or_default()
}

fn default_alpaca_secret() -> String {
    std::env::var("ALPACA_SECRET_KEY").unwrap_or_default()
}

fn default_data_url() -> String {
    "https://data.alpaca.markets".to_string()
}

fn default_trading_url() -> String {
    "https://paper-api.alpaca.markets".to_string()
}

impl Default for AlpacaConfig {
    fn default() -> Self {
        Self {
            api_key_id: default_alpaca_key(),
            api_secret_key: default_alpaca_secret(),
            data_url: default_data_url(),
            trading_url: default_trading_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default = "default_true")]
    pub notify_entries: bool,
    #[serde(default = "default_true")]
    pub notify_skips: bool,
    #[serde(default = "default_true")]
    pub notify_exits: bool,
    #[serde(default = "default_true")]
    pub notify_errors: bool,
}

fn default_true() -> bool {
    true
}

/// Polling cadence and entry-rule parameters
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_interval")]
    pub news_interval_secs: u64,
    #[serde(default = "default_interval")]
    pub pipeline_interval_secs: u64,
    #[serde(default = "default_interval")]
    pub exit_interval_secs: u64,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    /// Bars fetched when evaluating an entry
    #[serde(default = "default_pipeline_bar_limit")]
    pub pipeline_bar_limit: usize,
    /// Bars fetched when polling an open position
    #[serde(default = "default_exit_bar_limit")]
    pub exit_bar_limit: usize,
    #[serde(default = "default_rvol_threshold")]
    pub rvol_threshold: f64,
    #[serde(default = "default_rvol_window")]
    pub rvol_window: usize,
    #[serde(default = "default_resistance_lookback")]
    pub resistance_lookback: usize,
    /// Unprocessed headlines considered per pipeline cycle
    #[serde(default = "default_news_batch")]
    pub news_batch: i64,
}

fn default_interval() -> u64 {
    10
}

fn default_timeframe() -> String {
    "5Min".to_string()
}

fn default_pipeline_bar_limit() -> usize {
    120
}

fn default_exit_bar_limit() -> usize {
    10
}

fn default_rvol_threshold() -> f64 {
    1.5
}

fn default_rvol_window() -> usize {
    30
}

fn default_resistance_lookback() -> usize {
    20
}

fn default_news_batch() -> i64 {
    50
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            news_interval_secs: default_interval(),
            pipeline_interval_secs: default_interval(),
            exit_interval_secs: default_interval(),
            timeframe: default_timeframe(),
            pipeline_bar_limit: default_pipeline_bar_limit(),
            exit_bar_limit: default_exit_bar_limit(),
            rvol_threshold: default_rvol_threshold(),
            rvol_window: default_rvol_window(),
            resistance_lookback: default_resistance_lookback(),
            news_batch: default_news_batch(),
        }
    }
}

/// Exchange session clock: the regular session closes at
/// `close_hour:close_minute` in `timezone`
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_close_hour")]
    pub close_hour: u32,
    #[serde(default = "default_close_minute")]
    pub close_minute: u32,
}

fn default_timezone() -> String {
    "America/Los_Angeles".to_string()
}

fn default_close_hour() -> u32 {
    12
}

fn default_close_minute() -> u32 {
    59
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            close_hour: default_close_hour(),
            close_minute: default_close_minute(),
        }
    }
}
