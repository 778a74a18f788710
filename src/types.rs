//! Core domain types shared across the bot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Sentiment label attached to a headline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    VeryBullish,
    Bullish,
    Neutral,
    Bearish,
    VeryBearish,
}

impl Sentiment {
    /// Labels that admit a long entry
    pub fn is_bullish(&self) -> bool {
        matches!(self, Sentiment::Bullish | Sentiment::VeryBullish)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::VeryBullish => "very bullish",
            Sentiment::Bullish => "bullish",
            Sentiment::Neutral => "neutral",
            Sentiment::Bearish => "bearish",
            Sentiment::VeryBearish => "very bearish",
        }
    }

    /// Parse a canonical label; unknown labels yield `None`
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "very bullish" => Some(Sentiment::VeryBullish),
            "bullish" => Some(Sentiment::Bullish),
            "neutral" => Some(Sentiment::Neutral),
            "bearish" => Some(Sentiment::Bearish),
            "very bearish" => Some(Sentiment::VeryBearish),
            _ => None,
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scored sentiment with its originating scorer
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentScore {
    pub label: Sentiment,
    pub score: f64,
    pub source: String,
}

/// Normalized news article from the provider, before persistence
#[derive(Debug, Clone)]
pub struct Article {
    pub tickers: Vec<String>,
    pub headline: String,
    pub created_at: DateTime<Utc>,
    pub provider_sentiment: Option<String>,
}

/// Single OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Chronologically ordered bar window
#[derive(Debug, Clone, Default)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Build a series, sorting bars by time so callers can rely on order
    pub fn new(mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.time);
        Self { bars }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }
}

/// Persisted news row
#[derive(Debug, Clone, FromRow)]
pub struct NewsRecord {
    pub id: i64,
    pub ticker: String,
    pub headline: String,
    pub sentiment: Option<String>,
    pub sentiment_score: Option<f64>,
    pub sentiment_source: Option<String>,
    pub news_time: DateTime<Utc>,
}

/// Persisted trade row. Skips, open positions, and closed positions all
/// share this shape; `status()` derives which one a row is.
#[derive(Debug, Clone, FromRow)]
pub struct TradeRecord {
    pub id: i64,
    pub news_id: Option<i64>,
    pub ticker: String,
    pub headline: String,
    pub sentiment: Option<String>,
    pub sentiment_score: Option<f64>,
    pub sentiment_source: Option<String>,
    pub entry_price: Option<f64>,
    pub entry_amount: Option<f64>,
    pub entry_time: Option<DateTime<Utc>>,
    pub exit_price: Option<f64>,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_reason: Option<String>,
    pub skip_reason: Option<String>,
    pub trailing_stop_loss: f64,
    pub market_close_exit: bool,
    pub peak_price: Option<f64>,
}

/// Lifecycle state of a trade row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeStatus {
    Skipped,
    Open,
    Closed,
}

impl TradeRecord {
    pub fn status(&self) -> TradeStatus {
        if self.skip_reason.is_some() {
            TradeStatus::Skipped
        } else if self.exit_price.is_some() {
            TradeStatus::Closed
        } else {
            TradeStatus::Open
        }
    }

    /// Shares held, reconstructed from the fixed entry notional
    pub fn shares(&self) -> Option<f64> {
        match (self.entry_amount, self.entry_price) {
            (Some(amount), Some(price)) if price > 0.0 => Some(amount / price),
            _ => None,
        }
    }
}

/// Audit row for operator interventions
#[derive(Debug, Clone, FromRow)]
pub struct TradeEvent {
    pub id: i64,
    pub trade_id: i64,
    pub event: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Structured operational log row, consumed by the log viewer
#[derive(Debug, Clone, FromRow)]
pub struct LogRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub component: String,
    pub event: String,
    pub message: String,
    pub ticker: Option<String>,
}

/// How the per-trade budget is derived from settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapitalMode {
    Percent,
    Dollar,
}

impl CapitalMode {
    /// Parse the persisted mode; anything unrecognized fails closed to percent
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "dollar" => CapitalMode::Dollar,
            _ => CapitalMode::Percent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CapitalMode::Percent => "percent",
            CapitalMode::Dollar => "dollar",
        }
    }
}

/// Snapshot of operator settings, read once per pipeline cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub capital_mode: CapitalMode,
    pub capital_value: f64,
    pub account_size: f64,
    pub paper_trading: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            capital_mode: CapitalMode::Percent,
            capital_value: 10.0,
            account_size: 100_000.0,
            paper_trading: true,
        }
    }
}

/// Account snapshot from the broker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountBalance {
    pub cash: f64,
    pub buying_power: f64,
    pub equity: f64,
}

/// Today's activity, for the status report
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DailyStats {
    pub opened: i64,
    pub skipped: i64,
    pub closed: i64,
    pub realized_pnl: f64,
}

/// Format a dollar amount with thousands separators, e.g. `$10,000.00`
pub fn fmt_usd(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let formatted = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = formatted
        .split_once('.')
        .unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}${}.{}", sign, grouped, frac_part)
}
