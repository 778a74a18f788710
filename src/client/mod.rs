//! External data adapters
//!
//! The decision core depends on these capability traits, not on the vendor
//! clients, so tests (and a future vendor swap) plug in alternatives.
//! All adapters treat "no data" as a routine condition (`Ok(None)` / empty
//! vec) and reserve `Err` for transport or parse failures.

pub mod alpaca;
pub mod benzinga;

pub use alpaca::AlpacaClient;
pub use benzinga::BenzingaClient;

use crate::error::Result;
use crate::types::{AccountBalance, Article, BarSeries};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Intraday OHLCV source
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Chronologically ordered bars, or `None` when the ticker has no data
    async fn bars(
        &self,
        ticker: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Option<BarSeries>>;
}

/// Account snapshot source
#[async_trait]
pub trait Broker: Send + Sync {
    /// `None` when the broker is unreachable or unconfigured
    async fn balance(&self) -> Result<Option<AccountBalance>>;
}

/// Headline source
#[async_trait]
pub trait NewsFeed: Send + Sync {
    /// Most recent articles, normalized; invalid items already dropped
    async fn latest(&self) -> Result<Vec<Article>>;

    /// Articles within a time range, for historical evaluation
    async fn range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tickers: &[String],
    ) -> Result<Vec<Article>>;
}
