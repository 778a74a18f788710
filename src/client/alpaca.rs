//! Alpaca client: Market Data v2 stock bars and the paper trading account
//!
//! Missing credentials or a non-200 response degrade to "no data" rather
//! than an error; the next poll cycle is the retry mechanism.

use crate::client::{Broker, MarketData};
use crate::config::AlpacaConfig;
use crate::error::Result;
use crate::types::{AccountBalance, Bar, BarSeries};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

const KEY_HEADER: &str = "APCA-API-KEY-ID";
const SECRET_HEADER: &str = "APCA-API-SECRET-KEY";

/// Alpaca REST client, shared by the pipeline and the exit engine
#[derive(Clone)]
pub struct AlpacaClient {
    http: Client,
    config: AlpacaConfig,
}

#[derive(Debug, Deserialize)]
struct BarsResponse {
    #[serde(default)]
    bars: Option<HashMap<String, Vec<AlpacaBar>>>,
}

#[derive(Debug, Deserialize)]
struct AlpacaBar {
    #[serde(rename = "t")]
    time: DateTime<Utc>,
    #[serde(rename = "o")]
    open: f64,
    #[serde(rename = "h")]
    high: f64,
    #[serde(rename = "l")]
    low: f64,
    #[serde(rename = "c")]
    close: f64,
    #[serde(rename = "v")]
    volume: f64,
}

/// Monetary fields arrive as strings
#[derive(Debug, Deserialize)]
struct AccountResponse {
    cash: Option<String>,
    buying_power: Option<String>,
    equity: Option<String>,
}

impl AlpacaClient {
    pub fn new(config: AlpacaConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self { http, config })
    }

    fn has_credentials(&self) -> bool {
        !self.config.api_key_id.is_empty() && !self.config.api_secret_key.is_empty()
    }
}

#[async_trait]
impl MarketData for AlpacaClient {
    async fn bars(
        &self,
        ticker: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Option<BarSeries>> {
        if !self.has_credentials() {
            debug!("Alpaca credentials missing, no bars for {}", ticker);
            return Ok(None);
        }

        let symbol = ticker.to_uppercase();
        let url = format!("{}/v2/stocks/bars", self.config.data_url.trim_end_matches('/'));
        let resp = self
            .http
            .get(&url)
            .header(KEY_HEADER, &self.config.api_key_id)
            .header(SECRET_HEADER, &self.config.api_secret_key)
            .query(&[
                ("symbols", symbol.as_str()),
                ("timeframe", timeframe),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            warn!("Alpaca bars for {} returned {}", symbol, resp.status());
            return Ok(None);
        }

        let body: BarsResponse = resp.json().await?;
        let bars = match body.bars.and_then(|mut m| m.remove(&symbol)) {
            Some(bars) if !bars.is_empty() => bars,
            _ => return Ok(None),
        };

        let series = BarSeries::new(
            bars.into_iter()
                .map(|b| Bar {
                    time: b.time,
                    open: b.open,
                    high: b.high,
                    low: b.low,
                    close: b.close,
                    volume: b.volume,
                })
                .collect(),
        );
        Ok(Some(series))
    }
}

#[async_trait]
impl Broker for AlpacaClient {
    async fn balance(&self) -> Result<Option<AccountBalance>> {
        if !self.has_credentials() {
            return Ok(None);
        }

        let url = format!("{}/v2/account", self.config.trading_url.trim_end_matches('/'));
        let resp = self
            .http
            .get(&url)
            .header(KEY_HEADER, &self.config.api_key_id)
            .header(SECRET_HEADER, &self.config.api_secret_key)
            .send()
            .await?;

        if !resp.status().is_success() {
            warn!("Alpaca account returned {}", resp.status());
            return Ok(None);
        }

        let account: AccountResponse = resp.json().await?;
        let parse = |v: Option<String>| v.and_then(|s| s.parse::<f64>().ok()).unwrap_or(0.0);

        Ok(Some(AccountBalance {
            cash: parse(account.cash),
            buying_power: parse(account.buying_power),
            equity: parse(account.equity),
        }))
    }
}
