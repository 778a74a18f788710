//! Benzinga news client
//!
//! The news endpoint answers with either `{"articles": [...]}` or a bare
//! list, field names vary (`title`/`headline`, `created`/`published`/`time`),
//! and tickers arrive as plain strings or `{"name": ...}` objects.
//! Normalization is therefore value-driven; articles missing a headline,
//! timestamp, or ticker list are dropped before they reach the pipeline.

use crate::client::NewsFeed;
use crate::config::BenzingaConfig;
use crate::error::{BotError, Result};
use crate::types::Article;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

/// Pagination safety cap for range queries
const MAX_PAGES: usize = 50;

#[derive(Clone)]
pub struct BenzingaClient {
    http: Client,
    config: BenzingaConfig,
}

impl BenzingaClient {
    pub fn new(config: BenzingaConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self { http, config })
    }

    fn news_url(&self) -> String {
        format!("{}/api/v2/news", self.config.base_url.trim_end_matches('/'))
    }

    async fn fetch_page(&self, extra: &[(String, String)]) -> Result<Vec<Article>> {
        let mut params: Vec<(String, String)> = vec![
            ("token".to_string(), self.config.api_key.clone()),
            ("pagesize".to_string(), self.config.pagesize.to_string()),
            ("display_tickers".to_string(), "true".to_string()),
        ];
        params.extend_from_slice(extra);

        let resp = self.http.get(self.news_url()).query(&params).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(BotError::Api(format!(
                "benzinga status {}: {}",
                status,
                truncate(&body, 800)
            )));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| BotError::Api(format!("benzinga parse: {}: {}", e, truncate(&body, 800))))?;
        Ok(normalize_articles(&value))
    }
}

#[async_trait]
impl NewsFeed for BenzingaClient {
    async fn latest(&self) -> Result<Vec<Article>> {
        self.fetch_page(&[]).await
    }

    async fn range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tickers: &[String],
    ) -> Result<Vec<Article>> {
        let mut extra = vec![(
            "date".to_string(),
            format!("{},{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d")),
        )];
        if !tickers.is_empty() {
            let joined = tickers
                .iter()
                .map(|t| t.to_uppercase())
                .collect::<Vec<_>>()
                .join(",");
            extra.push(("tickers".to_string(), joined));
        }

        let mut out = Vec::new();
        for page in 0..MAX_PAGES {
            let mut params = extra.clone();
            if page > 0 {
                params.push(("page".to_string(), page.to_string()));
            }
            let articles = self.fetch_page(&params).await?;
            let count = articles.len();
            out.extend(articles);
            if count < self.config.pagesize {
                break;
            }
        }
        debug!("Fetched {} historical articles", out.len());
        Ok(out)
    }
}

/// Extract articles from either `{"articles": [...]}` or a bare list
pub(crate) fn normalize_articles(value: &Value) -> Vec<Article> {
    let items = match value {
        Value::Object(map) => map.get("articles").and_then(Value::as_array),
        Value::Array(_) => value.as_array(),
        _ => None,
    };

    let Some(items) = items else {
        return Vec::new();
    };

    items.iter().filter_map(normalize_article).collect()
}

fn normalize_article(item: &Value) -> Option<Article> {
    let headline = item
        .get("title")
        .or_else(|| item.get("headline"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())?;

    let created_raw = item
        .get("created")
        .or_else(|| item.get("published"))
        .or_else(|| item.get("time"))
        .and_then(Value::as_str)?;
    let created_at = parse_timestamp(created_raw)?;

    let tickers: Vec<String> = item
        .get("stocks")
        .or_else(|| item.get("tickers"))
        .and_then(Value::as_array)?
        .iter()
        .filter_map(ticker_name)
        .collect();
    if tickers.is_empty() {
        return None;
    }

    let provider_sentiment = item
        .get("sentiment")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    Some(Article {
        tickers,
        headline: headline.to_string(),
        created_at,
        provider_sentiment,
    })
}

fn ticker_name(entry: &Value) -> Option<String> {
    let raw = match entry {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("name").and_then(Value::as_str)?,
        _ => return None,
    };
    let normalized = raw.trim().to_uppercase();
    (!normalized.is_empty()).then_some(normalized)
}

/// Benzinga timestamps show up as RFC 2822, RFC 3339, or a bare
/// `YYYY-MM-DD HH:MM:SS` (taken as UTC)
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
