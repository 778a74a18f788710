//! News ingestion
//!
//! Polls the news provider, normalizes articles into per-ticker rows, and
//! records provider call health in the `logs` table so the log viewer can
//! show the age of the last successful response. A transport or parse
//! failure aborts the cycle for this source only; the next scheduled cycle
//! is the retry.

use crate::client::NewsFeed;
use crate::error::Result;
use crate::storage::Database;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

const COMPONENT: &str = "benzinga";

pub struct NewsIngestor {
    db: Database,
    feed: Arc<dyn NewsFeed>,
}

impl NewsIngestor {
    pub fn new(db: Database, feed: Arc<dyn NewsFeed>) -> Self {
        Self { db, feed }
    }

    /// One fetch-normalize-insert cycle; returns rows inserted
    pub async fn run_once(&self) -> Result<u64> {
        self.db
            .log_provider("API", COMPONENT, "REQUEST", "{\"endpoint\":\"news\"}", None)
            .await?;

        let started = std::time::Instant::now();
        let articles = match self.feed.latest().await {
            Ok(articles) => articles,
            Err(e) => {
                self.db
                    .log_provider("ERROR", COMPONENT, "REQUEST_ERROR", &e.to_string(), None)
                    .await?;
                return Err(e);
            }
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let titles_sample: Vec<&str> = articles
            .iter()
            .take(5)
            .map(|a| a.headline.as_str())
            .collect();
        self.db
            .log_provider(
                "API",
                COMPONENT,
                "RESPONSE",
                &json!({
                    "elapsed_ms": elapsed_ms,
                    "items": articles.len(),
                    "titles_sample": titles_sample,
                })
                .to_string(),
                None,
            )
            .await?;

        let inserted = self.db.insert_articles(&articles).await?;
        self.db
            .log_provider(
                "INFO",
                COMPONENT,
                "INGEST_SUMMARY",
                &format!("Inserted {} news rows", inserted),
                None,
            )
            .await?;

        if inserted > 0 {
            info!("Ingested {} new headlines", inserted);
        }
        Ok(inserted)
    }
}
