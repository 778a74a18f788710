//! Decision pipeline: unprocessed news in, trade-or-skip rows out
//!
//! One invocation is one cycle. Settings are snapshotted once at the top so
//! a mid-cycle operator edit cannot produce inconsistent reads, and each
//! processed headline yields exactly one trade row — the row carries the
//! news link, so a headline is never evaluated twice.
//!
//! The running available-capital counter is decremented by the budgeted
//! amount, not the realized notional; together with the sizer's
//! one-share floor it can drift from real exposure. Both behaviors are
//! inherited from the strategy definition and left intact.

use crate::client::{Broker, MarketData};
use crate::config::EngineConfig;
use crate::engine::capital::per_trade_budget;
use crate::engine::rules::{EntryRules, SkipReason};
use crate::engine::sizer::size_position;
use crate::error::Result;
use crate::notify::Notifier;
use crate::sentiment::SentimentEngine;
use crate::storage::Database;
use crate::types::{NewsRecord, SentimentScore};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome counts for one pipeline cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub processed: usize,
    pub opened: usize,
    pub skipped: usize,
}

pub struct DecisionPipeline {
    db: Database,
    market: Arc<dyn MarketData>,
    broker: Arc<dyn Broker>,
    sentiment: SentimentEngine,
    notifier: Notifier,
    rules: EntryRules,
    cfg: EngineConfig,
}

impl DecisionPipeline {
    pub fn new(
        db: Database,
        market: Arc<dyn MarketData>,
        broker: Arc<dyn Broker>,
        sentiment: SentimentEngine,
        notifier: Notifier,
        cfg: EngineConfig,
    ) -> Self {
        let rules = EntryRules::from_config(&cfg);
        Self {
            db,
            market,
            broker,
            sentiment,
            notifier,
            rules,
            cfg,
        }
    }

    /// Run one cycle over the unprocessed news backlog
    pub async fn run_once(&self) -> Result<CycleSummary> {
        let settings = self.db.load_settings().await?;
        let budget = per_trade_budget(&settings);

        let mut available = match self.broker.balance().await {
            Ok(Some(balance)) => balance.buying_power,
            Ok(None) => settings.account_size,
            Err(e) => {
                warn!("Broker balance unavailable, using account size: {}", e);
                settings.account_size
            }
        };

        let candidates = self.db.unprocessed_news(self.cfg.news_batch).await?;
        let mut summary = CycleSummary::default();

        for news in candidates {
            summary.processed += 1;
            let score = self.sentiment.score(&news.headline, news.sentiment.as_deref());

            if !score.label.is_bullish() {
                self.skip(&news, &score, SkipReason::SentimentNotBullish)
                    .await?;
                summary.skipped += 1;
                continue;
            }

            let bars = match self
                .market
                .bars(&news.ticker, &self.cfg.timeframe, self.cfg.pipeline_bar_limit)
                .await
            {
                Ok(Some(bars)) if !bars.is_empty() => Some(bars),
                Ok(_) => None,
                Err(e) => {
                    warn!("Bar fetch failed for {}: {}", news.ticker, e);
                    None
                }
            };
            let Some(bars) = bars else {
                self.skip(&news, &score, SkipReason::NoPriceData).await?;
                summary.skipped += 1;
                continue;
            };

            if !self.rules.signal_confirmed(&bars) {
                self.skip(&news, &score, SkipReason::RulesNotMet).await?;
                summary.skipped += 1;
                continue;
            }

            let Some(entry_price) = bars.last_close() else {
                self.skip(&news, &score, SkipReason::NoPriceData).await?;
                summary.skipped += 1;
                continue;
            };

            if budget > available {
                self.skip(
                    &news,
                    &score,
                    SkipReason::InsufficientCapital {
                        required: budget,
                        available,
                    },
                )
                .await?;
                summary.skipped += 1;
                continue;
            }

            let size = size_position(budget, entry_price);
            let trade_id = self
                .db
                .insert_open_trade(
                    Some(news.id),
                    &news.ticker,
                    &news.headline,
                    &score,
                    entry_price,
                    size.notional,
                )
                .await?;
            available -= budget;
            summary.opened += 1;

            info!(
                "Opened trade {}: {} x{} @ {:.2}",
                trade_id, news.ticker, size.shares, entry_price
            );
            let _ = self
                .notifier
                .trade_entry(&news.ticker, entry_price, size.notional, &score, &news.headline)
                .await;
        }

        if summary.processed > 0 {
            info!(
                "Pipeline cycle: {} processed, {} opened, {} skipped",
                summary.processed, summary.opened, summary.skipped
            );
        }
        Ok(summary)
    }

    async fn skip(
        &self,
        news: &NewsRecord,
        score: &SentimentScore,
        reason: SkipReason,
    ) -> Result<()> {
        let reason_text = reason.to_string();
        self.db
            .insert_skip(Some(news.id), &news.ticker, &news.headline, score, &reason_text)
            .await?;
        let _ = self
            .notifier
            .trade_skip(&news.ticker, &reason_text, score, &news.headline)
            .await;
        Ok(())
    }
}
