//! Operator overrides
//!
//! Manual interventions on open positions: retuning the trailing stop,
//! toggling the market-close exit, and closing a position outright. Each
//! intervention is written to the append-only `trade_events` audit table in
//! the same transaction as the change itself; the core never reads that
//! table back.

use crate::error::{BotError, Result};
use crate::notify::Notifier;
use crate::storage::Database;
use crate::types::TradeRecord;

pub struct Overrides {
    db: Database,
    notifier: Notifier,
}

impl Overrides {
    pub fn new(db: Database, notifier: Notifier) -> Self {
        Self { db, notifier }
    }

    /// Change the trailing stop percentage; returns the previous value
    pub async fn set_trailing_stop(&self, trade_id: i64, pct: f64) -> Result<f64> {
        if !pct.is_finite() || pct <= 0.0 || pct > 100.0 {
            return Err(BotError::Invalid(format!(
                "trailing stop must be in (0, 100], got {}",
                pct
            )));
        }
        self.db.apply_tsl_change(trade_id, pct).await
    }

    /// Toggle the market-close exit flag; returns the previous value
    pub async fn set_market_close_exit(&self, trade_id: i64, enabled: bool) -> Result<bool> {
        self.db.apply_market_close_change(trade_id, enabled).await
    }

    /// Close a position at the given price (entry price when omitted).
    /// Like any transition into Closed, this emits a best-effort alert.
    pub async fn manual_exit(&self, trade_id: i64, price: Option<f64>) -> Result<TradeRecord> {
        if let Some(p) = price {
            if !p.is_finite() || p <= 0.0 {
                return Err(BotError::Invalid(format!("exit price must be positive, got {}", p)));
            }
        }

        let closed = self.db.apply_manual_exit(trade_id, price).await?;
        if let (Some(exit_price), Some(reason)) = (closed.exit_price, closed.exit_reason.as_deref())
        {
            let _ = self
                .notifier
                .trade_exit(&closed.ticker, exit_price, reason)
                .await;
        }
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Sentiment, SentimentScore, TradeStatus};
    use tempfile::tempdir;

    fn score() -> SentimentScore {
        SentimentScore {
            label: Sentiment::Bullish,
            score: 0.8,
            source: "benzinga".to_string(),
        }
    }

    async fn setup() -> (Overrides, Database, i64, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::connect(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let id = db
            .insert_open_trade(Some(1), "AAPL", "headline", &score(), 50.0, 10_000.0)
            .await
            .unwrap();
        let overrides = Overrides::new(db.clone(), Notifier::disabled());
        (overrides, db, id, dir)
    }

    #[tokio::test]
    async fn test_set_trailing_stop_validates_range() {
        let (overrides, _db, id, _dir) = setup().await;
        assert!(overrides.set_trailing_stop(id, 0.0).await.is_err());
        assert!(overrides.set_trailing_stop(id, -3.0).await.is_err());
        assert!(overrides.set_trailing_stop(id, 250.0).await.is_err());
        assert!(overrides.set_trailing_stop(id, f64::NAN).await.is_err());

        let old = overrides.set_trailing_stop(id, 7.5).await.unwrap();
        assert_eq!(old, 10.0);
    }

    #[tokio::test]
    async fn test_market_close_toggle_round_trip() {
        let (overrides, db, id, _dir) = setup().await;

        let old = overrides.set_market_close_exit(id, false).await.unwrap();
        assert!(old);
        let trade = db.trade(id).await.unwrap().unwrap();
        assert!(!trade.market_close_exit);

        let events = db.trade_events(id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "market_close_exit_change");
        assert_eq!(events[0].old_value.as_deref(), Some("true"));
        assert_eq!(events[0].new_value.as_deref(), Some("false"));
    }

    #[tokio::test]
    async fn test_manual_exit_closes_and_audits() {
        let (overrides, db, id, _dir) = setup().await;

        let closed = overrides.manual_exit(id, Some(55.0)).await.unwrap();
        assert_eq!(closed.status(), TradeStatus::Closed);
        assert_eq!(closed.exit_price, Some(55.0));
        assert_eq!(closed.exit_reason.as_deref(), Some("manual_exit"));

        let events = db.trade_events(id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "manual_exit");

        // already closed: a second manual exit is rejected
        assert!(overrides.manual_exit(id, None).await.is_err());
    }

    #[tokio::test]
    async fn test_manual_exit_rejects_bad_price() {
        let (overrides, _db, id, _dir) = setup().await;
        assert!(overrides.manual_exit(id, Some(0.0)).await.is_err());
        assert!(overrides.manual_exit(id, Some(-1.0)).await.is_err());
    }
}
