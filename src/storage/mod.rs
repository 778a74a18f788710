//! Persistent store
//!
//! Sqlite-backed storage for news, trades, settings, capital usage, audit
//! events, and operational logs. The two polling loops coordinate only
//! through this store, so every multi-step operation here runs inside the
//! narrowest transaction that preserves its invariants: opening a position
//! links the news row and records capital usage atomically, and closes are
//! conditional updates so repeated polls or a second exit engine cannot
//! double-close a position.

use crate::error::{BotError, Result};
use crate::types::{
    Article, CapitalMode, DailyStats, LogRecord, NewsRecord, SentimentScore, Settings,
    TradeEvent, TradeRecord,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Handle to the sqlite store; cheap to clone
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database at `path` and run migrations.
    ///
    /// Accepts a filesystem path (`~` is expanded) or a full `sqlite:` URL.
    pub async fn connect(path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path).into_owned();

        let options = if expanded.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(&expanded)?.create_if_missing(true)
        } else {
            if let Some(parent) = Path::new(&expanded).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| BotError::Internal(format!("create {}: {}", expanded, e)))?;
                }
            }
            SqliteConnectOptions::new()
                .filename(&expanded)
                .create_if_missing(true)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        info!("Database ready at {}", expanded);
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                level TEXT NOT NULL,
                component TEXT NOT NULL,
                event TEXT NOT NULL,
                message TEXT NOT NULL,
                ticker TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS news (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticker TEXT NOT NULL,
                headline TEXT NOT NULL,
                sentiment TEXT,
                sentiment_score REAL,
                sentiment_source TEXT,
                news_time TEXT NOT NULL,
                UNIQUE(ticker, headline)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                news_id INTEGER,
                ticker TEXT NOT NULL,
                headline TEXT NOT NULL,
                sentiment TEXT,
                sentiment_score REAL,
                sentiment_source TEXT,
                entry_price REAL,
                entry_amount REAL,
                entry_time TEXT,
                exit_price REAL,
                exit_time TEXT,
                exit_reason TEXT,
                skip_reason TEXT,
                trailing_stop_loss REAL NOT NULL DEFAULT 10.0,
                market_close_exit INTEGER NOT NULL DEFAULT 1,
                peak_price REAL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE TABLE IF NOT EXISTS settings (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS capital_usage (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                ticker TEXT NOT NULL,
                amount REAL NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trade_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                trade_id INTEGER NOT NULL,
                event TEXT NOT NULL,
                old_value TEXT,
                new_value TEXT,
                timestamp TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_news_time ON news(news_time)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_news_id ON trades(news_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_logs_component ON logs(component, timestamp)")
            .execute(&self.pool)
            .await?;

        // Seed operator settings
        for (key, value) in [
            ("capital_mode", "percent"),
            ("capital_value", "10"),
            ("account_size", "100000"),
            ("paper_trading", "true"),
        ] {
            sqlx::query("INSERT OR IGNORE INTO settings(key, value) VALUES(?1, ?2)")
                .bind(key)
                .bind(value)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    // ---------- settings ----------

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO settings(key, value) VALUES(?1, ?2)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Read the operator settings once, as a snapshot for a single cycle.
    /// Malformed values fail closed to the documented defaults.
    pub async fn load_settings(&self) -> Result<Settings> {
        let defaults = Settings::default();

        let capital_mode = self
            .get_setting("capital_mode")
            .await?
            .map(|v| CapitalMode::parse(&v))
            .unwrap_or(defaults.capital_mode);
        let capital_value = self
            .get_setting("capital_value")
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.capital_value);
        let account_size = self
            .get_setting("account_size")
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.account_size);
        let paper_trading = self
            .get_setting("paper_trading")
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.paper_trading);

        Ok(Settings {
            capital_mode,
            capital_value,
            account_size,
            paper_trading,
        })
    }

    // ---------- news ----------

    /// Insert normalized articles, one row per ticker. Duplicate
    /// `(ticker, headline)` pairs are silently dropped, so a headline
    /// re-broadcast days later stays deduplicated. Returns rows inserted.
    pub async fn insert_articles(&self, articles: &[Article]) -> Result<u64> {
        let mut inserted = 0u64;
        for article in articles {
            for ticker in &article.tickers {
                let ticker = ticker.trim().to_uppercase();
                if ticker.is_empty() {
                    continue;
                }
                let result = sqlx::query(
                    r#"
                    INSERT OR IGNORE INTO news
                        (ticker, headline, sentiment, sentiment_score, sentiment_source, news_time)
                    VALUES (?1, ?2, ?3, NULL, ?4, ?5)
                    "#,
                )
                .bind(&ticker)
                .bind(&article.headline)
                .bind(&article.provider_sentiment)
                .bind("benzinga")
                .bind(article.created_at)
                .execute(&self.pool)
                .await?;
                inserted += result.rows_affected();
            }
        }
        Ok(inserted)
    }

    /// News not yet referenced by any trade row, newest first.
    /// A null `news_id` counts as the sentinel 0.
    pub async fn unprocessed_news(&self, limit: i64) -> Result<Vec<NewsRecord>> {
        let rows = sqlx::query_as::<_, NewsRecord>(
            r#"
            SELECT id, ticker, headline, sentiment, sentiment_score, sentiment_source, news_time
            FROM news
            WHERE id NOT IN (SELECT COALESCE(news_id, 0) FROM trades)
            ORDER BY news_time DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ---------- trades ----------

    /// Record a rejected headline. Skips carry the news link too, so every
    /// processed news row yields exactly one trade row.
    pub async fn insert_skip(
        &self,
        news_id: Option<i64>,
        ticker: &str,
        headline: &str,
        score: &SentimentScore,
        reason: &str,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO trades
                (news_id, ticker, headline, sentiment, sentiment_score, sentiment_source,
                 entry_time, skip_reason)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(news_id)
        .bind(ticker)
        .bind(headline)
        .bind(score.label.as_str())
        .bind(score.score)
        .bind(&score.source)
        .bind(Utc::now())
        .bind(reason)
        .execute(&self.pool)
        .await?;

        debug!("Skipped {}: {}", ticker, reason);
        Ok(result.last_insert_rowid())
    }

    /// Open a position: the trade row (with its news link) and the capital
    /// usage record are written in one transaction.
    pub async fn insert_open_trade(
        &self,
        news_id: Option<i64>,
        ticker: &str,
        headline: &str,
        score: &SentimentScore,
        entry_price: f64,
        notional: f64,
    ) -> Result<i64> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO trades
                (news_id, ticker, headline, sentiment, sentiment_score, sentiment_source,
                 entry_price, entry_amount, entry_time,
                 trailing_stop_loss, market_close_exit, peak_price)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 10.0, 1, ?7)
            "#,
        )
        .bind(news_id)
        .bind(ticker)
        .bind(headline)
        .bind(score.label.as_str())
        .bind(score.score)
        .bind(&score.source)
        .bind(entry_price)
        .bind(notional)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        let trade_id = result.last_insert_rowid();

        sqlx::query("INSERT INTO capital_usage(date, ticker, amount) VALUES(?1, ?2, ?3)")
            .bind(now.date_naive().to_string())
            .bind(ticker)
            .bind(notional)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!("Opened trade {} for {} @ {}", trade_id, ticker, entry_price);
        Ok(trade_id)
    }

    pub async fn trade(&self, id: i64) -> Result<Option<TradeRecord>> {
        let row = sqlx::query_as::<_, TradeRecord>("SELECT * FROM trades WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Positions currently open: entered but not yet exited.
    pub async fn open_trades(&self) -> Result<Vec<TradeRecord>> {
        let rows = sqlx::query_as::<_, TradeRecord>(
            r#"
            SELECT * FROM trades
            WHERE entry_price IS NOT NULL AND exit_price IS NULL
            ORDER BY entry_time ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Persist a new trailing peak. No-op once the position has closed,
    /// which freezes the peak at the moment of exit.
    pub async fn update_peak(&self, id: i64, peak: f64) -> Result<()> {
        sqlx::query("UPDATE trades SET peak_price = ?1 WHERE id = ?2 AND exit_price IS NULL")
            .bind(peak)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Conditionally close a position. Returns whether this call performed
    /// the transition; a position already closed by a previous poll (or a
    /// concurrent engine) leaves the row untouched and returns `false`.
    pub async fn close_trade(&self, id: i64, exit_price: f64, reason: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE trades SET exit_price = ?1, exit_time = ?2, exit_reason = ?3
            WHERE id = ?4 AND entry_price IS NOT NULL AND exit_price IS NULL
            "#,
        )
        .bind(exit_price)
        .bind(Utc::now())
        .bind(reason)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ---------- operator overrides (audited) ----------

    /// Change the trailing stop of an open position; records the audit
    /// event in the same transaction. Returns the previous value.
    pub async fn apply_tsl_change(&self, trade_id: i64, new_tsl: f64) -> Result<f64> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(f64, Option<f64>, Option<f64>)> = sqlx::query_as(
            "SELECT trailing_stop_loss, entry_price, exit_price FROM trades WHERE id = ?1",
        )
        .bind(trade_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (old_tsl, entry_price, exit_price) =
            row.ok_or(BotError::TradeNotFound(trade_id))?;
        if entry_price.is_none() || exit_price.is_some() {
            return Err(BotError::TradeNotOpen(trade_id));
        }

        sqlx::query("UPDATE trades SET trailing_stop_loss = ?1 WHERE id = ?2")
            .bind(new_tsl)
            .bind(trade_id)
            .execute(&mut *tx)
            .await?;

        record_event(
            &mut tx,
            trade_id,
            "tsl_change",
            Some(old_tsl.to_string()),
            Some(new_tsl.to_string()),
        )
        .await?;

        tx.commit().await?;
        Ok(old_tsl)
    }

    /// Toggle the market-close exit flag of an open position, audited.
    pub async fn apply_market_close_change(&self, trade_id: i64, enabled: bool) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(bool, Option<f64>, Option<f64>)> = sqlx::query_as(
            "SELECT market_close_exit, entry_price, exit_price FROM trades WHERE id = ?1",
        )
        .bind(trade_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (old_flag, entry_price, exit_price) =
            row.ok_or(BotError::TradeNotFound(trade_id))?;
        if entry_price.is_none() || exit_price.is_some() {
            return Err(BotError::TradeNotOpen(trade_id));
        }

        sqlx::query("UPDATE trades SET market_close_exit = ?1 WHERE id = ?2")
            .bind(enabled)
            .bind(trade_id)
            .execute(&mut *tx)
            .await?;

        record_event(
            &mut tx,
            trade_id,
            "market_close_exit_change",
            Some(old_flag.to_string()),
            Some(enabled.to_string()),
        )
        .await?;

        tx.commit().await?;
        Ok(old_flag)
    }

    /// Close a position at the operator's price (entry price when none is
    /// given), audited. Returns the closed row.
    pub async fn apply_manual_exit(
        &self,
        trade_id: i64,
        price: Option<f64>,
    ) -> Result<TradeRecord> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(Option<f64>, Option<f64>)> =
            sqlx::query_as("SELECT entry_price, exit_price FROM trades WHERE id = ?1")
                .bind(trade_id)
                .fetch_optional(&mut *tx)
                .await?;

        let (entry_price, exit_price) = row.ok_or(BotError::TradeNotFound(trade_id))?;
        let entry_price = match (entry_price, exit_price) {
            (Some(p), None) => p,
            _ => return Err(BotError::TradeNotOpen(trade_id)),
        };
        let exit_price = price.unwrap_or(entry_price);

        sqlx::query(
            r#"
            UPDATE trades SET exit_price = ?1, exit_time = ?2, exit_reason = 'manual_exit'
            WHERE id = ?3 AND exit_price IS NULL
            "#,
        )
        .bind(exit_price)
        .bind(Utc::now())
        .bind(trade_id)
        .execute(&mut *tx)
        .await?;

        record_event(
            &mut tx,
            trade_id,
            "manual_exit",
            None,
            Some(exit_price.to_string()),
        )
        .await?;

        tx.commit().await?;

        self.trade(trade_id)
            .await?
            .ok_or(BotError::TradeNotFound(trade_id))
    }

    pub async fn trade_events(&self, trade_id: i64) -> Result<Vec<TradeEvent>> {
        let rows = sqlx::query_as::<_, TradeEvent>(
            "SELECT * FROM trade_events WHERE trade_id = ?1 ORDER BY id ASC",
        )
        .bind(trade_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ---------- operational logs ----------

    pub async fn log_provider(
        &self,
        level: &str,
        component: &str,
        event: &str,
        message: &str,
        ticker: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO logs(timestamp, level, component, event, message, ticker)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(Utc::now())
        .bind(level)
        .bind(component)
        .bind(event)
        .bind(message)
        .bind(ticker)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn recent_logs(&self, component: &str, limit: i64) -> Result<Vec<LogRecord>> {
        let rows = sqlx::query_as::<_, LogRecord>(
            r#"
            SELECT * FROM logs WHERE component = ?1
            ORDER BY timestamp DESC LIMIT ?2
            "#,
        )
        .bind(component)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Time of the provider's last successful response, for call-health
    /// reporting in the log viewer.
    pub async fn last_provider_response(
        &self,
        component: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let ts: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            SELECT timestamp FROM logs
            WHERE component = ?1 AND event = 'RESPONSE'
            ORDER BY timestamp DESC LIMIT 1
            "#,
        )
        .bind(component)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ts)
    }

    // ---------- reporting ----------

    pub async fn daily_stats(&self) -> Result<DailyStats> {
        let (opened, skipped, closed, realized_pnl): (i64, i64, i64, f64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN entry_price IS NOT NULL AND skip_reason IS NULL
                                       AND DATE(entry_time) = DATE('now') THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN skip_reason IS NOT NULL
                                       AND DATE(entry_time) = DATE('now') THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN exit_price IS NOT NULL
                                       AND DATE(exit_time) = DATE('now') THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN exit_price IS NOT NULL
                                       AND DATE(exit_time) = DATE('now')
                             THEN (exit_price - entry_price) * (entry_amount / entry_price)
                             ELSE 0.0 END), 0.0)
            FROM trades
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DailyStats {
            opened,
            skipped,
            closed,
            realized_pnl,
        })
    }

    /// Notional committed today across all entries.
    pub async fn capital_used_today(&self) -> Result<f64> {
        let total: f64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0.0) FROM capital_usage WHERE date = ?1",
        )
        .bind(Utc::now().date_naive().to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }
}

async fn record_event(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    trade_id: i64,
    event: &str,
    old_value: Option<String>,
    new_value: Option<String>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO trade_events(trade_id, event, old_value, new_value, timestamp)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(trade_id)
    .bind(event)
    .bind(old_value)
    .bind(new_value)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sentiment;
    use chrono::Duration;
    use tempfile::tempdir;

    async fn test_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trades.db");
        let db = Database::connect(path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn bullish_score() -> SentimentScore {
        SentimentScore {
            label: Sentiment::Bullish,
            score: 0.8,
            source: "benzinga".to_string(),
        }
    }

    fn article(ticker: &str, headline: &str, created_at: DateTime<Utc>) -> Article {
        Article {
            tickers: vec![ticker.to_string()],
            headline: headline.to_string(),
            created_at,
            provider_sentiment: None,
        }
    }

    #[tokio::test]
    async fn test_settings_seeded_and_parsed() {
        let (db, _dir) = test_db().await;

        let settings = db.load_settings().await.unwrap();
        assert_eq!(settings, Settings::default());

        db.set_setting("capital_mode", "dollar").await.unwrap();
        db.set_setting("capital_value", "2500").await.unwrap();
        let settings = db.load_settings().await.unwrap();
        assert_eq!(settings.capital_mode, CapitalMode::Dollar);
        assert_eq!(settings.capital_value, 2500.0);
    }

    #[tokio::test]
    async fn test_settings_fail_closed_on_garbage() {
        let (db, _dir) = test_db().await;

        db.set_setting("capital_value", "not-a-number").await.unwrap();
        db.set_setting("account_size", "").await.unwrap();
        let settings = db.load_settings().await.unwrap();
        assert_eq!(settings.capital_value, 10.0);
        assert_eq!(settings.account_size, 100_000.0);
    }

    #[tokio::test]
    async fn test_news_dedup_is_permanent() {
        let (db, _dir) = test_db().await;
        let now = Utc::now();

        let inserted = db
            .insert_articles(&[article("AAPL", "Apple beats estimates", now)])
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        // same (ticker, headline) days later is dropped
        let inserted = db
            .insert_articles(&[article(
                "AAPL",
                "Apple beats estimates",
                now + Duration::days(3),
            )])
            .await
            .unwrap();
        assert_eq!(inserted, 0);

        // same headline on a different ticker is a new row
        let inserted = db
            .insert_articles(&[article("MSFT", "Apple beats estimates", now)])
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let unprocessed = db.unprocessed_news(50).await.unwrap();
        assert_eq!(unprocessed.len(), 2);
    }

    #[tokio::test]
    async fn test_unprocessed_excludes_linked_news() {
        let (db, _dir) = test_db().await;
        let now = Utc::now();

        db.insert_articles(&[
            article("AAPL", "headline one", now),
            article("MSFT", "headline two", now - Duration::minutes(1)),
        ])
        .await
        .unwrap();

        let unprocessed = db.unprocessed_news(50).await.unwrap();
        assert_eq!(unprocessed.len(), 2);
        // newest first
        assert_eq!(unprocessed[0].ticker, "AAPL");

        let news = &unprocessed[0];
        db.insert_skip(
            Some(news.id),
            &news.ticker,
            &news.headline,
            &bullish_score(),
            "Sentiment not bullish",
        )
        .await
        .unwrap();

        let unprocessed = db.unprocessed_news(50).await.unwrap();
        assert_eq!(unprocessed.len(), 1);
        assert_eq!(unprocessed[0].ticker, "MSFT");
    }

    #[tokio::test]
    async fn test_open_trade_records_capital_usage() {
        let (db, _dir) = test_db().await;

        let id = db
            .insert_open_trade(Some(1), "AAPL", "headline", &bullish_score(), 50.0, 10_000.0)
            .await
            .unwrap();

        let trade = db.trade(id).await.unwrap().unwrap();
        assert_eq!(trade.entry_price, Some(50.0));
        assert_eq!(trade.entry_amount, Some(10_000.0));
        assert_eq!(trade.peak_price, Some(50.0));
        assert_eq!(trade.trailing_stop_loss, 10.0);
        assert!(trade.market_close_exit);
        assert_eq!(trade.status(), crate::types::TradeStatus::Open);

        assert_eq!(db.capital_used_today().await.unwrap(), 10_000.0);
    }

    #[tokio::test]
    async fn test_close_is_conditional_and_idempotent() {
        let (db, _dir) = test_db().await;

        let id = db
            .insert_open_trade(Some(1), "AAPL", "headline", &bullish_score(), 50.0, 10_000.0)
            .await
            .unwrap();

        assert!(db.close_trade(id, 45.0, "tsl_10%").await.unwrap());
        // second close attempt must not touch the row
        assert!(!db.close_trade(id, 40.0, "market_close").await.unwrap());

        let trade = db.trade(id).await.unwrap().unwrap();
        assert_eq!(trade.exit_price, Some(45.0));
        assert_eq!(trade.exit_reason.as_deref(), Some("tsl_10%"));

        // peak is frozen after close
        db.update_peak(id, 99.0).await.unwrap();
        let trade = db.trade(id).await.unwrap().unwrap();
        assert_eq!(trade.peak_price, Some(50.0));
    }

    #[tokio::test]
    async fn test_skip_rows_are_not_open_positions() {
        let (db, _dir) = test_db().await;

        db.insert_skip(Some(1), "AAPL", "headline", &bullish_score(), "No price data")
            .await
            .unwrap();
        let open = db.open_trades().await.unwrap();
        assert!(open.is_empty());
    }

    #[tokio::test]
    async fn test_tsl_change_is_audited() {
        let (db, _dir) = test_db().await;

        let id = db
            .insert_open_trade(Some(1), "AAPL", "headline", &bullish_score(), 50.0, 10_000.0)
            .await
            .unwrap();

        let old = db.apply_tsl_change(id, 5.0).await.unwrap();
        assert_eq!(old, 10.0);

        let trade = db.trade(id).await.unwrap().unwrap();
        assert_eq!(trade.trailing_stop_loss, 5.0);

        let events = db.trade_events(id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "tsl_change");
        assert_eq!(events[0].old_value.as_deref(), Some("10"));
        assert_eq!(events[0].new_value.as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn test_override_rejects_missing_or_closed_trades() {
        let (db, _dir) = test_db().await;

        assert!(matches!(
            db.apply_tsl_change(999, 5.0).await,
            Err(BotError::TradeNotFound(999))
        ));

        let id = db
            .insert_open_trade(Some(1), "AAPL", "headline", &bullish_score(), 50.0, 10_000.0)
            .await
            .unwrap();
        db.close_trade(id, 45.0, "tsl_10%").await.unwrap();

        assert!(matches!(
            db.apply_market_close_change(id, false).await,
            Err(BotError::TradeNotOpen(_))
        ));
    }

    #[tokio::test]
    async fn test_manual_exit_defaults_to_entry_price() {
        let (db, _dir) = test_db().await;

        let id = db
            .insert_open_trade(Some(1), "AAPL", "headline", &bullish_score(), 50.0, 10_000.0)
            .await
            .unwrap();

        let closed = db.apply_manual_exit(id, None).await.unwrap();
        assert_eq!(closed.exit_price, Some(50.0));
        assert_eq!(closed.exit_reason.as_deref(), Some("manual_exit"));

        let events = db.trade_events(id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "manual_exit");
        assert_eq!(events[0].new_value.as_deref(), Some("50"));
    }

    #[tokio::test]
    async fn test_provider_log_health() {
        let (db, _dir) = test_db().await;

        assert!(db
            .last_provider_response("benzinga")
            .await
            .unwrap()
            .is_none());

        db.log_provider("API", "benzinga", "REQUEST", "{}", None)
            .await
            .unwrap();
        db.log_provider("API", "benzinga", "RESPONSE", "{\"items\":3}", None)
            .await
            .unwrap();

        assert!(db
            .last_provider_response("benzinga")
            .await
            .unwrap()
            .is_some());

        let logs = db.recent_logs("benzinga", 10).await.unwrap();
        assert_eq!(logs.len(), 2);
    }
}
