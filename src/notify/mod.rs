//! Operator notifications
//!
//! Telegram delivery of subject/body alerts. Every caller treats delivery
//! as fire-and-forget: a failed send is logged and never rolls back the
//! trade or exit that triggered it.

use crate::config::TelegramConfig;
use crate::error::{BotError, Result};
use crate::types::{fmt_usd, SentimentScore};
use reqwest::Client;
use serde_json::json;

#[derive(Clone)]
pub struct Notifier {
    http: Client,
    telegram: Option<TelegramConfig>,
}

impl Notifier {
    pub fn new(telegram: TelegramConfig) -> Self {
        Self {
            http: Client::new(),
            telegram: Some(telegram),
        }
    }

    /// No-op notifier for unconfigured deployments
    pub fn disabled() -> Self {
        Self {
            http: Client::new(),
            telegram: None,
        }
    }

    /// Deliver a subject/body alert; Ok(()) when no channel is configured
    pub async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let Some(tg) = &self.telegram else {
            return Ok(());
        };

        let url = format!("https://api.telegram.org/bot{}/sendMessage", tg.bot_token);
        let text = format!("<b>{}</b>\n\n{}", subject, body);
        let resp = self
            .http
            .post(&url)
            .json(&json!({
                "chat_id": tg.chat_id,
                "text": text,
                "parse_mode": "HTML",
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(BotError::Notify(format!(
                "telegram returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    pub async fn startup(&self) -> Result<()> {
        self.send("BnBot", "Trading loops started").await
    }

    pub async fn trade_entry(
        &self,
        ticker: &str,
        entry_price: f64,
        notional: f64,
        score: &SentimentScore,
        headline: &str,
    ) -> Result<()> {
        if !self.wants(|t| t.notify_entries) {
            return Ok(());
        }
        let body = format!(
            "✅ ENTRY {}\nPrice: {:.2}\nNotional: {}\nSentiment: {} ({}) via {}\nHeadline: {}",
            ticker, entry_price, fmt_usd(notional), score.label, score.score, score.source, headline
        );
        self.send(&format!("BnBot Entry {}", ticker), &body).await
    }

    pub async fn trade_skip(
        &self,
        ticker: &str,
        reason: &str,
        score: &SentimentScore,
        headline: &str,
    ) -> Result<()> {
        if !self.wants(|t| t.notify_skips) {
            return Ok(());
        }
        let body = format!(
            "⛔ SKIP {}\nReason: {}\nSentiment: {} ({}) via {}\nHeadline: {}",
            ticker, reason, score.label, score.score, score.source, headline
        );
        self.send(&format!("BnBot Skip {}", ticker), &body).await
    }

    pub async fn trade_exit(&self, ticker: &str, exit_price: f64, reason: &str) -> Result<()> {
        if !self.wants(|t| t.notify_exits) {
            return Ok(());
        }
        let body = format!(
            "🔻 EXIT {}\nExit Price: {:.2}\nReason: {}",
            ticker, exit_price, reason
        );
        self.send(&format!("BnBot Exit {}", ticker), &body).await
    }

    pub async fn error(&self, context: &str, message: &str) -> Result<()> {
        if !self.wants(|t| t.notify_errors) {
            return Ok(());
        }
        self.send("BnBot Error", &format!("{}: {}", context, message))
            .await
    }

    fn wants(&self, toggle: impl Fn(&TelegramConfig) -> bool) -> bool {
        self.telegram.as_ref().map(toggle).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sentiment;

    #[tokio::test]
    async fn test_disabled_notifier_is_silent_ok() {
        let notifier = Notifier::disabled();
        assert!(notifier.send("subject", "body").await.is_ok());
        assert!(notifier.startup().await.is_ok());
        let score = SentimentScore {
            label: Sentiment::Bullish,
            score: 0.8,
            source: "benzinga".to_string(),
        };
        assert!(notifier
            .trade_entry("AAPL", 50.0, 10_000.0, &score, "headline")
            .await
            .is_ok());
        assert!(notifier.trade_exit("AAPL", 45.0, "tsl_10%").await.is_ok());
    }
}
