//! Historical evaluation
//!
//! Replays the live entry rules over a historical news range, then walks a
//! trailing stop forward from a nominal entry bar to approximate the exit.
//! This is an ad-hoc estimate against trailing bar windows, not a tick
//! replay; it shares the sentiment chain and entry rules with the live
//! pipeline so rule changes are evaluated with the same code that trades.

use crate::client::{MarketData, NewsFeed};
use crate::engine::rules::EntryRules;
use crate::error::Result;
use crate::sentiment::SentimentEngine;
use crate::types::{BarSeries, SentimentScore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

/// Simulation knobs
#[derive(Debug, Clone)]
pub struct BacktestParams {
    pub rvol_threshold: f64,
    pub tsl_pct: f64,
    /// Bars walked after entry before a timed exit
    pub horizon: usize,
    pub timeframe: String,
    pub bar_limit: usize,
}

impl Default for BacktestParams {
    fn default() -> Self {
        Self {
            rvol_threshold: 1.5,
            tsl_pct: 10.0,
            horizon: 20,
            timeframe: "5Min".to_string(),
            bar_limit: 240,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimResult {
    Skipped,
    Closed,
}

/// One simulated evaluation of an article/ticker pair
#[derive(Debug, Clone)]
pub struct SimulatedTrade {
    pub ticker: String,
    pub headline: String,
    pub sentiment: SentimentScore,
    pub entry_price: Option<f64>,
    pub exit_price: Option<f64>,
    pub roi_pct: Option<f64>,
    pub result: SimResult,
    pub reason: String,
}

/// Aggregate results over a simulation
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BacktestReport {
    pub evaluated: usize,
    pub trades: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub avg_roi: f64,
    pub total_pnl: f64,
    pub max_drawdown: f64,
}

pub struct Backtester {
    news: Arc<dyn NewsFeed>,
    market: Arc<dyn MarketData>,
    sentiment: SentimentEngine,
    rules: EntryRules,
    params: BacktestParams,
}

impl Backtester {
    pub fn new(
        news: Arc<dyn NewsFeed>,
        market: Arc<dyn MarketData>,
        sentiment: SentimentEngine,
        params: BacktestParams,
    ) -> Self {
        let rules = EntryRules {
            rvol_threshold: params.rvol_threshold,
            ..EntryRules::default()
        };
        Self {
            news,
            market,
            sentiment,
            rules,
            params,
        }
    }

    /// Fetch a news range and simulate every article/ticker pair
    pub async fn run(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tickers: &[String],
    ) -> Result<(Vec<SimulatedTrade>, BacktestReport)> {
        let articles = self.news.range(start, end, tickers).await?;
        info!("Backtesting {} articles", articles.len());

        let mut trades = Vec::new();
        for article in &articles {
            let score = self
                .sentiment
                .score(&article.headline, article.provider_sentiment.as_deref());

            for ticker in &article.tickers {
                let sim = self.simulate_one(ticker, &article.headline, &score).await?;
                trades.push(sim);
            }
        }

        let report = summarize(&trades);
        Ok((trades, report))
    }

    async fn simulate_one(
        &self,
        ticker: &str,
        headline: &str,
        score: &SentimentScore,
    ) -> Result<SimulatedTrade> {
        let skipped = |reason: &str| SimulatedTrade {
            ticker: ticker.to_string(),
            headline: headline.to_string(),
            sentiment: score.clone(),
            entry_price: None,
            exit_price: None,
            roi_pct: None,
            result: SimResult::Skipped,
            reason: reason.to_string(),
        };

        let bars = match self
            .market
            .bars(ticker, &self.params.timeframe, self.params.bar_limit)
            .await?
        {
            Some(bars) if !bars.is_empty() => bars,
            _ => return Ok(skipped("No price data")),
        };

        if !score.label.is_bullish() || !self.rules.signal_confirmed(&bars) {
            return Ok(skipped("Rules not met"));
        }

        let (entry, exit, reason) = walk_trailing_stop(&bars, self.params.tsl_pct, self.params.horizon);
        let roi = if entry > 0.0 {
            ((exit - entry) / entry * 100.0 * 100.0).round() / 100.0
        } else {
            0.0
        };

        Ok(SimulatedTrade {
            ticker: ticker.to_string(),
            headline: headline.to_string(),
            sentiment: score.clone(),
            entry_price: Some(entry),
            exit_price: Some(exit),
            roi_pct: Some(roi),
            result: SimResult::Closed,
            reason,
        })
    }
}

/// Enter at the bar `horizon + 1` from the end and walk forward, exiting on
/// a `tsl_pct` drawdown from the running peak or flat at the final bar.
fn walk_trailing_stop(bars: &BarSeries, tsl_pct: f64, horizon: usize) -> (f64, f64, String) {
    let bars = bars.bars();
    let n = bars.len();
    let entry_idx = n.saturating_sub(horizon + 1);
    let entry = bars[entry_idx].close;
    let mut peak = entry;

    for bar in &bars[entry_idx + 1..n] {
        let px = bar.close;
        peak = peak.max(px);
        if peak > 0.0 && (peak - px) / peak >= tsl_pct / 100.0 {
            return (entry, px, format!("TSL {}%", tsl_pct));
        }
    }

    (entry, bars[n - 1].close, "Timed exit".to_string())
}

/// Aggregate closed simulations into a report; drawdown is the crude
/// peak-to-trough of the cumulative per-trade PnL curve.
pub fn summarize(trades: &[SimulatedTrade]) -> BacktestReport {
    let closed: Vec<&SimulatedTrade> = trades
        .iter()
        .filter(|t| t.result == SimResult::Closed)
        .collect();

    let count = closed.len();
    if count == 0 {
        return BacktestReport {
            evaluated: trades.len(),
            ..BacktestReport::default()
        };
    }

    let wins = closed
        .iter()
        .filter(|t| t.roi_pct.unwrap_or(0.0) > 0.0)
        .count();
    let avg_roi = closed.iter().filter_map(|t| t.roi_pct).sum::<f64>() / count as f64;
    let total_pnl: f64 = closed
        .iter()
        .filter_map(|t| match (t.exit_price, t.entry_price) {
            (Some(exit), Some(entry)) => Some(exit - entry),
            _ => None,
        })
        .sum();

    let mut equity = 0.0;
    let mut peak = 0.0f64;
    let mut max_drawdown = 0.0f64;
    for trade in &closed {
        if let (Some(exit), Some(entry)) = (trade.exit_price, trade.entry_price) {
            equity += exit - entry;
            peak = peak.max(equity);
            max_drawdown = max_drawdown.max(peak - equity);
        }
    }

    BacktestReport {
        evaluated: trades.len(),
        trades: count,
        wins,
        win_rate: (wins as f64 / count as f64 * 100.0 * 100.0).round() / 100.0,
        avg_roi: (avg_roi * 100.0).round() / 100.0,
        total_pnl: (total_pnl * 100.0).round() / 100.0,
        max_drawdown: (max_drawdown * 100.0).round() / 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bar, Sentiment};
    use chrono::{Duration, Utc};

    fn series(closes: &[f64]) -> BarSeries {
        let t0 = Utc::now();
        BarSeries::new(
            closes
                .iter()
                .enumerate()
                .map(|(i, &c)| Bar {
                    time: t0 + Duration::minutes(5 * i as i64),
                    open: c,
                    high: c,
                    low: c,
                    close: c,
                    volume: 100.0,
                })
                .collect(),
        )
    }

    fn sim(entry: f64, exit: f64) -> SimulatedTrade {
        let roi = (exit - entry) / entry * 100.0;
        SimulatedTrade {
            ticker: "AAPL".to_string(),
            headline: "h".to_string(),
            sentiment: SentimentScore {
                label: Sentiment::Bullish,
                score: 0.8,
                source: "benzinga".to_string(),
            },
            entry_price: Some(entry),
            exit_price: Some(exit),
            roi_pct: Some(roi),
            result: SimResult::Closed,
            reason: "Timed exit".to_string(),
        }
    }

    #[test]
    fn test_walk_hits_trailing_stop() {
        // entry 100, runs to 120, then collapses through the 10% stop
        let closes = [100.0, 110.0, 120.0, 115.0, 105.0, 101.0];
        let s = series(&closes);
        let (entry, exit, reason) = walk_trailing_stop(&s, 10.0, 5);
        assert_eq!(entry, 100.0);
        assert_eq!(exit, 105.0); // first bar at or past 10% off the 120 peak
        assert_eq!(reason, "TSL 10%");
    }

    #[test]
    fn test_walk_times_out_flat() {
        let closes = [100.0, 102.0, 104.0, 103.0, 106.0];
        let s = series(&closes);
        let (entry, exit, reason) = walk_trailing_stop(&s, 10.0, 4);
        assert_eq!(entry, 100.0);
        assert_eq!(exit, 106.0);
        assert_eq!(reason, "Timed exit");
    }

    #[test]
    fn test_walk_entry_index_with_long_series() {
        // horizon 3 on 10 bars: entry at index 6
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let s = series(&closes);
        let (entry, exit, reason) = walk_trailing_stop(&s, 10.0, 3);
        assert_eq!(entry, 106.0);
        assert_eq!(exit, 109.0);
        assert_eq!(reason, "Timed exit");
    }

    #[test]
    fn test_summarize_mixed_results() {
        let trades = vec![
            sim(100.0, 110.0), // +10
            sim(100.0, 95.0),  // -5
            sim(50.0, 55.0),   // +5
        ];
        let report = summarize(&trades);
        assert_eq!(report.trades, 3);
        assert_eq!(report.wins, 2);
        assert_eq!(report.win_rate, 66.67);
        assert_eq!(report.total_pnl, 10.0);
        // equity walks +10, +5, +10: trough after the loser is 5 off the peak
        assert_eq!(report.max_drawdown, 5.0);
    }

    #[test]
    fn test_summarize_empty_and_skipped_only() {
        assert_eq!(summarize(&[]).trades, 0);

        let skipped = SimulatedTrade {
            ticker: "AAPL".to_string(),
            headline: "h".to_string(),
            sentiment: SentimentScore {
                label: Sentiment::Neutral,
                score: 0.0,
                source: "lexicon".to_string(),
            },
            entry_price: None,
            exit_price: None,
            roi_pct: None,
            result: SimResult::Skipped,
            reason: "No price data".to_string(),
        };
        let report = summarize(&[skipped]);
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.trades, 0);
        assert_eq!(report.win_rate, 0.0);
    }
}
