//! Position exit engine
//!
//! Polls every open position: ratchets the trailing peak, then applies the
//! trailing-stop rule and, only if that did not fire, the market-close
//! rule. Closes are conditional updates in the store, so a repeated poll
//! (or a second engine instance) finds the row already closed and does
//! nothing. A ticker with no fetchable bars is left untouched for the
//! cycle.

use crate::client::MarketData;
use crate::config::EngineConfig;
use crate::engine::session::SessionClock;
use crate::error::Result;
use crate::notify::Notifier;
use crate::storage::Database;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome counts for one exit cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitSummary {
    pub polled: usize,
    pub closed: usize,
}

pub struct ExitEngine {
    db: Database,
    market: Arc<dyn MarketData>,
    notifier: Notifier,
    session: SessionClock,
    cfg: EngineConfig,
}

impl ExitEngine {
    pub fn new(
        db: Database,
        market: Arc<dyn MarketData>,
        notifier: Notifier,
        session: SessionClock,
        cfg: EngineConfig,
    ) -> Self {
        Self {
            db,
            market,
            notifier,
            session,
            cfg,
        }
    }

    /// Run one poll over all open positions
    pub async fn run_once(&self) -> Result<ExitSummary> {
        let open = self.db.open_trades().await?;
        let mut summary = ExitSummary::default();

        for trade in open {
            summary.polled += 1;

            let bars = match self
                .market
                .bars(&trade.ticker, &self.cfg.timeframe, self.cfg.exit_bar_limit)
                .await
            {
                Ok(Some(bars)) if !bars.is_empty() => bars,
                Ok(_) => {
                    debug!("No bars for {}, skipping this cycle", trade.ticker);
                    continue;
                }
                Err(e) => {
                    warn!("Bar fetch failed for {}: {}", trade.ticker, e);
                    continue;
                }
            };
            let Some(last_price) = bars.last_close() else {
                continue;
            };

            let peak = trade
                .peak_price
                .or(trade.entry_price)
                .unwrap_or(last_price)
                .max(last_price);
            if Some(peak) != trade.peak_price {
                self.db.update_peak(trade.id, peak).await?;
            }

            let drop_pct = if peak > 0.0 {
                (peak - last_price) / peak * 100.0
            } else {
                0.0
            };

            // trailing stop wins over the market-close rule in the same poll
            if drop_pct >= trade.trailing_stop_loss {
                let reason = format!("tsl_{}%", trade.trailing_stop_loss);
                if self.db.close_trade(trade.id, last_price, &reason).await? {
                    summary.closed += 1;
                    info!(
                        "Closed trade {} ({}) @ {:.2}: drop {:.2}% >= TSL {}%",
                        trade.id, trade.ticker, last_price, drop_pct, trade.trailing_stop_loss
                    );
                    let _ = self
                        .notifier
                        .trade_exit(&trade.ticker, last_price, &reason)
                        .await;
                }
                continue;
            }

            if trade.market_close_exit && self.session.past_close() {
                if self.db.close_trade(trade.id, last_price, "market_close").await? {
                    summary.closed += 1;
                    info!(
                        "Closed trade {} ({}) @ {:.2}: market close",
                        trade.id, trade.ticker, last_price
                    );
                    let _ = self
                        .notifier
                        .trade_exit(&trade.ticker, last_price, "market_close")
                        .await;
                }
            }
        }

        Ok(summary)
    }
}
