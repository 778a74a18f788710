//! Entry rule evaluation: VWAP, relative volume, resistance breakout
//!
//! All three checks are pure functions of the supplied bar window. VWAP is
//! cumulative over the whole window, not rolling. RVOL defaults to 1.0 when
//! there is not enough history, which can never pass a threshold >= 1.0, so
//! thin series are rejected implicitly.

use crate::config::EngineConfig;
use crate::types::{fmt_usd, BarSeries};

/// Why a headline was rejected instead of traded
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    SentimentNotBullish,
    NoPriceData,
    RulesNotMet,
    InsufficientCapital { required: f64, available: f64 },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::SentimentNotBullish => f.write_str("Sentiment not bullish"),
            SkipReason::NoPriceData => f.write_str("No price data"),
            SkipReason::RulesNotMet => f.write_str("VWAP/RVOL/Resistance not met"),
            SkipReason::InsufficientCapital {
                required,
                available,
            } => write!(
                f,
                "Insufficient capital: need {}, have {}",
                fmt_usd(*required),
                fmt_usd(*available)
            ),
        }
    }
}

/// Cumulative volume-weighted average price over the whole window.
/// `None` when the window is empty or carries no volume.
pub fn vwap(series: &BarSeries) -> Option<f64> {
    let mut price_volume = 0.0;
    let mut volume = 0.0;
    for bar in series.bars() {
        price_volume += bar.close * bar.volume;
        volume += bar.volume;
    }
    (volume > 0.0).then(|| price_volume / volume)
}

/// Latest bar volume over the mean volume of the `window` bars before it.
/// 1.0 when the series is shorter than `window + 1` bars or the mean is zero.
pub fn rvol(series: &BarSeries, window: usize) -> f64 {
    let bars = series.bars();
    let n = bars.len();
    if n < window + 1 {
        return 1.0;
    }
    let prior = &bars[n - 1 - window..n - 1];
    let avg = prior.iter().map(|b| b.volume).sum::<f64>() / window as f64;
    if avg == 0.0 {
        return 1.0;
    }
    bars[n - 1].volume / avg
}

/// Does the latest close exceed the recent high? The reference window is the
/// `lookback` bars immediately before the latest; when the series has at
/// most `lookback` bars, the max is taken over every high including the
/// latest bar's own.
pub fn breaks_resistance(series: &BarSeries, lookback: usize) -> bool {
    let bars = series.bars();
    let n = bars.len();
    let Some(last) = bars.last() else {
        return false;
    };

    let window = if n > lookback {
        &bars[n - 1 - lookback..n - 1]
    } else {
        bars
    };
    let recent_high = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    last.close > recent_high
}

/// Price-action gate applied after the sentiment gate
#[derive(Debug, Clone)]
pub struct EntryRules {
    pub rvol_threshold: f64,
    pub rvol_window: usize,
    pub resistance_lookback: usize,
}

impl Default for EntryRules {
    fn default() -> Self {
        Self {
            rvol_threshold: 1.5,
            rvol_window: 30,
            resistance_lookback: 20,
        }
    }
}

impl EntryRules {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            rvol_threshold: cfg.rvol_threshold,
            rvol_window: cfg.rvol_window,
            resistance_lookback: cfg.resistance_lookback,
        }
    }

    /// All of: close above VWAP, RVOL above threshold, resistance broken
    pub fn signal_confirmed(&self, series: &BarSeries) -> bool {
        let Some(last_close) = series.last_close() else {
            return false;
        };
        let Some(vwap) = vwap(series) else {
            return false;
        };

        last_close > vwap
            && rvol(series, self.rvol_window) > self.rvol_threshold
            && breaks_resistance(series, self.resistance_lookback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Bar;
    use chrono::{Duration, Utc};

    fn series(closes: &[f64], highs: &[f64], volumes: &[f64]) -> BarSeries {
        let t0 = Utc::now();
        let bars = closes
            .iter()
            .zip(highs)
            .zip(volumes)
            .enumerate()
            .map(|(i, ((&close, &high), &volume))| Bar {
                time: t0 + Duration::minutes(5 * i as i64),
                open: close,
                high,
                low: close.min(high),
                close,
                volume,
            })
            .collect();
        BarSeries::new(bars)
    }

    #[test]
    fn test_vwap_constant_volume_equals_mean_close() {
        let closes = [10.0, 12.0, 14.0, 16.0];
        let s = series(&closes, &closes, &[100.0; 4]);
        let expected = closes.iter().sum::<f64>() / closes.len() as f64;
        assert!((vwap(&s).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_vwap_weights_by_volume() {
        let s = series(&[10.0, 20.0], &[10.0, 20.0], &[300.0, 100.0]);
        // (10*300 + 20*100) / 400 = 12.5
        assert!((vwap(&s).unwrap() - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_vwap_no_volume_is_none() {
        let s = series(&[10.0, 11.0], &[10.0, 11.0], &[0.0, 0.0]);
        assert!(vwap(&s).is_none());
        assert!(vwap(&BarSeries::default()).is_none());
    }

    #[test]
    fn test_rvol_short_series_defaults_to_one() {
        // 30 bars is one short of window + 1
        let closes = vec![10.0; 30];
        let volumes = vec![5_000.0; 30];
        let s = series(&closes, &closes, &volumes);
        assert_eq!(rvol(&s, 30), 1.0);
    }

    #[test]
    fn test_rvol_ratio_excludes_latest_bar() {
        let mut volumes = vec![100.0; 30];
        volumes.push(250.0); // latest bar
        let closes = vec![10.0; 31];
        let s = series(&closes, &closes, &volumes);
        assert!((rvol(&s, 30) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_rvol_zero_average_defaults_to_one() {
        let mut volumes = vec![0.0; 30];
        volumes.push(500.0);
        let closes = vec![10.0; 31];
        let s = series(&closes, &closes, &volumes);
        assert_eq!(rvol(&s, 30), 1.0);
    }

    #[test]
    fn test_resistance_breakout_excludes_latest_high() {
        // lookback 3: 15 is compared to max(12, 9, 11) = 12
        let closes = [10.0, 12.0, 9.0, 11.0, 15.0];
        let highs = [10.0, 12.0, 9.0, 11.0, 15.0];
        let s = series(&closes, &highs, &[100.0; 5]);
        assert!(breaks_resistance(&s, 3));
    }

    #[test]
    fn test_resistance_not_broken() {
        let closes = [10.0, 16.0, 9.0, 11.0, 15.0];
        let highs = [10.0, 16.0, 9.0, 11.0, 15.0];
        let s = series(&closes, &highs, &[100.0; 5]);
        assert!(!breaks_resistance(&s, 3));
    }

    #[test]
    fn test_resistance_short_series_includes_latest() {
        // series no longer than the lookback: the latest bar's own high is in
        // the window, so close must exceed it
        let closes = [10.0, 11.0, 12.0];
        let highs = [10.0, 11.0, 12.5];
        let s = series(&closes, &highs, &[100.0; 3]);
        assert!(!breaks_resistance(&s, 3));

        // close above its own high does break (gap-style bar)
        let closes = [10.0, 11.0, 13.0];
        let highs = [10.0, 11.0, 12.5];
        let s = series(&closes, &highs, &[100.0; 3]);
        assert!(breaks_resistance(&s, 3));
    }

    #[test]
    fn test_signal_confirmed_composite() {
        // 31 quiet bars, then a high-volume breakout bar
        let mut closes = vec![10.0; 31];
        let mut highs = vec![10.2; 31];
        let mut volumes = vec![100.0; 31];
        closes.push(11.0);
        highs.push(11.0);
        volumes.push(300.0);
        let s = series(&closes, &highs, &volumes);

        let rules = EntryRules::default();
        assert!(rules.signal_confirmed(&s));

        // same shape with quiet volume on the breakout bar fails the RVOL gate
        let mut volumes = vec![100.0; 31];
        volumes.push(120.0);
        let s = series(&closes, &highs, &volumes);
        assert!(!rules.signal_confirmed(&s));
    }

    #[test]
    fn test_skip_reason_strings() {
        assert_eq!(SkipReason::SentimentNotBullish.to_string(), "Sentiment not bullish");
        assert_eq!(SkipReason::NoPriceData.to_string(), "No price data");
        assert_eq!(SkipReason::RulesNotMet.to_string(), "VWAP/RVOL/Resistance not met");
        let msg = SkipReason::InsufficientCapital {
            required: 10_000.0,
            available: 5_000.0,
        }
        .to_string();
        assert_eq!(msg, "Insufficient capital: need $10,000.00, have $5,000.00");
    }
}
