//! Tests for core domain types

#[cfg(test)]
mod tests {
    use super::super::types::*;
    use chrono::Utc;

    fn trade_row() -> TradeRecord {
        TradeRecord {
            id: 1,
            news_id: Some(10),
            ticker: "AAPL".to_string(),
            headline: "Apple beats estimates".to_string(),
            sentiment: Some("bullish".to_string()),
            sentiment_score: Some(0.8),
            sentiment_source: Some("benzinga".to_string()),
            entry_price: None,
            entry_amount: None,
            entry_time: Some(Utc::now()),
            exit_price: None,
            exit_time: None,
            exit_reason: None,
            skip_reason: None,
            trailing_stop_loss: 10.0,
            market_close_exit: true,
            peak_price: None,
        }
    }

    #[test]
    fn test_sentiment_labels_round_trip() {
        for label in ["very bullish", "bullish", "neutral", "bearish", "very bearish"] {
            let parsed = Sentiment::from_label(label).unwrap();
            assert_eq!(parsed.as_str(), label);
        }
        assert!(Sentiment::from_label("mixed").is_none());
    }

    #[test]
    fn test_sentiment_bullish_gate() {
        assert!(Sentiment::Bullish.is_bullish());
        assert!(Sentiment::VeryBullish.is_bullish());
        assert!(!Sentiment::Neutral.is_bullish());
        assert!(!Sentiment::Bearish.is_bullish());
        assert!(!Sentiment::VeryBearish.is_bullish());
    }

    #[test]
    fn test_trade_status_tri_state() {
        let mut skip = trade_row();
        skip.skip_reason = Some("Sentiment not bullish".to_string());
        assert_eq!(skip.status(), TradeStatus::Skipped);

        let mut open = trade_row();
        open.entry_price = Some(50.0);
        open.entry_amount = Some(10_000.0);
        assert_eq!(open.status(), TradeStatus::Open);

        let mut closed = trade_row();
        closed.entry_price = Some(50.0);
        closed.entry_amount = Some(10_000.0);
        closed.exit_price = Some(55.0);
        closed.exit_reason = Some("market_close".to_string());
        assert_eq!(closed.status(), TradeStatus::Closed);
    }

    #[test]
    fn test_trade_shares_from_notional() {
        let mut open = trade_row();
        open.entry_price = Some(50.0);
        open.entry_amount = Some(10_000.0);
        assert_eq!(open.shares(), Some(200.0));

        let skip = trade_row();
        assert_eq!(skip.shares(), None);
    }

    #[test]
    fn test_capital_mode_fails_closed() {
        assert_eq!(CapitalMode::parse("dollar"), CapitalMode::Dollar);
        assert_eq!(CapitalMode::parse("percent"), CapitalMode::Percent);
        assert_eq!(CapitalMode::parse("garbage"), CapitalMode::Percent);
        assert_eq!(CapitalMode::parse(""), CapitalMode::Percent);
    }

    #[test]
    fn test_settings_defaults() {
        let s = Settings::default();
        assert_eq!(s.capital_mode, CapitalMode::Percent);
        assert_eq!(s.capital_value, 10.0);
        assert_eq!(s.account_size, 100_000.0);
        assert!(s.paper_trading);
    }

    #[test]
    fn test_bar_series_sorts_by_time() {
        let t0 = Utc::now();
        let later = Bar {
            time: t0 + chrono::Duration::minutes(5),
            open: 2.0,
            high: 2.0,
            low: 2.0,
            close: 2.0,
            volume: 100.0,
        };
        let earlier = Bar {
            time: t0,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 100.0,
        };

        let series = BarSeries::new(vec![later, earlier]);
        assert_eq!(series.len(), 2);
        assert_eq!(series.last_close(), Some(2.0));
        assert_eq!(series.bars()[0].close, 1.0);
    }

    #[test]
    fn test_fmt_usd_grouping() {
        assert_eq!(fmt_usd(10_000.0), "$10,000.00");
        assert_eq!(fmt_usd(999.5), "$999.50");
        assert_eq!(fmt_usd(1_234_567.891), "$1,234,567.89");
        assert_eq!(fmt_usd(0.0), "$0.00");
        assert_eq!(fmt_usd(-5_000.0), "-$5,000.00");
    }
}
