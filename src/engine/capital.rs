//! Capital policy: settings → per-trade dollar budget

use crate::types::{CapitalMode, Settings};

/// Dollar budget allocated to a single entry
pub fn per_trade_budget(settings: &Settings) -> f64 {
    match settings.capital_mode {
        CapitalMode::Percent => settings.account_size * settings.capital_value / 100.0,
        CapitalMode::Dollar => settings.capital_value,
    }
}
