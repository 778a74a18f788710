//! Position sizing
//!
//! Whole shares, floor of budget over price, but never fewer than one
//! share. When a single share costs more than the budget the realized
//! notional exceeds the budget; that floor is deliberate and the capital
//! accounting upstream knows about it.

/// Sized entry: share count and realized notional
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSize {
    pub shares: i64,
    pub notional: f64,
}

/// Convert a dollar budget into whole shares at `entry_price`.
/// Prices are floored at one cent to keep the division sane.
pub fn size_position(budget: f64, entry_price: f64) -> PositionSize {
    let shares = ((budget / entry_price.max(0.01)).floor() as i64).max(1);
    PositionSize {
        shares,
        notional: shares as f64 * entry_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_of_budget_over_price() {
        let size = size_position(10_000.0, 50.0);
        assert_eq!(size.shares, 200);
        assert_eq!(size.notional, 10_000.0);

        let size = size_position(10_000.0, 333.0);
        assert_eq!(size.shares, 30);
        assert_eq!(size.notional, 9_990.0);
    }

    #[test]
    fn test_minimum_one_share_even_when_unaffordable() {
        // a single share above budget is still bought
        let size = size_position(10_000.0, 15_000.0);
        assert_eq!(size.shares, 1);
        assert_eq!(size.notional, 15_000.0);
        assert!(size.notional > 10_000.0);
    }

    #[test]
    fn test_penny_floor_on_price() {
        // sub-cent prices are treated as one cent
        let size = size_position(100.0, 0.001);
        assert_eq!(size.shares, 10_000);
    }
}
