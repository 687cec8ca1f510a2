//! Portfolio high-water mark and drawdown

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Singleton portfolio snapshot
///
/// `peak_value_zar` and `max_drawdown_pct` never decrease across updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    /// Current portfolio value
    pub total_value_zar: Decimal,
    /// High-water mark
    pub peak_value_zar: Decimal,
    /// Decline from the high-water mark, in percent
    pub current_drawdown_pct: Decimal,
    /// Worst drawdown ever observed, in percent
    pub max_drawdown_pct: Decimal,
    pub last_updated: DateTime<Utc>,
    /// Incremented on every persisted write, zero for an unpersisted default
    pub version: u64,
}

impl PortfolioState {
    /// Fresh state at the given starting value
    pub fn initial(starting_value: Decimal) -> Self {
        Self {
            total_value_zar: starting_value,
            peak_value_zar: starting_value,
            current_drawdown_pct: dec!(0),
            max_drawdown_pct: dec!(0),
            last_updated: Utc::now(),
            version: 0,
        }
    }

    /// State after marking the portfolio at `new_total_value`
    pub fn revalue(&self, new_total_value: Decimal, at: DateTime<Utc>) -> Self {
        let peak = self.peak_value_zar.max(new_total_value);
        let drawdown = drawdown_pct(peak, new_total_value);

        Self {
            total_value_zar: new_total_value,
            peak_value_zar: peak,
            current_drawdown_pct: drawdown,
            max_drawdown_pct: self.max_drawdown_pct.max(drawdown),
            last_updated: at,
            version: self.version + 1,
        }
    }

    /// Whether the invariants hold
    pub fn is_consistent(&self) -> bool {
        self.peak_value_zar >= self.total_value_zar
            && self.current_drawdown_pct >= Decimal::ZERO
            && self.max_drawdown_pct >= self.current_drawdown_pct
    }
}

/// `(peak - total) / peak * 100`, zero when peak is not positive, never negative
pub fn drawdown_pct(peak: Decimal, total: Decimal) -> Decimal {
    if peak <= Decimal::ZERO {
        return dec!(0);
    }
    ((peak - total) / peak * dec!(100)).max(dec!(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drawdown_then_recovery() {
        let now = Utc::now();
        let state = PortfolioState::initial(dec!(100000));

        let down = state.revalue(dec!(90000), now);
        assert_eq!(down.current_drawdown_pct, dec!(10));
        assert_eq!(down.max_drawdown_pct, dec!(10));
        assert_eq!(down.peak_value_zar, dec!(100000));

        let up = down.revalue(dec!(120000), now);
        assert_eq!(up.peak_value_zar, dec!(120000));
        assert_eq!(up.current_drawdown_pct, dec!(0));
        assert_eq!(up.max_drawdown_pct, dec!(10));
        assert!(up.is_consistent());
    }

    #[test]
    fn test_new_peak() {
        let state = PortfolioState::initial(dec!(1000)).revalue(dec!(1100), Utc::now());
        assert_eq!(state.peak_value_zar, dec!(1100));
        assert_eq!(state.current_drawdown_pct, dec!(0));
    }

    #[test]
    fn test_version_increments() {
        let state = PortfolioState::initial(dec!(1000));
        assert_eq!(state.version, 0);
        let next = state.revalue(dec!(990), Utc::now()).revalue(dec!(980), Utc::now());
        assert_eq!(next.version, 2);
    }

    #[test]
    fn test_zero_peak_has_no_drawdown() {
        let state = PortfolioState::initial(dec!(0)).revalue(dec!(0), Utc::now());
        assert_eq!(state.current_drawdown_pct, dec!(0));
        assert!(state.is_consistent());
    }

    #[test]
    fn test_monotone_over_sequence() {
        let values = [
            dec!(100),
            dec!(80),
            dec!(95),
            dec!(60),
            dec!(130),
            dec!(120),
            dec!(140),
            dec!(10),
        ];
        let mut state = PortfolioState::initial(dec!(100));
        for value in values {
            let next = state.revalue(value, Utc::now());
            assert!(next.peak_value_zar >= state.peak_value_zar);
            assert!(next.max_drawdown_pct >= state.max_drawdown_pct);
            assert!(next.is_consistent());
            state = next;
        }
        // 140 -> 10 is the worst decline
        assert_eq!(state.max_drawdown_pct, (dec!(130) / dec!(140)) * dec!(100));
    }
}
