//! Kelly criterion

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Kelly criterion calculator for a bet paying `payoff_ratio : 1`
#[derive(Debug, Clone, Copy)]
pub struct KellyCalculator {
    /// Fractional Kelly safety factor (e.g., 0.25 for quarter Kelly)
    pub fraction: Decimal,
    /// Win/loss ratio `b`
    pub payoff_ratio: Decimal,
}

impl KellyCalculator {
    /// Create a new Kelly calculator
    pub fn new(fraction: Decimal, payoff_ratio: Decimal) -> Self {
        Self {
            fraction,
            payoff_ratio,
        }
    }

    /// Full Kelly fraction for win probability `p`
    ///
    /// f* = (p*b - q) / b, floored at zero. A non-positive payoff never bets.
    pub fn raw(&self, win_probability: Decimal) -> Decimal {
        if self.payoff_ratio <= dec!(0) {
            return dec!(0);
        }
        let q = Decimal::ONE - win_probability;
        let f = (win_probability * self.payoff_ratio - q) / self.payoff_ratio;
        f.max(dec!(0))
    }

    /// Raw Kelly scaled by the safety factor
    pub fn fractional(&self, win_probability: Decimal) -> Decimal {
        self.raw(win_probability) * self.fraction
    }
}

impl Default for KellyCalculator {
    fn default() -> Self {
        Self::new(dec!(0.25), dec!(2.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kelly_calculation() {
        let calc = KellyCalculator::default();

        // (0.75 * 2 - 0.25) / 2 = 0.625
        assert_eq!(calc.raw(dec!(0.75)), dec!(0.625));
        // Quarter Kelly
        assert_eq!(calc.fractional(dec!(0.75)), dec!(0.15625));
    }

    #[test]
    fn test_kelly_no_edge() {
        let calc = KellyCalculator::default();
        // Break-even at p = 1 / (1 + b)
        assert_eq!(calc.raw(dec!(0.30)), dec!(0));
        assert_eq!(calc.raw(dec!(0)), dec!(0));
    }

    #[test]
    fn test_kelly_certain_win() {
        let calc = KellyCalculator::default();
        assert_eq!(calc.raw(dec!(1)), dec!(1));
    }

    #[test]
    fn test_kelly_never_negative() {
        let calc = KellyCalculator::new(dec!(0.5), dec!(1.5));
        for i in 0..=100 {
            let p = Decimal::new(i, 2);
            assert!(calc.raw(p) >= dec!(0));
            assert!(calc.fractional(p) <= calc.raw(p));
        }
    }

    #[test]
    fn test_zero_payoff() {
        let calc = KellyCalculator::new(dec!(0.25), dec!(0));
        assert_eq!(calc.raw(dec!(0.9)), dec!(0));
    }
}
