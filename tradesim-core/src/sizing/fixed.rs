//! Fixed-percentage sizer: a constant share of the current balance.

use rust_decimal::Decimal;

use crate::config::BacktestConfig;
use crate::domain::ClosedTrade;
use crate::sizing::Sizer;

/// Commits `position_size_pct` of the balance, capped at `max_position_pct`
/// and at what the balance can pay including the entry fee.
#[derive(Debug, Clone)]
pub struct FixedPercentSizer {
    pub position_size_pct: Decimal,
    pub max_position_pct: Decimal,
    pub min_notional: Decimal,
    pub fee_pct: Decimal,
}

impl FixedPercentSizer {
    pub fn new(
        position_size_pct: Decimal,
        max_position_pct: Decimal,
        min_notional: Decimal,
        fee_pct: Decimal,
    ) -> Self {
        Self {
            position_size_pct,
            max_position_pct,
            min_notional,
            fee_pct,
        }
    }

    pub fn from_config(config: &BacktestConfig) -> Self {
        Self::new(
            config.position_size_pct,
            config.max_position_pct,
            config.min_notional,
            config.fee_pct,
        )
    }

    /// Largest notional whose entry fee still fits in `balance`.
    fn affordable(&self, balance: Decimal) -> Decimal {
        balance / (Decimal::ONE + self.fee_pct / Decimal::ONE_HUNDRED)
    }

    /// Apply the cap chain and the minimum to a proposed notional.
    pub(crate) fn bound(&self, balance: Decimal, proposed: Decimal) -> Decimal {
        let cap = balance * self.max_position_pct / Decimal::ONE_HUNDRED;
        let notional = proposed.min(cap).min(self.affordable(balance));
        if notional <= Decimal::ZERO || notional < self.min_notional {
            return Decimal::ZERO;
        }
        notional
    }
}

impl Sizer for FixedPercentSizer {
    fn notional(&self, balance: Decimal, _history: &[ClosedTrade]) -> Decimal {
        if balance <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let target = balance * self.position_size_pct / Decimal::ONE_HUNDRED;
        self.bound(balance, target)
    }

    fn name(&self) -> &str {
        "FixedPercent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sizer(pct: Decimal) -> FixedPercentSizer {
        FixedPercentSizer::new(pct, dec!(95), dec!(10), dec!(0.1))
    }

    #[test]
    fn two_percent_of_balance() {
        assert_eq!(sizer(dec!(2)).notional(dec!(10000), &[]), dec!(200));
    }

    #[test]
    fn capped_at_max_position_pct() {
        assert_eq!(sizer(dec!(100)).notional(dec!(1000), &[]), dec!(950));
    }

    #[test]
    fn capped_so_fee_fits_balance() {
        let s = FixedPercentSizer::new(dec!(100), dec!(100), dec!(0), dec!(1));
        let n = s.notional(dec!(1010), &[]);
        assert_eq!(n, dec!(1000));
        assert!(n + n * dec!(0.01) <= dec!(1010));
    }

    #[test]
    fn below_min_notional_is_zero() {
        // 2% of 400 = 8 < 10
        assert_eq!(sizer(dec!(2)).notional(dec!(400), &[]), Decimal::ZERO);
    }

    #[test]
    fn zero_balance_is_zero() {
        assert_eq!(sizer(dec!(2)).notional(Decimal::ZERO, &[]), Decimal::ZERO);
        assert_eq!(sizer(dec!(2)).notional(dec!(-5), &[]), Decimal::ZERO);
    }
}
