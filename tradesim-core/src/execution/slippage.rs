//! Slippage models: how many basis points a fill moves against the trader.
//!
//! - `Fixed`: constant bps, fully deterministic (backtests)
//! - `Stochastic`: fixed bps plus a bounded random component scaled by the
//!   tick's intrabar range (shadow mode). Always seeded.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Slippage model
#[derive(Debug, Clone)]
pub enum SlippageModel {
    /// Constant cost in basis points (e.g., 5 = 0.05%)
    Fixed { bps: Decimal },

    /// Base bps plus up to `max_extra_bps` drawn from a seeded RNG
    Stochastic {
        bps: Decimal,
        max_extra_bps: Decimal,
        rng: ChaCha8Rng,
    },
}

impl SlippageModel {
    pub fn fixed(bps: Decimal) -> Self {
        Self::Fixed { bps }
    }

    pub fn stochastic(bps: Decimal, max_extra_bps: Decimal, seed: u64) -> Self {
        Self::Stochastic {
            bps,
            max_extra_bps,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Shadow-mode model: random only when a seed is supplied, otherwise the
    /// same deterministic formula the backtest uses.
    pub fn for_shadow(bps: Decimal, max_extra_bps: Decimal, seed: Option<u64>) -> Self {
        match seed {
            Some(seed) if max_extra_bps > Decimal::ZERO => {
                Self::stochastic(bps, max_extra_bps, seed)
            }
            _ => Self::fixed(bps),
        }
    }

    /// Slippage for the next fill, in basis points.
    ///
    /// `volatility_pct` is the intrabar range in percent of price; the random
    /// component is scaled by it, capped at 1.
    pub fn sample_bps(&mut self, volatility_pct: Decimal) -> Decimal {
        match self {
            Self::Fixed { bps } => *bps,
            Self::Stochastic {
                bps,
                max_extra_bps,
                rng,
            } => {
                let u: f64 = rng.gen();
                let u = Decimal::from_f64(u).unwrap_or(Decimal::ZERO).round_dp(6);
                let scale = volatility_pct.max(Decimal::ZERO).min(Decimal::ONE);
                *bps + u * *max_extra_bps * scale
            }
        }
    }

    pub fn is_deterministic(&self) -> bool {
        matches!(self, Self::Fixed { .. })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Fixed { .. } => "FixedSlippage",
            Self::Stochastic { .. } => "StochasticSlippage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fixed_ignores_volatility() {
        let mut model = SlippageModel::fixed(dec!(5));
        assert_eq!(model.sample_bps(dec!(0)), dec!(5));
        assert_eq!(model.sample_bps(dec!(3)), dec!(5));
        assert!(model.is_deterministic());
    }

    #[test]
    fn shadow_without_seed_is_fixed() {
        let model = SlippageModel::for_shadow(dec!(5), dec!(10), None);
        assert!(model.is_deterministic());
        assert_eq!(model.name(), "FixedSlippage");
    }

    #[test]
    fn stochastic_is_bounded() {
        let mut model = SlippageModel::stochastic(dec!(5), dec!(10), 7);
        for _ in 0..200 {
            let bps = model.sample_bps(dec!(2));
            assert!(bps >= dec!(5));
            assert!(bps <= dec!(15));
        }
    }

    #[test]
    fn stochastic_same_seed_same_sequence() {
        let mut a = SlippageModel::stochastic(dec!(5), dec!(10), 42);
        let mut b = SlippageModel::stochastic(dec!(5), dec!(10), 42);
        for _ in 0..20 {
            assert_eq!(a.sample_bps(dec!(1)), b.sample_bps(dec!(1)));
        }
    }

    #[test]
    fn stochastic_zero_range_adds_nothing() {
        let mut model = SlippageModel::stochastic(dec!(5), dec!(10), 3);
        assert_eq!(model.sample_bps(Decimal::ZERO), dec!(5));
    }
}
