//! Kelly-criterion sizer
//!
//! Uses the session's own closed trades to estimate the Kelly fraction
//! `f = (p·b − (1−p)) / b`, where `p` is the win rate and `b` the ratio of
//! average win to average loss. The fraction is scaled by a safety multiplier
//! (half-Kelly by default) and may only *shrink* the fixed-percentage size.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::domain::ClosedTrade;
use crate::sizing::{FixedPercentSizer, Sizer};

#[derive(Debug, Clone)]
pub struct KellySizer {
    base: FixedPercentSizer,
    /// History length before Kelly is consulted
    min_trades: usize,
    /// Safety multiplier on the raw fraction (0.5 = half-Kelly)
    fraction: Decimal,
}

impl KellySizer {
    pub fn new(base: FixedPercentSizer, min_trades: usize, fraction: f64) -> Self {
        Self {
            base,
            min_trades,
            fraction: Decimal::from_f64(fraction).unwrap_or(Decimal::ZERO),
        }
    }

    /// Scaled Kelly fraction of the balance, clamped at zero.
    ///
    /// `None` while the history is too short, or when it has no wins or no
    /// losses (the win/loss ratio is undefined).
    pub fn kelly_fraction(&self, history: &[ClosedTrade]) -> Option<Decimal> {
        if history.len() < self.min_trades {
            return None;
        }
        let (mut wins, mut win_sum) = (0u32, Decimal::ZERO);
        let (mut losses, mut loss_sum) = (0u32, Decimal::ZERO);
        for trade in history {
            if trade.is_winner() {
                wins += 1;
                win_sum += trade.pnl;
            } else if trade.is_loser() {
                losses += 1;
                loss_sum += trade.pnl.abs();
            }
        }
        if wins == 0 || losses == 0 {
            return None;
        }

        let avg_win = win_sum / Decimal::from(wins);
        let avg_loss = loss_sum / Decimal::from(losses);
        let b = avg_win / avg_loss;
        let p = Decimal::from(wins) / Decimal::from(history.len() as u64);
        let raw = (p * b - (Decimal::ONE - p)) / b;
        Some((raw * self.fraction).max(Decimal::ZERO))
    }
}

impl Sizer for KellySizer {
    fn notional(&self, balance: Decimal, history: &[ClosedTrade]) -> Decimal {
        let fixed = self.base.notional(balance, history);
        match self.kelly_fraction(history) {
            Some(f) => {
                let kelly = balance * f;
                if kelly < fixed {
                    self.base.bound(balance, kelly)
                } else {
                    fixed
                }
            }
            None => fixed,
        }
    }

    fn name(&self) -> &str {
        "Kelly"
    }
}
