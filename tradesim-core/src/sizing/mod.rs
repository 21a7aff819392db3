//! Position Sizers: determine the notional of a new entry
//!
//! Sizers translate the current balance (and, for Kelly, the closed-trade
//! history) into a cash amount to commit.
//!
//! # Non-Responsibilities
//! - Sizers do NOT decide entry/exit (that's the signal's job)
//! - Sizers do NOT check the circuit breaker
//!
//! A zero notional means "no trade", never an error.

pub mod fixed;
pub mod kelly;

pub use fixed::FixedPercentSizer;
pub use kelly::KellySizer;

use rust_decimal::Decimal;

use crate::config::BacktestConfig;
use crate::domain::ClosedTrade;

/// Position sizing logic
pub trait Sizer: Send + Sync {
    /// Notional to commit to the next entry.
    ///
    /// # Arguments
    /// - `balance`: cash available right now
    /// - `history`: closed trades of this session, oldest first
    ///
    /// Returns zero when the entry should be skipped.
    fn notional(&self, balance: Decimal, history: &[ClosedTrade]) -> Decimal;

    /// Sizer name for logging
    fn name(&self) -> &str;
}

/// Build the sizer a config asks for.
pub fn sizer_from_config(config: &BacktestConfig) -> Box<dyn Sizer> {
    let fixed = FixedPercentSizer::from_config(config);
    if config.use_kelly {
        Box::new(KellySizer::new(
            fixed,
            config.kelly_min_trades,
            config.kelly_fraction,
        ))
    } else {
        Box::new(fixed)
    }
}
