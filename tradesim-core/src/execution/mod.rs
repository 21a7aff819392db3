//! Execution simulator: converts a requested price into a realistic fill
//!
//! - **Slippage** is directional: buys pay a premium, sells receive a discount.
//!   A long entry and a short exit buy; a short entry and a long exit sell.
//! - **Fees** are a flat percentage of the filled notional, charged per leg.
//! - **Gap rule** prices stop/target exits when the open jumped the level.

pub mod gap;
pub mod slippage;

pub use gap::{gapped_through, level_fill_price, LevelKind};
pub use slippage::SlippageModel;

use rust_decimal::Decimal;

use crate::config::BacktestConfig;
use crate::domain::{Side, Tick};

const BPS_DENOMINATOR: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Fill simulator shared by both drivers.
#[derive(Debug, Clone)]
pub struct ExecutionSimulator {
    slippage: SlippageModel,
    fee_pct: Decimal,
    /// Latest intrabar range in percent, fed to the slippage model
    volatility_pct: Decimal,
}

impl ExecutionSimulator {
    pub fn new(slippage: SlippageModel, fee_pct: Decimal) -> Self {
        Self {
            slippage,
            fee_pct,
            volatility_pct: Decimal::ZERO,
        }
    }

    /// Deterministic simulator for backtests: fixed bps slippage.
    pub fn from_config(config: &BacktestConfig) -> Self {
        Self::new(SlippageModel::fixed(config.slippage_bps), config.fee_pct)
    }

    pub fn frictionless() -> Self {
        Self::new(SlippageModel::fixed(Decimal::ZERO), Decimal::ZERO)
    }

    /// Update the volatility proxy from the tick being processed.
    pub fn observe(&mut self, tick: &Tick) {
        self.volatility_pct = tick.range_pct();
    }

    /// Execution price for a leg requested at `price`.
    pub fn fill(&mut self, price: Decimal, side: Side, is_entry: bool) -> Decimal {
        let bps = self.slippage.sample_bps(self.volatility_pct);
        if bps.is_zero() {
            return price;
        }
        let slip_fraction = bps / BPS_DENOMINATOR;
        if side.is_buy(is_entry) {
            price * (Decimal::ONE + slip_fraction)
        } else {
            price * (Decimal::ONE - slip_fraction)
        }
    }

    /// Fee for a leg of the given notional.
    pub fn fee(&self, notional: Decimal) -> Decimal {
        notional * self.fee_pct / Decimal::ONE_HUNDRED
    }

    pub fn fee_pct(&self) -> Decimal {
        self.fee_pct
    }

    pub fn slippage_model(&self) -> &SlippageModel {
        &self.slippage
    }
}
