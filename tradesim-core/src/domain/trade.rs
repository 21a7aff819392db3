//! ClosedTrade: a completed round trip, created when a position closes.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::position::Side;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Signal,
    StopLoss,
    TakeProfit,
    TrailingStop,
    MaxHoldTime,
    EndOfData,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Signal => "signal",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::MaxHoldTime => "max_hold_time",
            ExitReason::EndOfData => "end_of_data",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete round-trip trade record: entry → exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    // ── Identification ──
    pub trade_id: u64,
    pub side: Side,

    // ── Entry ──
    pub entry_time: DateTime<Utc>,
    pub entry_price: Decimal,

    // ── Exit ──
    pub exit_time: DateTime<Utc>,
    pub exit_price: Decimal,
    pub exit_reason: ExitReason,

    // ── Size ──
    pub quantity: Decimal,
    pub notional: Decimal,

    // ── PnL ──
    pub gross_pnl: Decimal,
    /// Gross PnL minus the exit fee. The entry fee was taken from the
    /// balance when the position opened.
    pub pnl: Decimal,
    /// `pnl` relative to the entry notional, in percent.
    pub pnl_pct: Decimal,
    pub entry_fee: Decimal,
    pub exit_fee: Decimal,

    // ── Duration ──
    pub bars_held: usize,
    pub hold_secs: i64,
}

impl ClosedTrade {
    pub fn is_winner(&self) -> bool {
        self.pnl > Decimal::ZERO
    }

    pub fn is_loser(&self) -> bool {
        self.pnl < Decimal::ZERO
    }

    pub fn total_fees(&self) -> Decimal {
        self.entry_fee + self.exit_fee
    }

    /// PnL after both legs' fees.
    pub fn net_of_all_fees(&self) -> Decimal {
        self.pnl - self.entry_fee
    }

    pub fn hold_duration(&self) -> Duration {
        Duration::seconds(self.hold_secs)
    }
}
