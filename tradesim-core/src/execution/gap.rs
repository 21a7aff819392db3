//! Gap handling: price a stop/target exit when the tick opened beyond the level.
//!
//! Gap rule: if the open is already through the level, the fill happens at
//! the open (worse for stops, better for targets); otherwise at the level.

use rust_decimal::Decimal;

use crate::domain::{Side, Tick};

/// Which kind of exit level was crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelKind {
    /// Protective level below (long) / above (short) the price
    Stop,
    /// Profit level above (long) / below (short) the price
    Target,
}

/// True if the tick opened on the far side of `level`.
pub fn gapped_through(tick: &Tick, level: Decimal, side: Side, kind: LevelKind) -> bool {
    match (side, kind) {
        (Side::Long, LevelKind::Stop) | (Side::Short, LevelKind::Target) => tick.open <= level,
        (Side::Long, LevelKind::Target) | (Side::Short, LevelKind::Stop) => tick.open >= level,
    }
}

/// Raw (pre-slippage) exit price for a crossed level.
pub fn level_fill_price(tick: &Tick, level: Decimal, side: Side, kind: LevelKind) -> Decimal {
    if gapped_through(tick, level, side, kind) {
        tick.open
    } else {
        level
    }
}
