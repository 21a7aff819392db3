//! Open position state and the FLAT / OPEN session variant.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::risk::ratchet::RatchetState;

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// Whether the order for this leg buys. Long entries and short exits buy.
    pub fn is_buy(self, is_entry: bool) -> bool {
        matches!((self, is_entry), (Side::Long, true) | (Side::Short, false))
    }
}

/// An open trade. Only exists inside [`PositionState::Open`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub entry_time: DateTime<Utc>,
    pub entry_fee: Decimal,
    /// `quantity * entry_price` at the fill.
    pub notional: Decimal,
    /// Ticks evaluated since entry (the entry tick itself is not counted).
    pub bars_held: usize,
    /// Most favourable price seen since entry: highest high for longs,
    /// lowest low for shorts.
    pub best_price: Decimal,
    /// Trailing stop level, unset until the activation profit is reached.
    pub trailing: RatchetState,
}

impl Position {
    pub fn new(
        side: Side,
        entry_price: Decimal,
        quantity: Decimal,
        entry_fee: Decimal,
        entry_time: DateTime<Utc>,
    ) -> Self {
        Self {
            side,
            entry_price,
            quantity,
            entry_time,
            entry_fee,
            notional: entry_price * quantity,
            bars_held: 0,
            best_price: entry_price,
            trailing: RatchetState::new(side),
        }
    }

    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    pub fn held_for(&self, now: DateTime<Utc>) -> Duration {
        now - self.entry_time
    }

    /// Gross PnL if the position were closed at `price`, before exit costs.
    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        match self.side {
            Side::Long => (price - self.entry_price) * self.quantity,
            Side::Short => (self.entry_price - price) * self.quantity,
        }
    }

    /// Cash value of the position marked at `price`: the reserved notional
    /// plus unrealized PnL.
    pub fn market_value(&self, price: Decimal) -> Decimal {
        self.notional + self.unrealized_pnl(price)
    }

    /// Best unrealized profit reached so far, in percent of the entry price.
    pub fn peak_profit_pct(&self) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        let favourable = match self.side {
            Side::Long => self.best_price - self.entry_price,
            Side::Short => self.entry_price - self.best_price,
        };
        favourable / self.entry_price * Decimal::ONE_HUNDRED
    }
}

/// Per-session position slot. Exit evaluation needs a `&Position`, so it
/// cannot be asked of a flat session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "position", rename_all = "snake_case")]
pub enum PositionState {
    #[default]
    Flat,
    Open(Position),
}

impl PositionState {
    pub fn is_open(&self) -> bool {
        matches!(self, PositionState::Open(_))
    }

    pub fn position(&self) -> Option<&Position> {
        match self {
            PositionState::Open(p) => Some(p),
            PositionState::Flat => None,
        }
    }

    pub fn position_mut(&mut self) -> Option<&mut Position> {
        match self {
            PositionState::Open(p) => Some(p),
            PositionState::Flat => None,
        }
    }

    /// Move out of the open state, leaving the slot flat.
    pub fn take(&mut self) -> Option<Position> {
        match std::mem::take(self) {
            PositionState::Open(p) => Some(p),
            PositionState::Flat => None,
        }
    }
}
