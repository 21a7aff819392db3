//! Domain types for tradesim

pub mod equity;
pub mod position;
pub mod tick;
pub mod trade;

pub use equity::EquityPoint;
pub use position::{Position, PositionState, Side};
pub use tick::{Signal, Tick};
pub use trade::{ClosedTrade, ExitReason};
