//! tradesim core: risk and execution state shared by backtest and shadow runs.
//!
//! This crate contains everything that happens inside one tick:
//! - Domain types (ticks, signals, positions, closed trades, equity points)
//! - Configuration and its validation
//! - Execution simulator (slippage, fees, gap rule)
//! - Position sizers (fixed percentage, Kelly)
//! - Risk controller with a fixed exit priority and ratcheting trailing stop
//! - Circuit breaker with cooldown and daily loss budget
//! - Trade recorder (balance, trade log, equity curve)
//! - The per-tick [`session::Session`] pipeline
//!
//! It performs no I/O and never awaits; drivers live in `tradesim-runner`.

pub mod config;
pub mod domain;
pub mod execution;
pub mod recorder;
pub mod risk;
pub mod session;
pub mod sizing;

pub use config::{BacktestConfig, CircuitBreakerConfig, ConfigError, RiskConfig};
pub use session::{EntryDecision, ExitEvent, Session, TickOutcome, TickReport};
