//! Risk management: per-position exit rules and the cross-position breaker.
//!
//! - [`RiskController`] decides whether an open position must close this tick
//! - [`CircuitBreaker`] decides whether a new position may open at all
//! - [`RatchetState`] keeps trailing-stop levels from loosening

pub mod circuit_breaker;
pub mod controller;
pub mod ratchet;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerState, TripReason};
pub use controller::{ExitDecision, RiskController};
pub use ratchet::RatchetState;
