//! Tradesim runner: drives `tradesim-core` sessions and summarizes them.
//!
//! - [`BacktestDriver`] over a materialized tick slice
//! - [`ShadowDriver`] over an async tick stream, with events, suggestions
//!   and breaker persistence
//! - [`run_parallel`] for independent backtests on a rayon pool
//! - [`PerformanceMetrics`] and the serializable [`SessionResult`]

pub mod backtest;
pub mod events;
pub mod metrics;
pub mod parallel;
pub mod persistence;
pub mod result;
pub mod shadow;
pub mod suggestions;

pub use backtest::{run_backtest, BacktestDriver, RunError};
pub use events::ShadowEvent;
pub use metrics::PerformanceMetrics;
pub use parallel::{rank_by_pnl, run_parallel, BacktestJob, JobOutcome, RiskGrid};
pub use persistence::{BreakerStore, JsonFileStore, MemoryStore, NullStore, PersistenceError};
pub use result::{RunMode, SessionResult, SCHEMA_VERSION};
pub use shadow::{ShadowConfig, ShadowDriver};
pub use suggestions::{suggest_adjustments, ConfigSuggestion, MIN_TRADES_FOR_SUGGESTIONS};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn results_are_send_sync() {
        assert_send::<SessionResult>();
        assert_sync::<SessionResult>();
        assert_send::<PerformanceMetrics>();
        assert_sync::<PerformanceMetrics>();
        assert_send::<ShadowEvent>();
    }

    #[test]
    fn drivers_are_send() {
        assert_send::<BacktestDriver>();
        assert_send::<ShadowDriver<JsonFileStore>>();
        assert_send::<BacktestJob>();
    }
}
