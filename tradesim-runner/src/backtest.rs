//! Backtest driver: synchronous iteration over a materialized tick slice.

use thiserror::Error;
use tracing::{debug, info};

use tradesim_core::config::{BacktestConfig, ConfigError};
use tradesim_core::domain::Tick;
use tradesim_core::Session;

use crate::result::{RunMode, SessionResult};

/// Errors from the drivers.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Runs one config over a finite, time-ordered tick sequence.
#[derive(Debug, Clone)]
pub struct BacktestDriver {
    config: BacktestConfig,
}

impl BacktestDriver {
    /// Validates the config up front so `run` cannot fail on it later.
    pub fn new(config: BacktestConfig) -> Result<Self, RunError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Process every tick, then force-close any remaining position with
    /// `end_of_data`.
    pub fn run(&self, ticks: &[Tick]) -> Result<SessionResult, RunError> {
        let mut session = Session::new(self.config.clone())?;
        for tick in ticks {
            session.on_tick(tick);
        }
        if let Some(event) = session.finish() {
            debug!(trade_id = event.trade.trade_id, "forced end-of-data exit");
        }

        let result = SessionResult::from_parts(session.into_parts(), RunMode::Backtest);
        info!(
            config_hash = %&result.config_hash[..12],
            ticks = result.processed_ticks,
            skipped = result.skipped_ticks,
            trades = result.trades.len(),
            total_return_pct = %result.metrics.total_return_pct.round_dp(4),
            "backtest complete"
        );
        Ok(result)
    }
}

/// Convenience wrapper: validate, run, summarize.
pub fn run_backtest(config: BacktestConfig, ticks: &[Tick]) -> Result<SessionResult, RunError> {
    BacktestDriver::new(config)?.run(ticks)
}
