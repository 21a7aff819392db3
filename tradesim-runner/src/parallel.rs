//! Independent backtests on a rayon pool.
//!
//! Each job owns its config and shares the tick series read-only through an
//! `Arc`; sessions never see each other's state.

use std::sync::Arc;

use rayon::prelude::*;
use rust_decimal::Decimal;
use tracing::info;

use tradesim_core::domain::Tick;
use tradesim_core::BacktestConfig;

use crate::backtest::{BacktestDriver, RunError};
use crate::result::SessionResult;

#[derive(Debug, Clone)]
pub struct BacktestJob {
    pub name: String,
    pub config: BacktestConfig,
    pub ticks: Arc<Vec<Tick>>,
}

impl BacktestJob {
    pub fn new(name: impl Into<String>, config: BacktestConfig, ticks: Arc<Vec<Tick>>) -> Self {
        Self {
            name: name.into(),
            config,
            ticks,
        }
    }
}

#[derive(Debug)]
pub struct JobOutcome {
    pub name: String,
    pub result: Result<SessionResult, RunError>,
}

/// Run every job, optionally capped at `threads` workers.
///
/// Outcomes come back in job order. A job with an invalid config fails on
/// its own without affecting the others.
pub fn run_parallel(
    jobs: Vec<BacktestJob>,
    threads: Option<usize>,
) -> Result<Vec<JobOutcome>, RunError> {
    let run_all = |jobs: Vec<BacktestJob>| -> Vec<JobOutcome> {
        jobs.into_par_iter()
            .map(|job| {
                let result =
                    BacktestDriver::new(job.config).and_then(|driver| driver.run(&job.ticks));
                JobOutcome {
                    name: job.name,
                    result,
                }
            })
            .collect()
    };

    let count = jobs.len();
    let outcomes = match threads {
        Some(n) if n > 0 => {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(n).build()?;
            pool.install(|| run_all(jobs))
        }
        _ => run_all(jobs),
    };

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(jobs = count, failed, "parallel backtests complete");
    Ok(outcomes)
}

/// Risk-parameter grid over a base config.
#[derive(Debug, Clone, Default)]
pub struct RiskGrid {
    pub stop_loss_pcts: Vec<Decimal>,
    pub take_profit_pcts: Vec<Decimal>,
    pub position_size_pcts: Vec<Decimal>,
}

impl RiskGrid {
    /// Number of configs `configs` will produce. An empty axis keeps the
    /// base value.
    pub fn size(&self) -> usize {
        [
            &self.stop_loss_pcts,
            &self.take_profit_pcts,
            &self.position_size_pcts,
        ]
        .iter()
        .map(|axis| axis.len().max(1))
        .product()
    }

    pub fn configs(&self, base: &BacktestConfig) -> Vec<BacktestConfig> {
        let axis = |values: &[Decimal], current: Decimal| -> Vec<Decimal> {
            if values.is_empty() {
                vec![current]
            } else {
                values.to_vec()
            }
        };
        let stops = axis(&self.stop_loss_pcts, base.risk.stop_loss_pct);
        let targets = axis(&self.take_profit_pcts, base.risk.take_profit_pct);
        let sizes = axis(&self.position_size_pcts, base.position_size_pct);

        let mut out = Vec::with_capacity(self.size());
        for &stop in &stops {
            for &target in &targets {
                for &size in &sizes {
                    let mut config = base.clone();
                    config.risk.stop_loss_pct = stop;
                    config.risk.take_profit_pct = target;
                    config.position_size_pct = size;
                    out.push(config);
                }
            }
        }
        out
    }

    /// One job per grid point, named `sl=<x>/tp=<y>/size=<z>`.
    pub fn jobs(&self, base: &BacktestConfig, ticks: Arc<Vec<Tick>>) -> Vec<BacktestJob> {
        self.configs(base)
            .into_iter()
            .map(|config| {
                let name = format!(
                    "sl={}/tp={}/size={}",
                    config.risk.stop_loss_pct, config.risk.take_profit_pct, config.position_size_pct
                );
                BacktestJob::new(name, config, Arc::clone(&ticks))
            })
            .collect()
    }
}

/// Successful outcomes sorted by total PnL, best first.
pub fn rank_by_pnl(outcomes: &[JobOutcome]) -> Vec<(&str, &SessionResult)> {
    let mut ranked: Vec<_> = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok().map(|r| (o.name.as_str(), r)))
        .collect();
    ranked.sort_by(|a, b| b.1.metrics.total_pnl.cmp(&a.1.metrics.total_pnl));
    ranked
}
