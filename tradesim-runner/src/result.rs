//! Session result: the immutable snapshot a driver hands back.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradesim_core::domain::{ClosedTrade, EquityPoint, Position};
use tradesim_core::risk::CircuitBreakerState;
use tradesim_core::session::SessionParts;
use tradesim_core::BacktestConfig;

use crate::metrics::PerformanceMetrics;

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Which driver produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Backtest,
    Shadow,
}

/// Complete result of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub mode: RunMode,
    /// BLAKE3 hash of the canonical config JSON
    pub config_hash: String,
    pub config: BacktestConfig,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
    /// Still open when a shadow stream ended (never set for backtests).
    pub open_position: Option<Position>,
    pub breaker: CircuitBreakerState,
    pub initial_balance: Decimal,
    pub final_balance: Decimal,
    pub opens: usize,
    pub processed_ticks: usize,
    pub skipped_ticks: usize,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl SessionResult {
    /// Summarize a finished session.
    pub fn from_parts(parts: SessionParts, mode: RunMode) -> Self {
        let metrics = PerformanceMetrics::compute(
            &parts.trades,
            &parts.equity_curve,
            parts.config.initial_balance,
            parts.config.periods_per_year,
        );
        Self {
            schema_version: SCHEMA_VERSION,
            mode,
            config_hash: parts.config.config_hash(),
            initial_balance: parts.config.initial_balance,
            start: parts.equity_curve.first().map(|p| p.timestamp),
            end: parts.equity_curve.last().map(|p| p.timestamp),
            open_position: parts.position.position().cloned(),
            config: parts.config,
            metrics,
            trades: parts.trades,
            equity_curve: parts.equity_curve,
            breaker: parts.breaker,
            final_balance: parts.final_balance,
            opens: parts.opens,
            processed_ticks: parts.processed_ticks,
            skipped_ticks: parts.skipped_ticks,
        }
    }

    /// Final mark-to-market equity (balance if nothing is open).
    pub fn final_equity(&self) -> Decimal {
        self.equity_curve
            .last()
            .map_or(self.initial_balance, |p| p.equity)
    }

    /// Same config and the same trades: the determinism check between two
    /// runs over the same ticks.
    pub fn same_trades_as(&self, other: &SessionResult) -> bool {
        self.config_hash == other.config_hash && self.trades == other.trades
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize SessionResult to JSON")
    }

    /// Deserialize from JSON, rejecting unknown schema versions.
    pub fn from_json(json: &str) -> Result<Self> {
        let result: SessionResult =
            serde_json::from_str(json).context("failed to deserialize SessionResult from JSON")?;
        if result.schema_version > SCHEMA_VERSION {
            bail!(
                "unsupported schema version {} (max supported: {})",
                result.schema_version,
                SCHEMA_VERSION
            );
        }
        Ok(result)
    }
}
