//! Serializable risk/backtest configuration.
//!
//! Every field has a default, so a partial TOML or JSON document is enough.
//! `validate()` runs at session construction; an invalid config never
//! reaches the tick loop.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors, raised at construction only.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: String },
    #[error("{field} must be within (0, 100], got {value}")]
    PercentOutOfRange { field: &'static str, value: String },
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: String },
    #[error("kelly_fraction must be within (0, 1], got {0}")]
    KellyFraction(f64),
    #[error("min_hold_time ({min}m) must not exceed max_hold_time ({max}m)")]
    HoldWindow { min: u64, max: u64 },
    #[error("parse config: {0}")]
    Parse(String),
}

/// Circuit-breaker thresholds. Any one of them trips the breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub max_consecutive_losses: u32,
    pub cooldown_minutes: u64,
    pub max_daily_losses: u32,
    /// Cumulative losing-trade PnL for the day, in percent of the balance at
    /// the start of the day.
    pub max_daily_loss_pct: Decimal,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_consecutive_losses: 3,
            cooldown_minutes: 60,
            max_daily_losses: 5,
            max_daily_loss_pct: dec!(5),
        }
    }
}

/// Per-position exit rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
    pub use_stop_loss: bool,
    pub use_take_profit: bool,
    /// Distance of the trailing stop from the best price, in percent.
    /// `None` disables the trailing stop.
    pub trailing_stop_pct: Option<Decimal>,
    /// Unrealized profit (percent) that arms the trailing stop.
    pub trailing_trigger_pct: Decimal,
    /// Forced exit after this many minutes in the trade.
    pub max_hold_time: Option<u64>,
    /// Minutes during which only the hard stop-loss may close the trade.
    pub min_hold_time: Option<u64>,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            stop_loss_pct: dec!(2),
            take_profit_pct: dec!(3),
            use_stop_loss: true,
            use_take_profit: true,
            trailing_stop_pct: None,
            trailing_trigger_pct: dec!(1),
            max_hold_time: None,
            min_hold_time: None,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Complete session configuration: balance, sizing, costs and risk rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub initial_balance: Decimal,
    /// Fraction of the balance committed per entry, in percent.
    pub position_size_pct: Decimal,
    /// Hard cap on a single position, in percent of the balance.
    pub max_position_pct: Decimal,
    /// Entries smaller than this notional are skipped.
    pub min_notional: Decimal,
    /// Fee per leg, in percent of notional.
    pub fee_pct: Decimal,
    /// Deterministic slippage per leg, in basis points.
    pub slippage_bps: Decimal,
    pub allow_short: bool,
    pub use_kelly: bool,
    /// Closed trades required before Kelly sizing may shrink positions.
    pub kelly_min_trades: usize,
    /// Safety multiplier on the raw Kelly fraction.
    pub kelly_fraction: f64,
    /// Annualization factor for Sharpe/Sortino. Inferred from tick spacing
    /// when unset.
    pub periods_per_year: Option<f64>,
    pub risk: RiskConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_balance: dec!(10000),
            position_size_pct: dec!(2),
            max_position_pct: dec!(95),
            min_notional: dec!(10),
            fee_pct: dec!(0.1),
            slippage_bps: dec!(5),
            allow_short: false,
            use_kelly: false,
            kelly_min_trades: 30,
            kelly_fraction: 0.5,
            periods_per_year: None,
            risk: RiskConfig::default(),
        }
    }
}

impl BacktestConfig {
    /// Parse a config from a TOML string. Missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every parameter. Called by `Session::new`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("initial_balance", self.initial_balance)?;
        percent("position_size_pct", self.position_size_pct)?;
        percent("max_position_pct", self.max_position_pct)?;
        non_negative("min_notional", self.min_notional)?;
        non_negative("fee_pct", self.fee_pct)?;
        non_negative("slippage_bps", self.slippage_bps)?;
        if !(self.kelly_fraction > 0.0 && self.kelly_fraction <= 1.0) {
            return Err(ConfigError::KellyFraction(self.kelly_fraction));
        }
        if let Some(ppy) = self.periods_per_year {
            if !(ppy.is_finite() && ppy > 0.0) {
                return Err(ConfigError::NotPositive {
                    field: "periods_per_year",
                    value: ppy.to_string(),
                });
            }
        }
        self.risk.validate()
    }

    /// Deterministic hash of the full configuration (BLAKE3 over canonical
    /// JSON). Two sessions with equal hashes ran with identical parameters.
    pub fn config_hash(&self) -> String {
        // Struct fields serialize in declaration order; no maps are involved.
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.use_stop_loss {
            percent("stop_loss_pct", self.stop_loss_pct)?;
        }
        if self.use_take_profit {
            positive("take_profit_pct", self.take_profit_pct)?;
        }
        if let Some(trail) = self.trailing_stop_pct {
            percent("trailing_stop_pct", trail)?;
            non_negative("trailing_trigger_pct", self.trailing_trigger_pct)?;
        }
        if let Some(max) = self.max_hold_time {
            if max == 0 {
                return Err(ConfigError::NotPositive {
                    field: "max_hold_time",
                    value: max.to_string(),
                });
            }
            if let Some(min) = self.min_hold_time {
                if min > max {
                    return Err(ConfigError::HoldWindow { min, max });
                }
            }
        }
        self.circuit_breaker.validate()
    }
}

impl CircuitBreakerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_consecutive_losses == 0 {
            return Err(ConfigError::NotPositive {
                field: "max_consecutive_losses",
                value: "0".into(),
            });
        }
        if self.max_daily_losses == 0 {
            return Err(ConfigError::NotPositive {
                field: "max_daily_losses",
                value: "0".into(),
            });
        }
        percent("max_daily_loss_pct", self.max_daily_loss_pct)
    }
}

fn positive(field: &'static str, value: Decimal) -> Result<(), ConfigError> {
    if value <= Decimal::ZERO {
        return Err(ConfigError::NotPositive {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn non_negative(field: &'static str, value: Decimal) -> Result<(), ConfigError> {
    if value < Decimal::ZERO {
        return Err(ConfigError::Negative {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn percent(field: &'static str, value: Decimal) -> Result<(), ConfigError> {
    if value <= Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(ConfigError::PercentOutOfRange {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}
