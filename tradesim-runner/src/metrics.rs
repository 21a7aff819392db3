//! Performance metrics: pure functions that compute session statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar out.
//! Money-valued metrics stay in `Decimal`; risk-adjusted ratios are computed
//! in `f64` from the decimal equity curve.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradesim_core::domain::{ClosedTrade, EquityPoint};

/// Seconds in a 365.25-day year.
pub const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 60.0 * 60.0;

/// Annualization used when tick spacing cannot be inferred.
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;

/// Aggregate performance metrics for a single session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Fraction of trades with positive PnL
    pub win_rate: f64,
    /// Gross profit / |gross loss|; `inf` with winners and no losers
    #[serde(with = "unbounded_f64")]
    pub profit_factor: f64,
    pub total_pnl: Decimal,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub avg_win: Decimal,
    /// Magnitude of the average losing trade
    pub avg_loss: Decimal,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,
    pub expectancy: Decimal,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    /// Peak-to-trough decline, positive percent
    pub max_drawdown_pct: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub periods_per_year: f64,
    pub total_return_pct: Decimal,
    pub total_fees: Decimal,
    pub avg_hold_secs: f64,
    /// Closed trades per exit reason
    pub exit_reasons: BTreeMap<String, usize>,
}

impl PerformanceMetrics {
    /// Compute all metrics from a trade list and an equity curve.
    ///
    /// `periods_per_year` overrides the annualization inferred from the
    /// median tick spacing.
    pub fn compute(
        trades: &[ClosedTrade],
        equity_curve: &[EquityPoint],
        initial_balance: Decimal,
        periods_per_year: Option<f64>,
    ) -> Self {
        let equity: Vec<f64> = equity_curve
            .iter()
            .map(|p| p.equity.to_f64().unwrap_or(0.0))
            .collect();
        let returns = period_returns(&equity);
        let ppy = periods_per_year.unwrap_or_else(|| {
            infer_periods_per_year(equity_curve.iter().map(|p| p.timestamp))
        });

        let wins: Vec<Decimal> = trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).collect();
        let losses: Vec<Decimal> = trades.iter().filter(|t| t.is_loser()).map(|t| t.pnl).collect();
        let gross_profit: Decimal = wins.iter().copied().sum();
        let gross_loss: Decimal = losses.iter().map(|l| l.abs()).sum();
        let avg_win = mean_decimal(&wins);
        let avg_loss = mean_decimal(&losses).abs();

        let final_equity = equity_curve.last().map_or(initial_balance, |p| p.equity);
        let total_return_pct = if initial_balance > Decimal::ZERO {
            (final_equity - initial_balance) / initial_balance * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        Self {
            total_trades: trades.len(),
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            total_pnl: trades.iter().map(|t| t.pnl).sum(),
            gross_profit,
            gross_loss,
            avg_win,
            avg_loss,
            largest_win: wins.iter().copied().max().unwrap_or(Decimal::ZERO),
            largest_loss: losses.iter().copied().min().unwrap_or(Decimal::ZERO),
            expectancy: expectancy(trades),
            max_consecutive_wins: max_consecutive_wins(trades),
            max_consecutive_losses: max_consecutive_losses(trades),
            max_drawdown_pct: max_drawdown_pct(&equity),
            sharpe: sharpe_ratio(&returns, ppy),
            sortino: sortino_ratio(&returns, ppy),
            periods_per_year: ppy,
            total_return_pct,
            total_fees: trades.iter().map(|t| t.total_fees()).sum(),
            avg_hold_secs: avg_hold_secs(trades),
            exit_reasons: exit_reason_breakdown(trades),
        }
    }

    /// Share of closed trades that exited for `reason` (0 with no trades).
    pub fn exit_share(&self, reason: &str) -> f64 {
        if self.total_trades == 0 {
            return 0.0;
        }
        self.exit_reasons.get(reason).copied().unwrap_or(0) as f64 / self.total_trades as f64
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Win rate: fraction of trades that were winners.
pub fn win_rate(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Profit factor: gross profits / gross losses.
///
/// `f64::INFINITY` with at least one winner and no losers; 0.0 with no
/// trades, or with no winners.
pub fn profit_factor(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: Decimal = trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).sum();
    let gross_loss: Decimal = trades
        .iter()
        .filter(|t| t.is_loser())
        .map(|t| t.pnl.abs())
        .sum();

    if gross_loss.is_zero() {
        return if gross_profit > Decimal::ZERO {
            f64::INFINITY
        } else {
            0.0
        };
    }
    (gross_profit / gross_loss).to_f64().unwrap_or(0.0)
}

/// Expectancy = win_rate × avg_win − (1 − win_rate) × avg_loss.
pub fn expectancy(trades: &[ClosedTrade]) -> Decimal {
    if trades.is_empty() {
        return Decimal::ZERO;
    }
    let wins: Vec<Decimal> = trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).collect();
    let losses: Vec<Decimal> = trades.iter().filter(|t| t.is_loser()).map(|t| t.pnl).collect();
    let p = Decimal::from(wins.len() as u64) / Decimal::from(trades.len() as u64);
    p * mean_decimal(&wins) - (Decimal::ONE - p) * mean_decimal(&losses).abs()
}

/// Maximum drawdown as a positive percentage (e.g., 15.0 = 15% drawdown).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown_pct(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (peak - eq) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd * 100.0
}

/// Annualized Sharpe ratio from per-tick returns.
///
/// Sharpe = mean(returns) / std(returns) * sqrt(periods_per_year).
/// Returns 0.0 if variance is zero or fewer than 2 returns.
pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    (mean_f64(returns) / std) * periods_per_year.sqrt()
}

/// Annualized Sortino ratio (downside deviation only).
///
/// Without any negative return the full-sample standard deviation is used
/// instead. Returns 0.0 if the deviation is zero or fewer than 2 returns.
pub fn sortino_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let downside_sq: Vec<f64> = returns.iter().filter(|&&r| r < 0.0).map(|r| r * r).collect();
    let deviation = if downside_sq.is_empty() {
        std_dev(returns)
    } else {
        (downside_sq.iter().sum::<f64>() / returns.len() as f64).sqrt()
    };
    if deviation < 1e-15 {
        return 0.0;
    }
    (mean_f64(returns) / deviation) * periods_per_year.sqrt()
}

/// Annualization factor from the median spacing between timestamps.
///
/// Falls back to [`DEFAULT_PERIODS_PER_YEAR`] with fewer than two points or
/// a non-positive median spacing.
pub fn infer_periods_per_year(timestamps: impl IntoIterator<Item = DateTime<Utc>>) -> f64 {
    let ts: Vec<DateTime<Utc>> = timestamps.into_iter().collect();
    let mut gaps: Vec<i64> = ts
        .windows(2)
        .map(|w| (w[1] - w[0]).num_milliseconds())
        .collect();
    if gaps.is_empty() {
        return DEFAULT_PERIODS_PER_YEAR;
    }
    gaps.sort_unstable();
    let mid = gaps.len() / 2;
    let median_ms = if gaps.len() % 2 == 0 {
        (gaps[mid - 1] + gaps[mid]) as f64 / 2.0
    } else {
        gaps[mid] as f64
    };
    if median_ms <= 0.0 {
        return DEFAULT_PERIODS_PER_YEAR;
    }
    SECONDS_PER_YEAR / (median_ms / 1000.0)
}

/// Maximum consecutive winning trades.
pub fn max_consecutive_wins(trades: &[ClosedTrade]) -> usize {
    max_consecutive(trades, ClosedTrade::is_winner)
}

/// Maximum consecutive losing trades.
pub fn max_consecutive_losses(trades: &[ClosedTrade]) -> usize {
    max_consecutive(trades, ClosedTrade::is_loser)
}

pub fn exit_reason_breakdown(trades: &[ClosedTrade]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for trade in trades {
        *counts.entry(trade.exit_reason.as_str().to_string()).or_insert(0) += 1;
    }
    counts
}

fn avg_hold_secs(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.hold_secs as f64).sum::<f64>() / trades.len() as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Simple per-period returns from an equity curve.
pub fn period_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            if w[0] > 0.0 {
                (w[1] - w[0]) / w[0]
            } else {
                0.0
            }
        })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn mean_decimal(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().copied().sum::<Decimal>() / Decimal::from(values.len() as u64)
}

fn max_consecutive(trades: &[ClosedTrade], pred: fn(&ClosedTrade) -> bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;

    for trade in trades {
        if pred(trade) {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

/// Serde helper for ratios that may be `+inf` (JSON has no infinity).
mod unbounded_f64 {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_infinite() && value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(s) if s == "inf" => Ok(f64::INFINITY),
            Repr::Text(s) => Err(D::Error::custom(format!("invalid ratio: {s}"))),
        }
    }
}
