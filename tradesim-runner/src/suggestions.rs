//! Config-adjustment suggestions from a session's recent performance.
//!
//! Heuristics only: each rule looks at one symptom in the trade log or the
//! metrics and proposes a single parameter change. Nothing is applied
//! automatically.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use tradesim_core::domain::ClosedTrade;
use tradesim_core::BacktestConfig;

use crate::metrics::PerformanceMetrics;

/// No suggestions before this many closed trades.
pub const MIN_TRADES_FOR_SUGGESTIONS: usize = 10;

/// Trade count at which confidence stops growing.
const FULL_CONFIDENCE_TRADES: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSuggestion {
    /// Dotted config path, e.g. `risk.stop_loss_pct`
    pub parameter: String,
    pub current: Decimal,
    pub suggested: Decimal,
    pub reason: String,
    /// 0.0 ..= 1.0
    pub confidence: f64,
}

/// Propose parameter changes for `config` given its closed trades.
pub fn suggest_adjustments(
    config: &BacktestConfig,
    trades: &[ClosedTrade],
    metrics: &PerformanceMetrics,
) -> Vec<ConfigSuggestion> {
    let n = trades.len();
    if n < MIN_TRADES_FOR_SUGGESTIONS {
        return Vec::new();
    }
    let sample = (n as f64 / FULL_CONFIDENCE_TRADES).min(1.0);
    let risk = &config.risk;
    let mut out = Vec::new();

    let stop_share = metrics.exit_share("stop_loss");
    let target_share = metrics.exit_share("take_profit");
    let max_hold_share = metrics.exit_share("max_hold_time");

    if risk.use_stop_loss && stop_share > 0.5 {
        out.push(ConfigSuggestion {
            parameter: "risk.stop_loss_pct".into(),
            current: risk.stop_loss_pct,
            suggested: (risk.stop_loss_pct * dec!(1.5)).min(Decimal::ONE_HUNDRED).round_dp(2),
            reason: format!(
                "{:.0}% of trades hit the stop-loss; the stop may sit inside normal noise",
                stop_share * 100.0
            ),
            confidence: sample * stop_share,
        });
    }

    if risk.use_take_profit && target_share < 0.1 && stop_share >= 0.3 {
        out.push(ConfigSuggestion {
            parameter: "risk.take_profit_pct".into(),
            current: risk.take_profit_pct,
            suggested: (risk.take_profit_pct * dec!(0.75)).round_dp(2),
            reason: format!(
                "only {:.0}% of trades reached the target while {:.0}% were stopped out",
                target_share * 100.0,
                stop_share * 100.0
            ),
            confidence: sample * stop_share,
        });
    }

    if metrics.max_drawdown_pct > 15.0 {
        out.push(ConfigSuggestion {
            parameter: "position_size_pct".into(),
            current: config.position_size_pct,
            suggested: (config.position_size_pct / dec!(2)).round_dp(2),
            reason: format!(
                "max drawdown {:.1}% exceeds 15%; halve the position size",
                metrics.max_drawdown_pct
            ),
            confidence: sample * (metrics.max_drawdown_pct / 30.0).min(1.0),
        });
    }

    if let Some(max_hold) = risk.max_hold_time {
        if max_hold_share > 0.3 {
            out.push(ConfigSuggestion {
                parameter: "risk.max_hold_time".into(),
                current: Decimal::from(max_hold),
                suggested: (Decimal::from(max_hold) * dec!(1.5)).round(),
                reason: format!(
                    "{:.0}% of trades were closed by the hold-time limit",
                    max_hold_share * 100.0
                ),
                confidence: sample * max_hold_share,
            });
        }
    }

    let threshold = risk.circuit_breaker.max_consecutive_losses;
    if threshold > 1
        && metrics.max_consecutive_losses >= threshold as usize
        && metrics.win_rate < 0.4
    {
        out.push(ConfigSuggestion {
            parameter: "risk.circuit_breaker.max_consecutive_losses".into(),
            current: Decimal::from(threshold),
            suggested: Decimal::from(threshold - 1),
            reason: format!(
                "losing streaks reach the breaker threshold with a {:.0}% win rate",
                metrics.win_rate * 100.0
            ),
            confidence: sample * (1.0 - metrics.win_rate),
        });
    }

    out
}
