//! Exit evaluation for an open position.
//!
//! Checks run in a fixed priority order, since one intrabar range can
//! breach several levels at once:
//!
//! 1. stop-loss (intrabar low for longs, high for shorts)
//! 2. take-profit
//! 3. trailing stop (once armed)
//! 4. max hold time
//! 5. signal reversal
//!
//! While `min_hold_time` has not elapsed only the stop-loss can fire.
//!
//! Levels are evaluated against the position as it stood at the start of
//! the tick. [`RiskController::update_excursion`] folds the tick's extremes
//! into the position afterwards, so a tick's own high never arms a trailing
//! stop that the same tick's low then hits.

use chrono::Duration;
use rust_decimal::Decimal;

use crate::config::RiskConfig;
use crate::domain::{ExitReason, Position, Side, Tick};
use crate::execution::{gapped_through, level_fill_price, LevelKind};

/// An exit the controller wants executed, at a pre-slippage price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitDecision {
    pub reason: ExitReason,
    pub price: Decimal,
    /// The open was already through the level
    pub gapped: bool,
}

/// Stateless rule set; all per-position state lives on [`Position`].
#[derive(Debug, Clone)]
pub struct RiskController {
    config: RiskConfig,
}

impl RiskController {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Hard stop level, if stop-losses are enabled.
    pub fn stop_loss_level(&self, position: &Position) -> Option<Decimal> {
        if !self.config.use_stop_loss {
            return None;
        }
        let offset = self.config.stop_loss_pct / Decimal::ONE_HUNDRED;
        Some(match position.side {
            Side::Long => position.entry_price * (Decimal::ONE - offset),
            Side::Short => position.entry_price * (Decimal::ONE + offset),
        })
    }

    /// Hard profit target, if take-profits are enabled.
    pub fn take_profit_level(&self, position: &Position) -> Option<Decimal> {
        if !self.config.use_take_profit {
            return None;
        }
        let offset = self.config.take_profit_pct / Decimal::ONE_HUNDRED;
        Some(match position.side {
            Side::Long => position.entry_price * (Decimal::ONE + offset),
            Side::Short => position.entry_price * (Decimal::ONE - offset),
        })
    }

    /// Decide whether `position` must close on `tick`.
    pub fn evaluate(&self, position: &Position, tick: &Tick) -> Option<ExitDecision> {
        let side = position.side;

        if let Some(level) = self.stop_loss_level(position) {
            if stop_hit(tick, level, side) {
                return Some(level_exit(ExitReason::StopLoss, tick, level, side, LevelKind::Stop));
            }
        }

        let held = position.held_for(tick.timestamp);
        if let Some(min) = self.config.min_hold_time {
            if held < minutes(min) {
                return None;
            }
        }

        if let Some(level) = self.take_profit_level(position) {
            let hit = match side {
                Side::Long => tick.high >= level,
                Side::Short => tick.low <= level,
            };
            if hit {
                let kind = LevelKind::Target;
                return Some(level_exit(ExitReason::TakeProfit, tick, level, side, kind));
            }
        }

        if let Some(level) = position.trailing.current_level() {
            if stop_hit(tick, level, side) {
                return Some(level_exit(
                    ExitReason::TrailingStop,
                    tick,
                    level,
                    side,
                    LevelKind::Stop,
                ));
            }
        }

        if let Some(max) = self.config.max_hold_time {
            if held >= minutes(max) {
                return Some(close_exit(ExitReason::MaxHoldTime, tick));
            }
        }

        if tick.signal.direction() == Some(side.opposite()) {
            return Some(close_exit(ExitReason::Signal, tick));
        }

        None
    }

    /// Fold a tick that did not close the position into its excursion
    /// state: bars held, best price, and the trailing ratchet.
    pub fn update_excursion(&self, position: &mut Position, tick: &Tick) {
        position.bars_held += 1;
        position.best_price = match position.side {
            Side::Long => position.best_price.max(tick.high),
            Side::Short => position.best_price.min(tick.low),
        };

        let Some(trail) = self.config.trailing_stop_pct else {
            return;
        };
        if position.peak_profit_pct() < self.config.trailing_trigger_pct {
            return;
        }
        let offset = trail / Decimal::ONE_HUNDRED;
        let proposed = match position.side {
            Side::Long => position.best_price * (Decimal::ONE - offset),
            Side::Short => position.best_price * (Decimal::ONE + offset),
        };
        position.trailing.apply(proposed);
    }
}

fn minutes(m: u64) -> Duration {
    let m = i64::try_from(m).unwrap_or(i64::MAX).min(i64::MAX / 60_000);
    Duration::minutes(m)
}

fn stop_hit(tick: &Tick, level: Decimal, side: Side) -> bool {
    match side {
        Side::Long => tick.low <= level,
        Side::Short => tick.high >= level,
    }
}

fn level_exit(
    reason: ExitReason,
    tick: &Tick,
    level: Decimal,
    side: Side,
    kind: LevelKind,
) -> ExitDecision {
    ExitDecision {
        reason,
        price: level_fill_price(tick, level, side, kind),
        gapped: gapped_through(tick, level, side, kind),
    }
}

fn close_exit(reason: ExitReason, tick: &Tick) -> ExitDecision {
    ExitDecision {
        reason,
        price: tick.close,
        gapped: false,
    }
}
