//! Circuit breaker for losing streaks and the daily loss budget.
//!
//! When a closed trade pushes any counter over its threshold, the breaker
//! trips and refuses new entries until `cooldown_until`. The check is a
//! time gate against the tick's timestamp, never a blocking wait, so the
//! same state machine serves backtests and live shadow runs.
//!
//! The whole state is a plain serializable struct so a shadow process can
//! snapshot it and pick up the day's risk budget after a restart.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::config::CircuitBreakerConfig;
use crate::domain::ClosedTrade;

/// Which threshold tripped the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripReason {
    ConsecutiveLosses,
    DailyLossCount,
    DailyLossPct,
}

impl fmt::Display for TripReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TripReason::ConsecutiveLosses => "consecutive_losses",
            TripReason::DailyLossCount => "daily_loss_count",
            TripReason::DailyLossPct => "daily_loss_pct",
        };
        f.write_str(s)
    }
}

/// Snapshot-able breaker state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub consecutive_losses: u32,
    pub daily_loss_count: u32,
    /// Sum of losing-trade PnL magnitudes for the current UTC day.
    pub daily_loss_amount: Decimal,
    /// `daily_loss_amount` in percent of `day_start_balance`.
    pub daily_loss_pct: Decimal,
    pub day_start_balance: Decimal,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub triggered: bool,
    pub trigger_reason: Option<TripReason>,
    pub last_reset_date: Option<NaiveDate>,
}

impl CircuitBreakerState {
    pub fn new(day_start_balance: Decimal) -> Self {
        Self {
            consecutive_losses: 0,
            daily_loss_count: 0,
            daily_loss_amount: Decimal::ZERO,
            daily_loss_pct: Decimal::ZERO,
            day_start_balance,
            cooldown_until: None,
            triggered: false,
            trigger_reason: None,
            last_reset_date: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: CircuitBreakerState,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig, balance: Decimal) -> Self {
        Self {
            config,
            state: CircuitBreakerState::new(balance),
        }
    }

    /// Resume from a persisted snapshot.
    pub fn restore(config: CircuitBreakerConfig, state: CircuitBreakerState) -> Self {
        Self { config, state }
    }

    pub fn snapshot(&self) -> CircuitBreakerState {
        self.state.clone()
    }

    pub fn state(&self) -> &CircuitBreakerState {
        &self.state
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn is_triggered(&self) -> bool {
        self.state.triggered
    }

    /// Reset the daily counters when `now` falls on a new UTC date.
    ///
    /// `balance` becomes the reference for the new day's loss percentage.
    /// Returns true if a rollover happened. The first call only pins the date.
    pub fn roll_day(&mut self, now: DateTime<Utc>, balance: Decimal) -> bool {
        let today = now.date_naive();
        match self.state.last_reset_date {
            Some(date) if date == today => false,
            Some(date) => {
                info!(from = %date, to = %today, "circuit breaker: daily counters reset");
                self.state.daily_loss_count = 0;
                self.state.daily_loss_amount = Decimal::ZERO;
                self.state.daily_loss_pct = Decimal::ZERO;
                self.state.day_start_balance = balance;
                self.state.last_reset_date = Some(today);
                true
            }
            None => {
                self.state.last_reset_date = Some(today);
                false
            }
        }
    }

    /// Check if new entries are currently allowed.
    ///
    /// An elapsed cooldown resets the breaker (triggered flag and losing
    /// streak) before answering.
    pub fn is_trading_allowed(&mut self, now: DateTime<Utc>) -> bool {
        if !self.state.triggered {
            return true;
        }
        if let Some(until) = self.state.cooldown_until {
            if now < until {
                return false;
            }
        }
        info!(
            reason = ?self.state.trigger_reason,
            "circuit breaker: cooldown elapsed, trading resumed"
        );
        self.state.triggered = false;
        self.state.consecutive_losses = 0;
        self.state.cooldown_until = None;
        self.state.trigger_reason = None;
        true
    }

    /// Fold a closed trade into the counters. Returns the reason if this
    /// trade tripped the breaker.
    ///
    /// A win resets the losing streak but leaves an active cooldown alone.
    /// A breakeven trade changes nothing.
    pub fn record_trade(&mut self, trade: &ClosedTrade, now: DateTime<Utc>) -> Option<TripReason> {
        if trade.is_winner() {
            self.state.consecutive_losses = 0;
            return None;
        }
        if !trade.is_loser() {
            return None;
        }

        self.state.consecutive_losses += 1;
        self.state.daily_loss_count += 1;
        self.state.daily_loss_amount += trade.pnl.abs();
        if self.state.day_start_balance > Decimal::ZERO {
            self.state.daily_loss_pct =
                self.state.daily_loss_amount / self.state.day_start_balance * Decimal::ONE_HUNDRED;
        }

        if self.state.triggered {
            return None;
        }
        let reason = self.breached()?;
        self.trip(reason, now);
        Some(reason)
    }

    /// Remaining cooldown (zero if not tripped).
    pub fn remaining_cooldown(&self, now: DateTime<Utc>) -> Duration {
        match self.state.cooldown_until {
            Some(until) if self.state.triggered && until > now => until - now,
            _ => Duration::zero(),
        }
    }

    fn breached(&self) -> Option<TripReason> {
        if self.state.consecutive_losses >= self.config.max_consecutive_losses {
            Some(TripReason::ConsecutiveLosses)
        } else if self.state.daily_loss_count >= self.config.max_daily_losses {
            Some(TripReason::DailyLossCount)
        } else if self.state.daily_loss_pct >= self.config.max_daily_loss_pct {
            Some(TripReason::DailyLossPct)
        } else {
            None
        }
    }

    fn trip(&mut self, reason: TripReason, now: DateTime<Utc>) {
        let minutes = i64::try_from(self.config.cooldown_minutes)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 60_000);
        let until = now
            .checked_add_signed(Duration::minutes(minutes))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.state.triggered = true;
        self.state.trigger_reason = Some(reason);
        self.state.cooldown_until = Some(until);
        info!(
            %reason,
            consecutive_losses = self.state.consecutive_losses,
            daily_loss_count = self.state.daily_loss_count,
            daily_loss_pct = %self.state.daily_loss_pct,
            cooldown_until = %until,
            "circuit breaker tripped"
        );
    }
}
