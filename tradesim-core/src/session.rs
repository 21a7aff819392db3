//! Per-tick pipeline shared by the backtest and shadow drivers.
//!
//! Each processed tick runs, in order:
//!
//! 1. validation (invalid or time-regressing ticks are skipped outright)
//! 2. day rollover for the circuit breaker
//! 3. exit evaluation for the open position, if any
//! 4. entry evaluation on the tick's signal
//! 5. one equity point, unconditionally
//!
//! A session never awaits anything; drivers own the loop around it.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{BacktestConfig, ConfigError};
use crate::domain::{ClosedTrade, EquityPoint, ExitReason, Position, PositionState, Side, Tick};
use crate::execution::ExecutionSimulator;
use crate::recorder::TradeRecorder;
use crate::risk::{CircuitBreaker, CircuitBreakerState, RiskController, TripReason};
use crate::sizing::{sizer_from_config, Sizer};

use EntryDecision::{Hold, Opened, Rejected};

/// Quantity precision; fractional units are rounded toward zero.
pub const QUANTITY_DP: u32 = 8;

/// Why a tick never entered the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Non-positive or inconsistent OHLC values
    InvalidPrice,
    /// Timestamp not after the previous processed tick
    OutOfOrder,
}

/// Why a signal did not open a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    CircuitBreaker { until: Option<DateTime<Utc>> },
    BelowMinNotional,
}

/// A simulated fill of one leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillReport {
    pub timestamp: DateTime<Utc>,
    pub side: Side,
    pub is_entry: bool,
    pub requested_price: Decimal,
    pub fill_price: Decimal,
    pub quantity: Decimal,
    pub fee: Decimal,
}

/// A position closed on this tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitEvent {
    pub fill: FillReport,
    pub trade: ClosedTrade,
    /// Set when this close tripped the circuit breaker
    pub breaker_tripped: Option<TripReason>,
}

/// What the entry phase did with this tick's signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "detail", rename_all = "snake_case")]
pub enum EntryDecision {
    /// No actionable signal, or already in a position
    Hold,
    Opened(FillReport),
    Rejected(RejectReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub timestamp: DateTime<Utc>,
    pub signal: Option<Side>,
    pub exit: Option<ExitEvent>,
    pub entry: EntryDecision,
    pub equity: EquityPoint,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    Processed(Box<TickReport>),
}

/// Everything a finished session leaves behind.
#[derive(Debug, Clone)]
pub struct SessionParts {
    pub config: BacktestConfig,
    pub trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
    pub final_balance: Decimal,
    pub position: PositionState,
    pub breaker: CircuitBreakerState,
    pub opens: usize,
    pub processed_ticks: usize,
    pub skipped_ticks: usize,
}

/// One trading session: the single owner of position, breaker, sizer,
/// execution and recorder state.
pub struct Session {
    config: BacktestConfig,
    risk: RiskController,
    breaker: CircuitBreaker,
    sizer: Box<dyn Sizer>,
    execution: ExecutionSimulator,
    recorder: TradeRecorder,
    position: PositionState,
    last_timestamp: Option<DateTime<Utc>>,
    last_close: Option<Decimal>,
    processed_ticks: usize,
    skipped_ticks: usize,
}

impl Session {
    /// Validate `config` and build a flat session with deterministic fills.
    pub fn new(config: BacktestConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            risk: RiskController::new(config.risk.clone()),
            breaker: CircuitBreaker::new(
                config.risk.circuit_breaker.clone(),
                config.initial_balance,
            ),
            sizer: sizer_from_config(&config),
            execution: ExecutionSimulator::from_config(&config),
            recorder: TradeRecorder::new(config.initial_balance),
            position: PositionState::Flat,
            last_timestamp: None,
            last_close: None,
            processed_ticks: 0,
            skipped_ticks: 0,
            config,
        })
    }

    /// Replace the execution simulator (e.g. stochastic slippage).
    pub fn with_execution(mut self, execution: ExecutionSimulator) -> Self {
        self.execution = execution;
        self
    }

    /// Resume breaker counters from a snapshot.
    pub fn with_breaker_state(mut self, state: CircuitBreakerState) -> Self {
        self.breaker = CircuitBreaker::restore(self.config.risk.circuit_breaker.clone(), state);
        self
    }

    pub fn with_sizer(mut self, sizer: Box<dyn Sizer>) -> Self {
        self.sizer = sizer;
        self
    }

    /// Run one tick through the pipeline.
    pub fn on_tick(&mut self, tick: &Tick) -> TickOutcome {
        if !tick.is_valid() {
            warn!(timestamp = %tick.timestamp, close = %tick.close, "skipping invalid tick");
            self.skipped_ticks += 1;
            return TickOutcome::Skipped(SkipReason::InvalidPrice);
        }
        if let Some(last) = self.last_timestamp {
            if tick.timestamp <= last {
                warn!(timestamp = %tick.timestamp, previous = %last, "skipping out-of-order tick");
                self.skipped_ticks += 1;
                return TickOutcome::Skipped(SkipReason::OutOfOrder);
            }
        }

        let now = tick.timestamp;
        self.execution.observe(tick);
        self.breaker.roll_day(now, self.recorder.last_equity());

        let exit = self.exit_phase(tick);
        let signal = tick.signal.direction();
        let entry = if exit.is_some() {
            Hold
        } else {
            self.entry_phase(tick, signal)
        };

        let equity = self
            .recorder
            .mark(now, self.position.position(), tick.close);
        self.last_timestamp = Some(now);
        self.last_close = Some(tick.close);
        self.processed_ticks += 1;

        TickOutcome::Processed(Box::new(TickReport {
            timestamp: now,
            signal,
            exit,
            entry,
            equity,
        }))
    }

    /// Force-close a remaining position at the last processed close.
    ///
    /// The final equity point is restated to the realized balance.
    pub fn finish(&mut self) -> Option<ExitEvent> {
        let (now, close) = (self.last_timestamp?, self.last_close?);
        if !self.position.is_open() {
            return None;
        }
        let event = self.close_position(ExitReason::EndOfData, close, now)?;
        self.recorder.restate_last(self.recorder.balance());
        Some(event)
    }

    fn exit_phase(&mut self, tick: &Tick) -> Option<ExitEvent> {
        let decision = self
            .position
            .position()
            .and_then(|pos| self.risk.evaluate(pos, tick));

        match decision {
            Some(decision) => {
                debug!(
                    reason = %decision.reason,
                    price = %decision.price,
                    gapped = decision.gapped,
                    "exit triggered"
                );
                self.close_position(decision.reason, decision.price, tick.timestamp)
            }
            None => {
                if let Some(pos) = self.position.position_mut() {
                    self.risk.update_excursion(pos, tick);
                }
                None
            }
        }
    }

    fn entry_phase(&mut self, tick: &Tick, signal: Option<Side>) -> EntryDecision {
        if self.position.is_open() {
            return Hold;
        }
        let side = match signal {
            Some(Side::Short) if !self.config.allow_short => return Hold,
            Some(side) => side,
            None => return Hold,
        };
        let now = tick.timestamp;

        if !self.breaker.is_trading_allowed(now) {
            let until = self.breaker.state().cooldown_until;
            debug!(%now, ?until, "entry rejected: circuit breaker active");
            return Rejected(RejectReason::CircuitBreaker { until });
        }

        let notional = self
            .sizer
            .notional(self.recorder.balance(), self.recorder.trades());
        if notional.is_zero() {
            debug!(%now, sizer = self.sizer.name(), "entry rejected: below min notional");
            return Rejected(RejectReason::BelowMinNotional);
        }

        let fill_price = self.execution.fill(tick.close, side, true);
        let quantity = (notional / fill_price)
            .round_dp_with_strategy(QUANTITY_DP, RoundingStrategy::ToZero);
        if quantity <= Decimal::ZERO {
            debug!(%now, %notional, "entry rejected: quantity rounds to zero");
            return Rejected(RejectReason::BelowMinNotional);
        }
        let fee = self.execution.fee(quantity * fill_price);

        let position = Position::new(side, fill_price, quantity, fee, now);
        self.recorder.record_open(&position);
        info!(
            ?side,
            price = %fill_price,
            %quantity,
            notional = %position.notional,
            %fee,
            balance = %self.recorder.balance(),
            "position opened"
        );
        self.position = PositionState::Open(position);

        Opened(FillReport {
            timestamp: now,
            side,
            is_entry: true,
            requested_price: tick.close,
            fill_price,
            quantity,
            fee,
        })
    }

    fn close_position(
        &mut self,
        reason: ExitReason,
        requested_price: Decimal,
        now: DateTime<Utc>,
    ) -> Option<ExitEvent> {
        let position = self.position.take()?;
        let side = position.side;
        let quantity = position.quantity;
        let fill_price = self.execution.fill(requested_price, side, false);
        let fee = self.execution.fee(quantity * fill_price);

        let trade = self
            .recorder
            .record_close(position, fill_price, fee, reason, now);
        info!(
            trade_id = trade.trade_id,
            ?side,
            %reason,
            price = %fill_price,
            pnl = %trade.pnl,
            pnl_pct = %trade.pnl_pct.round_dp(4),
            balance = %self.recorder.balance(),
            "position closed"
        );
        let breaker_tripped = self.breaker.record_trade(&trade, now);

        Some(ExitEvent {
            fill: FillReport {
                timestamp: now,
                side,
                is_entry: false,
                requested_price,
                fill_price,
                quantity,
                fee,
            },
            trade,
            breaker_tripped,
        })
    }

    // ─── Accessors ──────────────────────────────────────────────────

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn position(&self) -> &PositionState {
        &self.position
    }

    pub fn balance(&self) -> Decimal {
        self.recorder.balance()
    }

    pub fn trades(&self) -> &[ClosedTrade] {
        self.recorder.trades()
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        self.recorder.equity_curve()
    }

    pub fn breaker_state(&self) -> &CircuitBreakerState {
        self.breaker.state()
    }

    /// Whether an entry at `now` would pass the breaker. Resets an elapsed
    /// cooldown, exactly as the entry phase would.
    pub fn is_trading_allowed(&mut self, now: DateTime<Utc>) -> bool {
        self.breaker.is_trading_allowed(now)
    }

    pub fn opens(&self) -> usize {
        self.recorder.opens()
    }

    pub fn processed_ticks(&self) -> usize {
        self.processed_ticks
    }

    pub fn skipped_ticks(&self) -> usize {
        self.skipped_ticks
    }

    pub fn sizer_name(&self) -> &str {
        self.sizer.name()
    }

    pub fn into_parts(self) -> SessionParts {
        let final_balance = self.recorder.balance();
        let opens = self.recorder.opens();
        let breaker = self.breaker.snapshot();
        let (trades, equity_curve) = self.recorder.into_parts();
        SessionParts {
            config: self.config,
            trades,
            equity_curve,
            final_balance,
            position: self.position,
            breaker,
            opens,
            processed_ticks: self.processed_ticks,
            skipped_ticks: self.skipped_ticks,
        }
    }
}
