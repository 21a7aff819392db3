//! Shadow driver: paper trading against a live tick stream.
//!
//! The loop has exactly one suspension point: awaiting the next tick. Each
//! tick then runs through the same [`Session::on_tick`] the backtest driver
//! uses, so identical ticks and config produce identical trades (with the
//! default deterministic slippage).
//!
//! Side outputs:
//! - [`ShadowEvent`]s on an unbounded channel
//! - breaker snapshots through a [`BreakerStore`], on an interval and
//!   whenever the breaker state changes

use futures::{Stream, StreamExt};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use tradesim_core::domain::Tick;
use tradesim_core::execution::{ExecutionSimulator, SlippageModel};
use tradesim_core::risk::CircuitBreakerState;
use tradesim_core::session::{EntryDecision, ExitEvent, TickOutcome, TickReport};
use tradesim_core::{BacktestConfig, Session};

use crate::backtest::RunError;
use crate::events::ShadowEvent;
use crate::metrics::PerformanceMetrics;
use crate::persistence::{BreakerStore, NullStore};
use crate::result::{RunMode, SessionResult};
use crate::suggestions::suggest_adjustments;

/// Shadow-only settings, on top of the session's [`BacktestConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Emit a metrics snapshot and suggestions every N processed ticks (0 = never)
    pub metrics_interval_ticks: usize,
    /// Persist the breaker every N processed ticks (0 = only on change)
    pub snapshot_interval_ticks: usize,
    /// Upper bound of the random slippage added on top of `slippage_bps`
    pub max_extra_slippage_bps: Decimal,
    /// Seed for the random slippage; `None` keeps fills deterministic
    pub seed: Option<u64>,
    /// Close a still-open position with `end_of_data` when the stream ends
    pub close_on_shutdown: bool,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            metrics_interval_ticks: 100,
            snapshot_interval_ticks: 50,
            max_extra_slippage_bps: dec!(5),
            seed: None,
            close_on_shutdown: false,
        }
    }
}

pub struct ShadowDriver<S: BreakerStore = NullStore> {
    config: BacktestConfig,
    shadow: ShadowConfig,
    store: S,
    events: Option<UnboundedSender<ShadowEvent>>,
}

impl ShadowDriver<NullStore> {
    pub fn new(config: BacktestConfig, shadow: ShadowConfig) -> Result<Self, RunError> {
        config.validate()?;
        Ok(Self {
            config,
            shadow,
            store: NullStore,
            events: None,
        })
    }
}

impl<S: BreakerStore> ShadowDriver<S> {
    /// Persist and recover breaker snapshots through `store`.
    pub fn with_store<T: BreakerStore>(self, store: T) -> ShadowDriver<T> {
        ShadowDriver {
            config: self.config,
            shadow: self.shadow,
            store,
            events: self.events,
        }
    }

    pub fn with_events(mut self, events: UnboundedSender<ShadowEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume `ticks` until the stream ends.
    ///
    /// Returns the session summary and the store, so callers can inspect
    /// what was persisted.
    pub async fn run<T>(mut self, ticks: T) -> Result<(SessionResult, S), RunError>
    where
        T: Stream<Item = Tick>,
    {
        let execution = ExecutionSimulator::new(
            SlippageModel::for_shadow(
                self.config.slippage_bps,
                self.shadow.max_extra_slippage_bps,
                self.shadow.seed,
            ),
            self.config.fee_pct,
        );
        let mut session = Session::new(self.config.clone())?.with_execution(execution);

        match self.store.load() {
            Ok(Some(state)) => {
                info!(
                    triggered = state.triggered,
                    consecutive_losses = state.consecutive_losses,
                    "restored circuit breaker snapshot"
                );
                session = session.with_breaker_state(state);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "breaker snapshot unreadable, starting fresh"),
        }
        let mut persisted = session.breaker_state().clone();

        info!(
            slippage = session_slippage_name(&self.shadow),
            sizer = session.sizer_name(),
            "shadow session started"
        );

        let mut ticks = std::pin::pin!(ticks);
        while let Some(tick) = ticks.next().await {
            let report = match session.on_tick(&tick) {
                TickOutcome::Processed(report) => report,
                TickOutcome::Skipped(_) => continue,
            };
            self.emit_tick(&report, session.breaker_state());

            let processed = session.processed_ticks();
            if every(self.shadow.metrics_interval_ticks, processed) {
                self.emit_metrics(&session, &report);
            }
            let changed = *session.breaker_state() != persisted;
            if changed || every(self.shadow.snapshot_interval_ticks, processed) {
                persisted = session.breaker_state().clone();
                self.persist(&persisted);
            }
        }

        if self.shadow.close_on_shutdown {
            if let Some(exit) = session.finish() {
                self.emit_exit(&exit, session.breaker_state());
            }
        }
        self.persist(session.breaker_state());

        let result = SessionResult::from_parts(session.into_parts(), RunMode::Shadow);
        info!(
            ticks = result.processed_ticks,
            trades = result.trades.len(),
            open = result.open_position.is_some(),
            "shadow session ended"
        );
        Ok((result, self.store))
    }

    fn emit(&self, event: ShadowEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).is_err() {
                debug!("event receiver dropped");
            }
        }
    }

    fn emit_tick(&self, report: &TickReport, breaker: &CircuitBreakerState) {
        if let Some(side) = report.signal {
            self.emit(ShadowEvent::SignalReceived {
                timestamp: report.timestamp,
                side,
            });
        }
        if let Some(exit) = &report.exit {
            self.emit_exit(exit, breaker);
        }
        match &report.entry {
            EntryDecision::Opened(fill) => self.emit(ShadowEvent::order_filled(fill)),
            EntryDecision::Rejected(reason) => self.emit(ShadowEvent::EntryRejected {
                timestamp: report.timestamp,
                reason: *reason,
            }),
            EntryDecision::Hold => {}
        }
    }

    fn emit_exit(&self, exit: &ExitEvent, breaker: &CircuitBreakerState) {
        self.emit(ShadowEvent::order_filled(&exit.fill));
        self.emit(ShadowEvent::PositionClosed(exit.trade.clone()));
        if let Some(reason) = exit.breaker_tripped {
            warn!(%reason, until = ?breaker.cooldown_until, "circuit breaker triggered");
            self.emit(ShadowEvent::CircuitBreakerTriggered {
                state: breaker.clone(),
            });
        }
    }

    fn emit_metrics(&self, session: &Session, report: &TickReport) {
        let metrics = PerformanceMetrics::compute(
            session.trades(),
            session.equity_curve(),
            self.config.initial_balance,
            self.config.periods_per_year,
        );
        let suggestions = suggest_adjustments(&self.config, session.trades(), &metrics);
        self.emit(ShadowEvent::MetricsSnapshot {
            timestamp: report.timestamp,
            metrics: Box::new(metrics),
        });
        for suggestion in suggestions {
            info!(
                parameter = %suggestion.parameter,
                current = %suggestion.current,
                suggested = %suggestion.suggested,
                confidence = suggestion.confidence,
                "config suggestion"
            );
            self.emit(ShadowEvent::ConfigSuggestion(suggestion));
        }
    }

    fn persist(&mut self, state: &CircuitBreakerState) {
        if let Err(e) = self.store.save(state) {
            warn!(error = %e, "failed to persist breaker snapshot, continuing in memory");
        }
    }
}

fn every(interval: usize, processed: usize) -> bool {
    interval > 0 && processed % interval == 0
}

fn session_slippage_name(shadow: &ShadowConfig) -> &'static str {
    if shadow.seed.is_some() && shadow.max_extra_slippage_bps > Decimal::ZERO {
        "stochastic"
    } else {
        "fixed"
    }
}
