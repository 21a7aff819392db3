//! Structured events emitted by the shadow driver.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradesim_core::domain::{ClosedTrade, Side};
use tradesim_core::risk::CircuitBreakerState;
use tradesim_core::session::{FillReport, RejectReason};

use crate::metrics::PerformanceMetrics;
use crate::suggestions::ConfigSuggestion;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ShadowEvent {
    SignalReceived {
        timestamp: DateTime<Utc>,
        side: Side,
    },
    OrderFilled {
        timestamp: DateTime<Utc>,
        side: Side,
        is_entry: bool,
        requested_price: Decimal,
        fill_price: Decimal,
        quantity: Decimal,
        fee: Decimal,
    },
    PositionClosed(ClosedTrade),
    EntryRejected {
        timestamp: DateTime<Utc>,
        reason: RejectReason,
    },
    CircuitBreakerTriggered {
        state: CircuitBreakerState,
    },
    MetricsSnapshot {
        timestamp: DateTime<Utc>,
        metrics: Box<PerformanceMetrics>,
    },
    ConfigSuggestion(ConfigSuggestion),
}

impl ShadowEvent {
    pub fn order_filled(fill: &FillReport) -> Self {
        ShadowEvent::OrderFilled {
            timestamp: fill.timestamp,
            side: fill.side,
            is_entry: fill.is_entry,
            requested_price: fill.requested_price,
            fill_price: fill.fill_price,
            quantity: fill.quantity,
            fee: fill.fee,
        }
    }

    /// Event name as serialized in the `event` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ShadowEvent::SignalReceived { .. } => "signal_received",
            ShadowEvent::OrderFilled { .. } => "order_filled",
            ShadowEvent::PositionClosed(_) => "position_closed",
            ShadowEvent::EntryRejected { .. } => "entry_rejected",
            ShadowEvent::CircuitBreakerTriggered { .. } => "circuit_breaker_triggered",
            ShadowEvent::MetricsSnapshot { .. } => "metrics_snapshot",
            ShadowEvent::ConfigSuggestion(_) => "config_suggestion",
        }
    }
}
