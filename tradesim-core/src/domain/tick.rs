//! Tick: one OHLCV interval plus the externally computed entry/exit signal.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::position::Side;

/// Buy/sell flags attached to a tick by the signal producer.
///
/// The core never computes these; it only reacts to them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub buy: bool,
    pub sell: bool,
}

impl Signal {
    pub const NONE: Signal = Signal {
        buy: false,
        sell: false,
    };

    pub fn buy() -> Self {
        Self {
            buy: true,
            sell: false,
        }
    }

    pub fn sell() -> Self {
        Self {
            buy: false,
            sell: true,
        }
    }

    /// Threshold two model scores into a signal. A score fires when it is
    /// at or above `threshold`.
    pub fn from_scores(buy_score: f64, sell_score: f64, threshold: f64) -> Self {
        Self {
            buy: buy_score.is_finite() && buy_score >= threshold,
            sell: sell_score.is_finite() && sell_score >= threshold,
        }
    }

    /// The side this signal asks for. Conflicting (both) or empty signals
    /// resolve to `None`.
    pub fn direction(&self) -> Option<Side> {
        match (self.buy, self.sell) {
            (true, false) => Some(Side::Long),
            (false, true) => Some(Side::Short),
            _ => None,
        }
    }
}

/// OHLCV interval for one symbol, in time order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    #[serde(default)]
    pub signal: Signal,
}

impl Tick {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            signal: Signal::NONE,
        }
    }

    /// A flat tick where every price equals `price`.
    pub fn flat(timestamp: DateTime<Utc>, price: Decimal) -> Self {
        Self::new(timestamp, price, price, price, price, Decimal::ZERO)
    }

    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signal = signal;
        self
    }

    /// OHLC sanity: strictly positive prices, high/low bracket open and close,
    /// non-negative volume.
    pub fn is_valid(&self) -> bool {
        self.open > Decimal::ZERO
            && self.close > Decimal::ZERO
            && self.low > Decimal::ZERO
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.volume >= Decimal::ZERO
    }

    /// Intrabar range as a percentage of the close. Used as a volatility proxy.
    pub fn range_pct(&self) -> Decimal {
        if self.close <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.high - self.low) / self.close * Decimal::ONE_HUNDRED
    }
}
