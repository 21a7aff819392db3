//! Trade recorder: owns the cash balance, the closed-trade log and the
//! equity curve for one session.
//!
//! Accounting:
//! - open: balance −= notional + entry fee
//! - close: balance += notional + gross PnL − exit fee
//!
//! so the entry fee is paid once at open and a trade's `pnl` only carries the
//! exit fee.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{ClosedTrade, EquityPoint, ExitReason, Position};

#[derive(Debug, Clone)]
pub struct TradeRecorder {
    initial_balance: Decimal,
    balance: Decimal,
    trades: Vec<ClosedTrade>,
    equity_curve: Vec<EquityPoint>,
    opens: usize,
    next_trade_id: u64,
}

impl TradeRecorder {
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            initial_balance,
            balance: initial_balance,
            trades: Vec::new(),
            equity_curve: Vec::new(),
            opens: 0,
            next_trade_id: 1,
        }
    }

    /// Reserve cash for a freshly filled position.
    pub fn record_open(&mut self, position: &Position) {
        self.balance -= position.notional + position.entry_fee;
        self.opens += 1;
    }

    /// Destroy `position` and log the round trip.
    pub fn record_close(
        &mut self,
        position: Position,
        exit_price: Decimal,
        exit_fee: Decimal,
        reason: ExitReason,
        exit_time: DateTime<Utc>,
    ) -> ClosedTrade {
        let gross_pnl = position.unrealized_pnl(exit_price);
        let pnl = gross_pnl - exit_fee;
        let pnl_pct = if position.notional.is_zero() {
            Decimal::ZERO
        } else {
            pnl / position.notional * Decimal::ONE_HUNDRED
        };
        self.balance += position.notional + gross_pnl - exit_fee;

        let trade = ClosedTrade {
            trade_id: self.next_trade_id,
            side: position.side,
            entry_time: position.entry_time,
            entry_price: position.entry_price,
            exit_time,
            exit_price,
            exit_reason: reason,
            quantity: position.quantity,
            notional: position.notional,
            gross_pnl,
            pnl,
            pnl_pct,
            entry_fee: position.entry_fee,
            exit_fee,
            bars_held: position.bars_held,
            hold_secs: (exit_time - position.entry_time).num_seconds(),
        };
        self.next_trade_id += 1;
        self.trades.push(trade.clone());
        trade
    }

    /// Append the mark-to-market equity for this tick.
    pub fn mark(
        &mut self,
        timestamp: DateTime<Utc>,
        position: Option<&Position>,
        price: Decimal,
    ) -> EquityPoint {
        let equity = self.balance + position.map_or(Decimal::ZERO, |p| p.market_value(price));
        let point = EquityPoint { timestamp, equity };
        self.equity_curve.push(point);
        point
    }

    /// Re-mark the latest equity point after a close on the same tick.
    pub fn restate_last(&mut self, equity: Decimal) {
        if let Some(last) = self.equity_curve.last_mut() {
            last.equity = equity;
        }
    }

    pub fn initial_balance(&self) -> Decimal {
        self.initial_balance
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    /// Latest marked equity, or the initial balance before the first tick.
    pub fn last_equity(&self) -> Decimal {
        self.equity_curve
            .last()
            .map_or(self.initial_balance, |p| p.equity)
    }

    pub fn trades(&self) -> &[ClosedTrade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn opens(&self) -> usize {
        self.opens
    }

    pub fn into_parts(self) -> (Vec<ClosedTrade>, Vec<EquityPoint>) {
        (self.trades, self.equity_curve)
    }
}
