//! End-to-end tests of the per-tick pipeline.
//!
//! Tests:
//! 1. A 3.5% rise after entry exits at take-profit for ~3% minus costs
//! 2. Five losing setups with a 3-loss breaker: trades 4 and 5 are rejected
//! 3. Stop-loss wins a same-bar tie with take-profit
//! 4. Frictionless long PnL equals (exit − entry) × quantity
//! 5. Shorts mirror longs when enabled
//! 6. A restored breaker snapshot keeps the cooldown
//! 7. Every opened position is closed by `finish()`
//! 8. A reversal closes the long; the short opens on the next signal tick

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tradesim_core::domain::{ExitReason, Side, Signal, Tick};
use tradesim_core::session::{EntryDecision, RejectReason, TickOutcome, TickReport};
use tradesim_core::{BacktestConfig, Session};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn t(min: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 2, 13, 30, 0).unwrap() + Duration::minutes(min)
}

fn bar(min: i64, o: Decimal, h: Decimal, l: Decimal, c: Decimal) -> Tick {
    Tick::new(t(min), o, h, l, c, dec!(1000))
}

fn scenario_config() -> BacktestConfig {
    let mut config = BacktestConfig {
        initial_balance: dec!(10000),
        position_size_pct: dec!(2),
        fee_pct: dec!(0.1),
        ..BacktestConfig::default()
    };
    config.risk.stop_loss_pct = dec!(2);
    config.risk.take_profit_pct = dec!(3);
    config
}

fn frictionless() -> BacktestConfig {
    BacktestConfig {
        fee_pct: Decimal::ZERO,
        slippage_bps: Decimal::ZERO,
        ..BacktestConfig::default()
    }
}

fn report(outcome: TickOutcome) -> TickReport {
    match outcome {
        TickOutcome::Processed(r) => *r,
        TickOutcome::Skipped(reason) => panic!("unexpected skip: {reason:?}"),
    }
}

// ──────────────────────────────────────────────
// Scenarios
// ──────────────────────────────────────────────

#[test]
fn rising_path_exits_at_take_profit() {
    let mut s = Session::new(scenario_config()).unwrap();
    s.on_tick(&Tick::flat(t(0), dec!(100)).with_signal(Signal::buy()));
    assert!(s.position().is_open());

    let path = [
        bar(1, dec!(100), dec!(101), dec!(99.5), dec!(100.8)),
        bar(2, dec!(100.8), dec!(102), dec!(100.5), dec!(101.8)),
        bar(3, dec!(101.8), dec!(103.6), dec!(101.5), dec!(103.5)),
    ];
    let mut exit = None;
    for tick in &path {
        if let Some(e) = report(s.on_tick(tick)).exit {
            exit = Some(e);
        }
    }

    let exit = exit.expect("take-profit should fire on the 3.5% rise");
    let trade = &exit.trade;
    assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
    assert_eq!(trade.exit_reason.as_str(), "take_profit");
    // 3% target less the exit fee and slippage on both legs
    assert!(trade.pnl_pct > dec!(2.7) && trade.pnl_pct < dec!(3), "pnl% {}", trade.pnl_pct);
    assert!(trade.pnl > Decimal::ZERO);
    assert!(!s.position().is_open());
    assert_eq!(s.equity_curve().len(), 4);
}

#[test]
fn breaker_rejects_entries_after_three_losses() {
    let mut config = scenario_config();
    config.risk.circuit_breaker.max_consecutive_losses = 3;
    config.risk.circuit_breaker.cooldown_minutes = 60;
    let mut s = Session::new(config).unwrap();

    let mut opened = 0;
    let mut rejected = 0;
    let mut minute = 0;
    for _ in 0..5 {
        let entry = report(s.on_tick(&Tick::flat(t(minute), dec!(100)).with_signal(Signal::buy())));
        match entry.entry {
            EntryDecision::Opened(_) => opened += 1,
            EntryDecision::Rejected(RejectReason::CircuitBreaker { until }) => {
                assert!(until.is_some());
                rejected += 1;
            }
            other => panic!("unexpected entry decision {other:?}"),
        }
        // drop through the 2% stop
        s.on_tick(&bar(minute + 1, dec!(100), dec!(100), dec!(97), dec!(97.5)));
        minute += 2;
    }

    assert_eq!(opened, 3);
    assert_eq!(rejected, 2);
    assert_eq!(s.trades().len(), 3);
    assert!(s
        .trades()
        .iter()
        .all(|tr| tr.exit_reason == ExitReason::StopLoss && tr.is_loser()));

    let until = s.breaker_state().cooldown_until.unwrap();
    assert_eq!(until, t(5) + Duration::minutes(60));
    assert!(!s.is_trading_allowed(until - Duration::seconds(1)));
    assert!(s.is_trading_allowed(until));
    assert_eq!(s.breaker_state().consecutive_losses, 0);

    let resumed = report(s.on_tick(&Tick::flat(until, dec!(100)).with_signal(Signal::buy())));
    assert!(matches!(resumed.entry, EntryDecision::Opened(_)));
}

#[test]
fn stop_loss_wins_same_bar_tie() {
    let mut s = Session::new(scenario_config()).unwrap();
    s.on_tick(&Tick::flat(t(0), dec!(100)).with_signal(Signal::buy()));
    let r = report(s.on_tick(&bar(1, dec!(100), dec!(110), dec!(90), dec!(100))));
    assert_eq!(r.exit.unwrap().trade.exit_reason, ExitReason::StopLoss);
}

#[test]
fn frictionless_long_pnl_identity() {
    let mut s = Session::new(frictionless()).unwrap();
    s.on_tick(&Tick::flat(t(0), dec!(123.45)).with_signal(Signal::buy()));
    s.on_tick(&Tick::flat(t(1), dec!(124.10)).with_signal(Signal::sell()));
    let trade = &s.trades()[0];
    assert_eq!(trade.exit_reason, ExitReason::Signal);
    assert_eq!(trade.pnl, (trade.exit_price - trade.entry_price) * trade.quantity);
    assert_eq!(s.balance(), dec!(10000) + trade.pnl);
}

#[test]
fn short_profits_when_price_falls() {
    let config = BacktestConfig {
        allow_short: true,
        ..frictionless()
    };
    let mut s = Session::new(config).unwrap();
    s.on_tick(&Tick::flat(t(0), dec!(100)).with_signal(Signal::sell()));
    let r = report(s.on_tick(&bar(1, dec!(99), dec!(99.5), dec!(96.5), dec!(97))));
    let trade = r.exit.unwrap().trade;
    assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
    assert_eq!(trade.exit_price, dec!(97));
    assert_eq!(trade.pnl, dec!(6));
}

#[test]
fn restored_breaker_keeps_cooldown() {
    let mut config = scenario_config();
    config.risk.circuit_breaker.max_consecutive_losses = 1;
    let mut first = Session::new(config.clone()).unwrap();
    first.on_tick(&Tick::flat(t(0), dec!(100)).with_signal(Signal::buy()));
    first.on_tick(&bar(1, dec!(100), dec!(100), dec!(97), dec!(97.5)));
    let snapshot = first.breaker_state().clone();
    assert!(snapshot.triggered);

    let mut second = Session::new(config).unwrap().with_breaker_state(snapshot);
    let r = report(second.on_tick(&Tick::flat(t(10), dec!(100)).with_signal(Signal::buy())));
    assert!(matches!(
        r.entry,
        EntryDecision::Rejected(RejectReason::CircuitBreaker { .. })
    ));
}

#[test]
fn finish_closes_everything_opened() {
    let mut s = Session::new(frictionless()).unwrap();
    for i in 0..20 {
        let price = dec!(100) + Decimal::from(i % 3);
        let signal = if i % 4 == 0 { Signal::buy() } else { Signal::NONE };
        s.on_tick(&Tick::flat(t(i), price).with_signal(signal));
    }
    s.finish();
    assert!(!s.position().is_open());
    assert_eq!(s.opens(), s.trades().len());
    assert_eq!(s.equity_curve().len(), 20);
    assert_eq!(s.equity_curve().last().unwrap().equity, s.balance());
}

#[test]
fn equity_curve_is_time_monotonic() {
    let mut s = Session::new(scenario_config()).unwrap();
    for i in 0..50 {
        let price = dec!(100) + Decimal::from(i % 7) - dec!(3);
        let signal = match i % 5 {
            0 => Signal::buy(),
            3 => Signal::sell(),
            _ => Signal::NONE,
        };
        s.on_tick(&Tick::flat(t(i), price).with_signal(signal));
    }
    let curve = s.equity_curve();
    assert_eq!(curve.len(), 50);
    assert!(curve.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[test]
fn reversal_closes_then_flips_on_next_signal() {
    let config = BacktestConfig {
        allow_short: true,
        ..frictionless()
    };
    let mut s = Session::new(config).unwrap();
    s.on_tick(&Tick::flat(t(0), dec!(100)).with_signal(Signal::buy()));

    let r = report(s.on_tick(&Tick::flat(t(1), dec!(100.5)).with_signal(Signal::sell())));
    assert_eq!(r.exit.unwrap().trade.exit_reason, ExitReason::Signal);
    assert_eq!(r.entry, EntryDecision::Hold);
    assert!(!s.position().is_open());

    let r = report(s.on_tick(&Tick::flat(t(2), dec!(100.4)).with_signal(Signal::sell())));
    assert!(matches!(r.entry, EntryDecision::Opened(_)));
    assert_eq!(s.position().position().unwrap().side, Side::Short);
    assert_eq!(s.opens(), 2);
}
