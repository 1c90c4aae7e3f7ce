use std::collections::HashMap;

use tracing::{debug, warn};

use common::{PerformanceMetrics, PositionSnapshot, Side, Signal, SignalKind, TradeRecord};

/// Per-strategy trade ledger plus everything derived from it. Metrics are
/// recomputed from the ledger on every write and never stored on their own.
#[derive(Debug, Default)]
struct Ledger {
    trades: Vec<TradeRecord>,
    signals: u64,
    position: Option<PositionSnapshot>,
    last_price: Option<f64>,
    metrics: PerformanceMetrics,
}

/// Maintains trade ledgers and derived metrics per strategy id,
/// independent of live signal evaluation.
#[derive(Debug, Default)]
pub struct PerformanceTracker {
    ledgers: HashMap<String, Ledger>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin tracking a strategy. Tracking an already-tracked id is a no-op.
    pub fn track_strategy(&mut self, id: &str) {
        if self.ledgers.contains_key(id) {
            debug!(strategy = id, "Already tracked");
            return;
        }
        self.ledgers.insert(id.to_string(), Ledger::default());
    }

    /// Drop a strategy's ledger. Untracking an unknown id is a no-op.
    pub fn untrack_strategy(&mut self, id: &str) {
        self.ledgers.remove(id);
    }

    pub fn is_tracked(&self, id: &str) -> bool {
        self.ledgers.contains_key(id)
    }

    /// Tracking-only signal bookkeeping; no trade side effect. Also
    /// refreshes the last seen price used for unrealized PnL.
    pub fn record_signal(&mut self, id: &str, signal: &Signal) {
        let ledger = self.ledgers.entry(id.to_string()).or_default();
        ledger.signals += 1;
        ledger.last_price = Some(signal.price);
        recompute(ledger);
    }

    /// Append a trade to the ledger and update the open-position record.
    ///
    /// An entry sets side/quantity/entry price; an exit computes
    /// side-adjusted PnL against the open position and clears it. An exit
    /// with no open position, or an entry on top of one, is recorded with a
    /// warning and no position change.
    pub fn record_trade(&mut self, trade: TradeRecord) {
        let ledger = self.ledgers.entry(trade.strategy_id.clone()).or_default();
        let mut trade = trade;

        match trade.kind {
            SignalKind::Entry => {
                trade.pnl = None;
                if ledger.position.is_some() {
                    warn!(
                        strategy = %trade.strategy_id,
                        "Entry while a position is open — keeping the original position"
                    );
                } else {
                    ledger.position = Some(PositionSnapshot {
                        side: trade.side,
                        quantity: trade.quantity,
                        entry_price: trade.price,
                        opened_at: trade.timestamp,
                    });
                }
            }
            SignalKind::Exit => match ledger.position.take() {
                Some(pos) => {
                    let pnl = match pos.side {
                        Side::Long => (trade.price - pos.entry_price) * pos.quantity,
                        Side::Short => (pos.entry_price - trade.price) * pos.quantity,
                    };
                    trade.pnl = Some(pnl);
                }
                None => {
                    warn!(
                        strategy = %trade.strategy_id,
                        "Exit with no open position — recorded without PnL"
                    );
                    trade.pnl = None;
                }
            },
        }

        ledger.last_price = Some(trade.price);
        ledger.trades.push(trade);
        recompute(ledger);
    }

    /// Snapshot of the derived metrics. Unknown ids return the idle
    /// default (all zeros, no position) rather than an error.
    pub fn get_performance(&self, id: &str) -> PerformanceMetrics {
        self.ledgers
            .get(id)
            .map(|l| l.metrics.clone())
            .unwrap_or_default()
    }

    pub fn total_signals(&self, id: &str) -> u64 {
        self.ledgers.get(id).map(|l| l.signals).unwrap_or(0)
    }
}

fn recompute(ledger: &mut Ledger) {
    let closed: Vec<f64> = ledger.trades.iter().filter_map(|t| t.pnl).collect();

    let realized: f64 = closed.iter().sum();
    let wins = closed.iter().filter(|p| **p > 0.0).count();
    let win_rate = if closed.is_empty() {
        0.0
    } else {
        wins as f64 / closed.len() as f64
    };

    // Running peak-to-trough on cumulative closed PnL
    let mut cumulative = 0.0f64;
    let mut peak = 0.0f64;
    let mut max_drawdown = 0.0f64;
    for pnl in &closed {
        cumulative += pnl;
        peak = peak.max(cumulative);
        max_drawdown = max_drawdown.max(peak - cumulative);
    }

    let sharpe = simplified_sharpe(&closed);

    let unrealized = match (&ledger.position, ledger.last_price) {
        (Some(pos), Some(price)) => match pos.side {
            Side::Long => (price - pos.entry_price) * pos.quantity,
            Side::Short => (pos.entry_price - price) * pos.quantity,
        },
        _ => 0.0,
    };

    ledger.metrics = PerformanceMetrics {
        total_return: realized,
        win_rate,
        sharpe_ratio: sharpe,
        max_drawdown,
        total_trades: ledger.trades.len(),
        current_position: ledger.position.clone(),
        unrealized_pnl: unrealized,
        realized_pnl: realized,
    };
}

/// Mean over standard deviation of the per-trade PnL distribution;
/// zero when fewer than two closed trades or when the deviation vanishes.
fn simplified_sharpe(pnls: &[f64]) -> f64 {
    if pnls.len() < 2 {
        return 0.0;
    }
    let n = pnls.len() as f64;
    let mean = pnls.iter().sum::<f64>() / n;
    let variance = pnls.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    if std == 0.0 {
        0.0
    } else {
        mean / std
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use common::SignalKind;

    fn ts(i: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + i * 60, 0).unwrap()
    }

    fn trade(i: i64, kind: SignalKind, side: Side, price: f64, quantity: f64) -> TradeRecord {
        TradeRecord {
            id: format!("t{i}"),
            strategy_id: "s1".into(),
            timestamp: ts(i),
            kind,
            side,
            price,
            quantity,
            pnl: None,
        }
    }

    #[test]
    fn long_round_trip_computes_pnl() {
        let mut tracker = PerformanceTracker::new();
        tracker.track_strategy("s1");
        tracker.record_trade(trade(0, SignalKind::Entry, Side::Long, 100.0, 2.0));
        tracker.record_trade(trade(1, SignalKind::Exit, Side::Long, 110.0, 2.0));

        let m = tracker.get_performance("s1");
        assert_eq!(m.total_trades, 2);
        assert!((m.realized_pnl - 20.0).abs() < 1e-9);
        assert_eq!(m.win_rate, 1.0);
        assert!(m.current_position.is_none());
    }

    #[test]
    fn short_round_trip_is_sign_adjusted() {
        let mut tracker = PerformanceTracker::new();
        tracker.record_trade(trade(0, SignalKind::Entry, Side::Short, 100.0, 3.0));
        tracker.record_trade(trade(1, SignalKind::Exit, Side::Short, 90.0, 3.0));

        let m = tracker.get_performance("s1");
        assert!((m.realized_pnl - 30.0).abs() < 1e-9);
    }

    #[test]
    fn drawdown_tracks_peak_to_trough() {
        let mut tracker = PerformanceTracker::new();
        // +50, then -30, then -40: peak 50, trough -20 → drawdown 70
        for (i, (entry, exit)) in [(100.0, 150.0), (150.0, 120.0), (120.0, 80.0)]
            .into_iter()
            .enumerate()
        {
            let i = i as i64 * 2;
            tracker.record_trade(trade(i, SignalKind::Entry, Side::Long, entry, 1.0));
            tracker.record_trade(trade(i + 1, SignalKind::Exit, Side::Long, exit, 1.0));
        }

        let m = tracker.get_performance("s1");
        assert!((m.max_drawdown - 70.0).abs() < 1e-9);
        assert!((m.realized_pnl + 20.0).abs() < 1e-9);
        assert!((m.win_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_ne!(m.sharpe_ratio, 0.0);
    }

    #[test]
    fn exit_without_position_records_no_pnl() {
        let mut tracker = PerformanceTracker::new();
        tracker.record_trade(trade(0, SignalKind::Exit, Side::Long, 100.0, 1.0));
        let m = tracker.get_performance("s1");
        assert_eq!(m.total_trades, 1);
        assert_eq!(m.realized_pnl, 0.0);
        assert_eq!(m.win_rate, 0.0);
    }

    #[test]
    fn second_entry_keeps_original_position() {
        let mut tracker = PerformanceTracker::new();
        tracker.record_trade(trade(0, SignalKind::Entry, Side::Long, 100.0, 1.0));
        tracker.record_trade(trade(1, SignalKind::Entry, Side::Long, 120.0, 5.0));

        let m = tracker.get_performance("s1");
        let pos = m.current_position.unwrap();
        assert_eq!(pos.entry_price, 100.0);
        assert_eq!(pos.quantity, 1.0);
    }

    #[test]
    fn unknown_id_returns_idle_default() {
        let tracker = PerformanceTracker::new();
        let m = tracker.get_performance("nobody");
        assert_eq!(m.total_trades, 0);
        assert_eq!(m.realized_pnl, 0.0);
        assert!(m.current_position.is_none());
    }

    #[test]
    fn tracking_is_idempotent_and_untrack_discards() {
        let mut tracker = PerformanceTracker::new();
        tracker.track_strategy("s1");
        tracker.record_trade(trade(0, SignalKind::Entry, Side::Long, 100.0, 1.0));
        // Re-tracking must not wipe the ledger
        tracker.track_strategy("s1");
        assert_eq!(tracker.get_performance("s1").total_trades, 1);

        tracker.untrack_strategy("s1");
        assert!(!tracker.is_tracked("s1"));
        assert_eq!(tracker.get_performance("s1").total_trades, 0);
        // Untracking again is harmless
        tracker.untrack_strategy("s1");
    }

    #[test]
    fn record_signal_refreshes_unrealized_pnl() {
        let mut tracker = PerformanceTracker::new();
        tracker.record_trade(trade(0, SignalKind::Entry, Side::Long, 100.0, 2.0));

        let mut signal = Signal {
            id: "sig".into(),
            strategy_id: "s1".into(),
            timestamp: ts(1),
            kind: SignalKind::Entry,
            side: Side::Long,
            price: 107.5,
            confidence: 1.0,
            reason: "test".into(),
            metadata: Default::default(),
        };
        tracker.record_signal("s1", &signal);

        let m = tracker.get_performance("s1");
        assert!((m.unrealized_pnl - 15.0).abs() < 1e-9);
        assert_eq!(tracker.total_signals("s1"), 1);

        signal.price = 95.0;
        tracker.record_signal("s1", &signal);
        assert!((tracker.get_performance("s1").unrealized_pnl + 10.0).abs() < 1e-9);
    }
}
