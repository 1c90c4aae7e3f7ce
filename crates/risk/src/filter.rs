use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use common::{Candle, OvertradingConfig, Signal, SignalKind, Side};

/// Rolling window used for the volume-confirmation average.
const VOLUME_WINDOW: usize = 20;

/// Secondary gate between a strategy's raw signals and downstream
/// handling. Applies rate limiting over a rolling one-hour window plus
/// optional trend/volume corroboration; a signal failing any check is
/// silently dropped and never surfaces downstream.
///
/// Time is stream time: windows age by signal/candle timestamps, so
/// replayed history behaves the same as live data.
pub struct OvertradingFilter {
    config: OvertradingConfig,
    /// Timestamps of accepted signals inside the rolling hour.
    accepted_at: VecDeque<DateTime<Utc>>,
    closes: VecDeque<f64>,
    volumes: VecDeque<f64>,
    total_accepted: u64,
    total_dropped: u64,
}

/// Observability snapshot: the rolling trade count and configured limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterStatistics {
    pub trades_in_window: usize,
    pub max_trades_per_hour: u32,
    pub total_accepted: u64,
    pub total_dropped: u64,
}

impl OvertradingFilter {
    pub fn new(config: OvertradingConfig) -> Self {
        Self {
            config,
            accepted_at: VecDeque::new(),
            closes: VecDeque::new(),
            volumes: VecDeque::new(),
            total_accepted: 0,
            total_dropped: 0,
        }
    }

    /// Feed market context for trend/volume corroboration.
    pub fn observe_candle(&mut self, candle: &Candle) {
        self.closes.push_back(candle.close);
        while self.closes.len() > self.config.trend_period {
            self.closes.pop_front();
        }
        self.volumes.push_back(candle.volume);
        while self.volumes.len() > VOLUME_WINDOW {
            self.volumes.pop_front();
        }
    }

    /// Apply every configured check. Returns the (annotated) signal when
    /// accepted, `None` when dropped.
    pub fn process_signal(&mut self, mut signal: Signal) -> Option<Signal> {
        self.prune(signal.timestamp);

        if signal.confidence < self.config.min_confidence {
            return self.drop_signal(&signal, "confidence below threshold");
        }

        if self.accepted_at.len() >= self.config.max_trades_per_hour as usize {
            return self.drop_signal(&signal, "hourly trade limit reached");
        }

        // Corroboration gates entries only; blocking an exit would trap
        // an open position.
        if signal.kind == SignalKind::Entry {
            if self.config.require_trend_alignment && !self.trend_aligned(&signal) {
                return self.drop_signal(&signal, "trend not aligned");
            }
            if self.config.require_volume_confirmation && !self.volume_confirmed() {
                return self.drop_signal(&signal, "volume not confirmed");
            }
        }

        self.accepted_at.push_back(signal.timestamp);
        self.total_accepted += 1;
        signal.metadata.insert(
            "overtrading_filter".to_string(),
            json!({
                "trades_in_window": self.accepted_at.len(),
                "max_trades_per_hour": self.config.max_trades_per_hour,
            }),
        );
        Some(signal)
    }

    pub fn statistics(&self) -> FilterStatistics {
        FilterStatistics {
            trades_in_window: self.accepted_at.len(),
            max_trades_per_hour: self.config.max_trades_per_hour,
            total_accepted: self.total_accepted,
            total_dropped: self.total_dropped,
        }
    }

    /// Clear rate-limit windows and market context. Used on strategy stop;
    /// pause/resume leaves the filter untouched.
    pub fn reset(&mut self) {
        self.accepted_at.clear();
        self.closes.clear();
        self.volumes.clear();
        self.total_accepted = 0;
        self.total_dropped = 0;
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::hours(1);
        while matches!(self.accepted_at.front(), Some(t) if *t <= cutoff) {
            self.accepted_at.pop_front();
        }
    }

    /// Long entries require price above the short-term SMA, shorts below.
    /// Unconfirmable (still warming up) counts as not aligned.
    fn trend_aligned(&self, signal: &Signal) -> bool {
        if self.closes.len() < self.config.trend_period {
            return false;
        }
        let sma: f64 = self.closes.iter().sum::<f64>() / self.closes.len() as f64;
        match signal.side {
            Side::Long => signal.price > sma,
            Side::Short => signal.price < sma,
        }
    }

    fn volume_confirmed(&self) -> bool {
        let (Some(latest), len) = (self.volumes.back(), self.volumes.len()) else {
            return false;
        };
        if len < 2 {
            return false;
        }
        let avg: f64 = self.volumes.iter().sum::<f64>() / len as f64;
        *latest >= avg * self.config.volume_factor
    }

    fn drop_signal(&mut self, signal: &Signal, why: &str) -> Option<Signal> {
        self.total_dropped += 1;
        debug!(
            strategy = %signal.strategy_id,
            kind = %signal.kind,
            side = %signal.side,
            reason = why,
            "Signal dropped by overtrading filter"
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn ts(minutes: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + minutes * 60, 0).unwrap()
    }

    fn signal(minutes: i64, kind: SignalKind, confidence: f64) -> Signal {
        Signal {
            id: format!("sig-{minutes}"),
            strategy_id: "s1".into(),
            timestamp: ts(minutes),
            kind,
            side: Side::Long,
            price: 100.0,
            confidence,
            reason: "test".into(),
            metadata: HashMap::new(),
        }
    }

    fn candle(minutes: i64, close: f64, volume: f64) -> Candle {
        Candle {
            symbol: "BTCUSDT".into(),
            timeframe: "1m".into(),
            timestamp: ts(minutes),
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }

    fn rate_only(max: u32) -> OvertradingFilter {
        OvertradingFilter::new(OvertradingConfig {
            enabled: true,
            max_trades_per_hour: max,
            ..OvertradingConfig::default()
        })
    }

    #[test]
    fn rate_limit_caps_rolling_hour() {
        let mut filter = rate_only(2);
        assert!(filter.process_signal(signal(0, SignalKind::Entry, 1.0)).is_some());
        assert!(filter.process_signal(signal(10, SignalKind::Entry, 1.0)).is_some());
        assert!(filter.process_signal(signal(20, SignalKind::Entry, 1.0)).is_none());

        // 61 minutes after the first accept, one slot frees up
        assert!(filter.process_signal(signal(61, SignalKind::Entry, 1.0)).is_some());
        assert_eq!(filter.statistics().total_accepted, 3);
        assert_eq!(filter.statistics().total_dropped, 1);
    }

    #[test]
    fn low_confidence_is_dropped() {
        let mut filter = OvertradingFilter::new(OvertradingConfig {
            enabled: true,
            min_confidence: 0.5,
            ..OvertradingConfig::default()
        });
        assert!(filter.process_signal(signal(0, SignalKind::Entry, 0.3)).is_none());
        assert!(filter.process_signal(signal(1, SignalKind::Entry, 0.9)).is_some());
    }

    #[test]
    fn trend_alignment_gates_long_entries() {
        let mut filter = OvertradingFilter::new(OvertradingConfig {
            enabled: true,
            require_trend_alignment: true,
            trend_period: 3,
            ..OvertradingConfig::default()
        });

        // Downtrend context: closes well above the signal price
        for (i, close) in [200.0, 190.0, 180.0].iter().enumerate() {
            filter.observe_candle(&candle(i as i64, *close, 100.0));
        }
        assert!(filter.process_signal(signal(3, SignalKind::Entry, 1.0)).is_none());

        // Uptrend context: signal price above the SMA
        for (i, close) in [80.0, 85.0, 90.0].iter().enumerate() {
            filter.observe_candle(&candle(10 + i as i64, *close, 100.0));
        }
        assert!(filter.process_signal(signal(13, SignalKind::Entry, 1.0)).is_some());
    }

    #[test]
    fn trend_check_unconfirmable_during_warm_up() {
        let mut filter = OvertradingFilter::new(OvertradingConfig {
            enabled: true,
            require_trend_alignment: true,
            trend_period: 5,
            ..OvertradingConfig::default()
        });
        filter.observe_candle(&candle(0, 90.0, 100.0));
        assert!(filter.process_signal(signal(1, SignalKind::Entry, 1.0)).is_none());
    }

    #[test]
    fn volume_confirmation_requires_above_average_volume() {
        let mut filter = OvertradingFilter::new(OvertradingConfig {
            enabled: true,
            require_volume_confirmation: true,
            volume_factor: 1.2,
            ..OvertradingConfig::default()
        });
        for i in 0..5 {
            filter.observe_candle(&candle(i, 100.0, 100.0));
        }
        // Latest volume equals the average — not confirmed
        assert!(filter.process_signal(signal(5, SignalKind::Entry, 1.0)).is_none());

        filter.observe_candle(&candle(6, 100.0, 500.0));
        assert!(filter.process_signal(signal(6, SignalKind::Entry, 1.0)).is_some());
    }

    #[test]
    fn exits_bypass_corroboration_but_not_the_rate_limit() {
        let mut filter = OvertradingFilter::new(OvertradingConfig {
            enabled: true,
            max_trades_per_hour: 1,
            require_trend_alignment: true,
            require_volume_confirmation: true,
            ..OvertradingConfig::default()
        });
        // No market context at all: an entry would fail corroboration
        assert!(filter.process_signal(signal(0, SignalKind::Exit, 1.0)).is_some());
        assert!(filter.process_signal(signal(1, SignalKind::Exit, 1.0)).is_none());
    }

    #[test]
    fn reset_clears_the_window() {
        let mut filter = rate_only(1);
        assert!(filter.process_signal(signal(0, SignalKind::Entry, 1.0)).is_some());
        assert!(filter.process_signal(signal(1, SignalKind::Entry, 1.0)).is_none());

        filter.reset();
        assert_eq!(filter.statistics().trades_in_window, 0);
        assert!(filter.process_signal(signal(2, SignalKind::Entry, 1.0)).is_some());
    }

    #[test]
    fn accepted_signal_is_annotated() {
        let mut filter = rate_only(5);
        let accepted = filter.process_signal(signal(0, SignalKind::Entry, 1.0)).unwrap();
        let note = &accepted.metadata["overtrading_filter"];
        assert_eq!(note["trades_in_window"], json!(1));
        assert_eq!(note["max_trades_per_hour"], json!(5));
    }
}
