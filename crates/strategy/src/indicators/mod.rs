pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

use common::{BoundedSeries, Candle, Error, Result, SeriesPoint};

use crate::config::{IndicatorKind, IndicatorSpec, PriceSource};

use ema::Ema;
use macd::Macd;
use rsi::Rsi;
use sma::Sma;

/// One indicator's incremental state over an unbounded candle stream.
///
/// `calculate` returns the indicator's current value, or `None` while the
/// warm-up window is unsatisfied. History is a fixed-capacity ring buffer.
/// Indicators are agnostic of one another; there is no cross-indicator
/// coupling within a strategy.
#[derive(Debug, Clone)]
pub struct IndicatorCalculator {
    id: String,
    label: &'static str,
    source: PriceSource,
    state: IndicatorState,
    history: BoundedSeries<SeriesPoint>,
    current: Option<f64>,
}

#[derive(Debug, Clone)]
enum IndicatorState {
    Sma(Sma),
    Ema(Ema),
    Rsi(Rsi),
    Macd(Macd),
}

impl IndicatorState {
    fn update(&mut self, value: f64) -> Option<f64> {
        match self {
            IndicatorState::Sma(s) => s.update(value),
            IndicatorState::Ema(s) => s.update(value),
            IndicatorState::Rsi(s) => s.update(value),
            IndicatorState::Macd(s) => s.update(value),
        }
    }

    fn reset(&mut self) {
        match self {
            IndicatorState::Sma(s) => s.reset(),
            IndicatorState::Ema(s) => s.reset(),
            IndicatorState::Rsi(s) => s.reset(),
            IndicatorState::Macd(s) => s.reset(),
        }
    }
}

impl IndicatorCalculator {
    pub fn new(spec: &IndicatorSpec, history_capacity: usize) -> Self {
        let state = match spec.kind {
            IndicatorKind::Sma { period } => IndicatorState::Sma(Sma::new(period)),
            IndicatorKind::Ema { period } => IndicatorState::Ema(Ema::new(period)),
            IndicatorKind::Rsi { period } => IndicatorState::Rsi(Rsi::new(period)),
            IndicatorKind::Macd { fast, slow, signal } => {
                IndicatorState::Macd(Macd::new(fast, slow, signal))
            }
        };
        Self {
            id: spec.id.clone(),
            label: spec.kind.label(),
            source: spec.source,
            state,
            history: BoundedSeries::new(history_capacity),
            current: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Update rolling state from one candle.
    ///
    /// Returns `Ok(None)` inside the warm-up window. A non-finite input
    /// is a processing error; the caller isolates it per indicator.
    pub fn calculate(&mut self, candle: &Candle) -> Result<Option<f64>> {
        let input = self.source.extract(candle);
        if !input.is_finite() {
            return Err(Error::Processing(format!(
                "indicator '{}': non-finite {} input at {}",
                self.id, self.source, candle.timestamp
            )));
        }
        let value = self.state.update(input);
        if let Some(v) = value {
            self.current = Some(v);
            self.history.push(SeriesPoint {
                timestamp: candle.timestamp,
                value: v,
            });
        }
        Ok(value)
    }

    pub fn current(&self) -> Option<f64> {
        self.current
    }

    pub fn history(&self) -> &BoundedSeries<SeriesPoint> {
        &self.history
    }

    /// Clear all state back to "never seen a candle". Used on strategy stop.
    pub fn reset(&mut self) {
        self.state.reset();
        self.history.clear();
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn candle(i: i64, close: f64) -> Candle {
        Candle {
            symbol: "BTCUSDT".into(),
            timeframe: "1m".into(),
            timestamp: DateTime::<Utc>::from_timestamp(1_700_000_000 + i * 60, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100.0,
        }
    }

    fn ema_spec(period: usize) -> IndicatorSpec {
        IndicatorSpec {
            id: format!("ema{period}"),
            source: PriceSource::Close,
            kind: IndicatorKind::Ema { period },
        }
    }

    #[test]
    fn warm_up_yields_none_then_values() {
        let mut calc = IndicatorCalculator::new(&ema_spec(5), 16);
        for i in 0..4 {
            assert_eq!(calc.calculate(&candle(i, 100.0)).unwrap(), None);
            assert!(calc.current().is_none());
        }
        assert!(calc.calculate(&candle(4, 100.0)).unwrap().is_some());
        assert_eq!(calc.history().len(), 1);
    }

    #[test]
    fn history_stays_bounded() {
        let mut calc = IndicatorCalculator::new(&ema_spec(2), 8);
        for i in 0..100 {
            calc.calculate(&candle(i, 100.0 + i as f64)).unwrap();
        }
        assert_eq!(calc.history().len(), 8);
        // Oldest points were evicted; the newest survives
        let latest = calc.history().latest().unwrap();
        assert_eq!(latest.timestamp, candle(99, 0.0).timestamp);
    }

    #[test]
    fn non_finite_input_is_a_processing_error() {
        let mut calc = IndicatorCalculator::new(&ema_spec(2), 8);
        let err = calc.calculate(&candle(0, f64::NAN)).unwrap_err();
        assert!(matches!(err, Error::Processing(_)));
        // State is untouched; good candles keep working
        assert!(calc.calculate(&candle(1, 10.0)).unwrap().is_none());
        assert!(calc.calculate(&candle(2, 12.0)).unwrap().is_some());
    }

    #[test]
    fn reset_discards_state_and_history() {
        let mut calc = IndicatorCalculator::new(&ema_spec(2), 8);
        for i in 0..5 {
            calc.calculate(&candle(i, 50.0)).unwrap();
        }
        calc.reset();
        assert!(calc.current().is_none());
        assert!(calc.history().is_empty());
        assert_eq!(calc.calculate(&candle(9, 50.0)).unwrap(), None);
    }

    #[test]
    fn volume_source_reads_volume_field() {
        let spec = IndicatorSpec {
            id: "vol-sma".into(),
            source: PriceSource::Volume,
            kind: IndicatorKind::Sma { period: 2 },
        };
        let mut calc = IndicatorCalculator::new(&spec, 8);
        let mut c = candle(0, 1.0);
        c.volume = 10.0;
        calc.calculate(&c).unwrap();
        let mut c = candle(1, 1.0);
        c.volume = 30.0;
        assert_eq!(calc.calculate(&c).unwrap(), Some(20.0));
    }
}
