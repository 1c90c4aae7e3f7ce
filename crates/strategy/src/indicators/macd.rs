use super::ema::Ema;

/// MACD (Moving Average Convergence/Divergence).
///
/// MACD line = EMA(fast) − EMA(slow); the signal line is an EMA of the
/// MACD line. The calculator's current value is the MACD line, defined
/// once the slow EMA has warmed up (`slow` candles).
#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast: Ema::new(fast),
            slow: Ema::new(slow),
            signal: Ema::new(signal),
        }
    }

    /// Returns the MACD line, or `None` while the slow EMA is warming up.
    pub fn update(&mut self, value: f64) -> Option<f64> {
        let fast = self.fast.update(value);
        let slow = self.slow.update(value);
        match (fast, slow) {
            (Some(f), Some(s)) => {
                let macd = f - s;
                self.signal.update(macd);
                Some(macd)
            }
            _ => None,
        }
    }

    /// EMA of the MACD line; `None` until `signal` MACD values exist.
    pub fn signal_line(&self) -> Option<f64> {
        self.signal.current()
    }

    pub fn histogram(&self) -> Option<f64> {
        match (self.fast.current(), self.slow.current(), self.signal.current()) {
            (Some(f), Some(s), Some(sig)) => Some(f - s - sig),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.fast.reset();
        self.slow.reset();
        self.signal.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macd_warms_up_with_slow_period() {
        let mut macd = Macd::new(3, 6, 3);
        let mut values = Vec::new();
        for i in 0..10 {
            values.push(macd.update(100.0 + i as f64));
        }
        assert!(values[..5].iter().all(Option::is_none));
        assert!(values[5..].iter().all(Option::is_some));
    }

    #[test]
    fn macd_positive_in_uptrend_negative_in_downtrend() {
        let mut up = Macd::new(3, 6, 3);
        let mut last = None;
        for i in 0..30 {
            last = up.update(100.0 + i as f64 * 2.0);
        }
        assert!(last.unwrap() > 0.0);

        let mut down = Macd::new(3, 6, 3);
        let mut last = None;
        for i in 0..30 {
            last = down.update(200.0 - i as f64 * 2.0);
        }
        assert!(last.unwrap() < 0.0);
    }

    #[test]
    fn macd_signal_line_defined_after_signal_period() {
        let mut macd = Macd::new(3, 6, 4);
        for i in 0..8 {
            macd.update(100.0 + i as f64);
        }
        // 5 warm-up candles for the slow EMA, then 3 MACD values: not enough
        assert!(macd.signal_line().is_none());
        macd.update(108.0);
        assert!(macd.signal_line().is_some());
        assert!(macd.histogram().is_some());
    }

    #[test]
    fn macd_of_constant_series_is_zero() {
        let mut macd = Macd::new(3, 6, 3);
        let mut last = None;
        for _ in 0..20 {
            last = macd.update(50.0);
        }
        assert!(last.unwrap().abs() < 1e-9);
    }
}
