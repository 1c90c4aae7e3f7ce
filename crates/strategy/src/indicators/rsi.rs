/// RSI (Relative Strength Index) with Wilder's smoothed averages,
/// maintained incrementally across the candle stream.
///
/// Warm-up is `period` candles: the seed gain/loss averages come from the
/// first `period − 1` price deltas, Wilder smoothing applies thereafter.
/// The all-gains / all-losses cases resolve to the 100 / 0 boundaries
/// rather than dividing by zero.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev: Option<f64>,
    seen: usize,
    gain_sum: f64,
    loss_sum: f64,
    avg_gain: f64,
    avg_loss: f64,
    warmed: bool,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev: None,
            seen: 0,
            gain_sum: 0.0,
            loss_sum: 0.0,
            avg_gain: 0.0,
            avg_loss: 0.0,
            warmed: false,
        }
    }

    /// Returns `None` until `period` values have been observed.
    pub fn update(&mut self, value: f64) -> Option<f64> {
        self.seen += 1;
        let prev = match self.prev.replace(value) {
            Some(p) => p,
            None => return None,
        };

        let change = value - prev;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if !self.warmed {
            self.gain_sum += gain;
            self.loss_sum += loss;
            if self.seen < self.period {
                return None;
            }
            let deltas = (self.period - 1) as f64;
            self.avg_gain = self.gain_sum / deltas;
            self.avg_loss = self.loss_sum / deltas;
            self.warmed = true;
            return Some(self.value());
        }

        let n = self.period as f64;
        self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
        self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
        Some(self.value())
    }

    fn value(&self) -> f64 {
        if self.avg_loss == 0.0 {
            return 100.0;
        }
        let rs = self.avg_gain / self.avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }

    pub fn reset(&mut self) {
        self.prev = None;
        self.seen = 0;
        self.gain_sum = 0.0;
        self.loss_sum = 0.0;
        self.avg_gain = 0.0;
        self.avg_loss = 0.0;
        self.warmed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rsi_null_through_warm_up_then_defined() {
        let mut rsi = Rsi::new(14);
        let mut values = Vec::new();
        for i in 0..20 {
            values.push(rsi.update(100.0 + i as f64));
        }
        // None for the first 13 candles, defined from candle 14 onward
        assert!(values[..13].iter().all(Option::is_none));
        assert!(values[13..].iter().all(Option::is_some));
    }

    #[test]
    fn rsi_all_gains_hits_upper_boundary() {
        let mut rsi = Rsi::new(3);
        let mut last = None;
        for price in [10.0, 11.0, 12.0, 13.0, 14.0] {
            last = rsi.update(price);
        }
        let v = last.unwrap();
        assert!((v - 100.0).abs() < 1e-9, "expected 100, got {v}");
    }

    #[test]
    fn rsi_all_losses_hits_lower_boundary() {
        let mut rsi = Rsi::new(3);
        let mut last = None;
        for price in [14.0, 13.0, 12.0, 11.0, 10.0] {
            last = rsi.update(price);
        }
        let v = last.unwrap();
        assert!(v.abs() < 1e-9, "expected 0, got {v}");
    }

    #[test]
    fn rsi_falls_on_sustained_decline() {
        let mut rsi = Rsi::new(14);
        let mut price = 50_000.0;
        let mut last = None;
        for _ in 0..20 {
            last = rsi.update(price);
            price *= 0.98;
        }
        let v = last.unwrap();
        assert!(v < 30.0, "sustained 2% drops should push RSI below 30, got {v}");
    }

    #[test]
    fn rsi_reset_restarts_warm_up() {
        let mut rsi = Rsi::new(3);
        for price in [10.0, 11.0, 12.0] {
            rsi.update(price);
        }
        rsi.reset();
        assert_eq!(rsi.update(10.0), None);
        assert_eq!(rsi.update(11.0), None);
        assert!(rsi.update(12.0).is_some());
    }

    proptest! {
        /// RSI must stay within [0, 100] and never go non-finite for any
        /// finite positive price stream.
        #[test]
        fn rsi_bounded_on_arbitrary_prices(prices in prop::collection::vec(0.0001f64..1_000_000.0, 15..60)) {
            let mut rsi = Rsi::new(14);
            for price in prices {
                if let Some(v) = rsi.update(price) {
                    prop_assert!(v.is_finite());
                    prop_assert!((0.0..=100.0).contains(&v), "RSI out of range: {v}");
                }
            }
        }
    }
}
