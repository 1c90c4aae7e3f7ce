/// Exponential moving average, seeded with the SMA of the first `period`
/// values (TradingView convention), then smoothed incrementally.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    alpha: f64,
    seed_sum: f64,
    seen: usize,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            seed_sum: 0.0,
            seen: 0,
            value: None,
        }
    }

    /// Returns `None` until `period` values have been observed.
    pub fn update(&mut self, value: f64) -> Option<f64> {
        self.seen += 1;
        match self.value {
            Some(prev) => {
                let next = value * self.alpha + prev * (1.0 - self.alpha);
                self.value = Some(next);
                Some(next)
            }
            None => {
                self.seed_sum += value;
                if self.seen == self.period {
                    let seed = self.seed_sum / self.period as f64;
                    self.value = Some(seed);
                    Some(seed)
                } else {
                    None
                }
            }
        }
    }

    pub fn current(&self) -> Option<f64> {
        self.value
    }

    pub fn reset(&mut self) {
        self.seed_sum = 0.0;
        self.seen = 0;
        self.value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_warms_up_with_sma_seed() {
        let mut ema = Ema::new(3);
        assert_eq!(ema.update(1.0), None);
        assert_eq!(ema.update(2.0), None);
        // Seed = SMA(1, 2, 3) = 2.0
        assert_eq!(ema.update(3.0), Some(2.0));
    }

    #[test]
    fn ema_of_constant_series_is_constant() {
        let mut ema = Ema::new(5);
        let mut last = None;
        for _ in 0..20 {
            last = ema.update(42.0);
        }
        let v = last.unwrap();
        assert!((v - 42.0).abs() < 1e-9, "expected 42, got {v}");
    }

    #[test]
    fn ema_tracks_toward_latest_value() {
        let mut ema = Ema::new(3);
        for _ in 0..3 {
            ema.update(10.0);
        }
        let v = ema.update(20.0).unwrap();
        // alpha = 0.5 → 20 * 0.5 + 10 * 0.5
        assert!((v - 15.0).abs() < 1e-9, "expected 15, got {v}");
    }
}
