use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use common::{Candle, Error, InstanceStatus, Result, Signal, StrategyReport};

use crate::config::StrategyConfig;
use crate::evaluator::SignalEvaluator;
use crate::indicators::IndicatorCalculator;

/// One running strategy: a signal evaluator plus its owned indicator
/// calculators behind a lifecycle state machine.
///
/// States: `stopped → running ⇄ paused`, and `running|paused → error` on a
/// failed signal evaluation. `error` requires an external stop + restart.
/// Pause preserves indicator and evaluator state exactly; stop discards it
/// all, so a restart begins cold.
pub struct StrategyInstance {
    config: StrategyConfig,
    status: InstanceStatus,
    indicators: Vec<IndicatorCalculator>,
    evaluator: SignalEvaluator,
    start_time: Option<DateTime<Utc>>,
    pause_time: Option<DateTime<Utc>>,
    total_candles: u64,
    total_signals: u64,
    last_update: Option<DateTime<Utc>>,
    error_message: Option<String>,
}

impl StrategyInstance {
    /// Build cold state from a config that already passed
    /// [`StrategyConfig::validate`]; parameters are not re-checked here.
    pub fn new(config: StrategyConfig, history_capacity: usize) -> Self {
        let indicators = config
            .indicators
            .iter()
            .map(|spec| IndicatorCalculator::new(spec, history_capacity))
            .collect();
        let evaluator = SignalEvaluator::new(&config.id, config.signals.clone());
        Self {
            config,
            status: InstanceStatus::Stopped,
            indicators,
            evaluator,
            start_time: None,
            pause_time: None,
            total_candles: 0,
            total_signals: 0,
            last_update: None,
            error_message: None,
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn status(&self) -> InstanceStatus {
        self.status
    }

    /// stopped → running. Any other state is a rejected transition; an
    /// errored instance must be stopped first.
    pub fn start(&mut self) -> Result<()> {
        if self.status != InstanceStatus::Stopped {
            return Err(Error::Processing(format!(
                "strategy '{}': cannot start from '{}'",
                self.config.id, self.status
            )));
        }
        self.status = InstanceStatus::Running;
        self.start_time = Some(Utc::now());
        self.pause_time = None;
        info!(strategy = %self.config.id, symbol = %self.config.symbol, timeframe = %self.config.timeframe, "Strategy started");
        Ok(())
    }

    /// running → paused. A no-op with a warning in any other state.
    pub fn pause(&mut self) {
        if self.status == InstanceStatus::Running {
            self.status = InstanceStatus::Paused;
            self.pause_time = Some(Utc::now());
            info!(strategy = %self.config.id, "Strategy paused");
        } else {
            warn!(strategy = %self.config.id, status = %self.status, "Pause ignored — strategy is not running");
        }
    }

    /// paused → running. A no-op with a warning in any other state.
    pub fn resume(&mut self) {
        if self.status == InstanceStatus::Paused {
            self.status = InstanceStatus::Running;
            self.pause_time = None;
            info!(strategy = %self.config.id, "Strategy resumed");
        } else {
            warn!(strategy = %self.config.id, status = %self.status, "Resume ignored — strategy is not paused");
        }
    }

    /// Any state → stopped. Resets every indicator, the evaluator and all
    /// counters; calling it on an already-stopped instance is safe.
    pub fn stop(&mut self) {
        for indicator in &mut self.indicators {
            indicator.reset();
        }
        self.evaluator.reset();
        self.total_candles = 0;
        self.total_signals = 0;
        self.start_time = None;
        self.pause_time = None;
        self.last_update = None;
        self.error_message = None;
        if self.status != InstanceStatus::Stopped {
            info!(strategy = %self.config.id, "Strategy stopped");
        }
        self.status = InstanceStatus::Stopped;
    }

    /// Consume one candle: update every indicator, evaluate rules, return
    /// newly fired signals. A no-op unless running.
    ///
    /// A failed indicator update is isolated and logged so one bad
    /// indicator cannot block the others; a failed evaluation moves the
    /// instance to `error`.
    pub fn process_candle(&mut self, candle: &Candle) -> Vec<Signal> {
        if self.status != InstanceStatus::Running {
            return Vec::new();
        }

        self.total_candles += 1;
        self.last_update = Some(candle.timestamp);

        for indicator in &mut self.indicators {
            match indicator.calculate(candle) {
                Ok(value) => {
                    self.evaluator.update_indicator(indicator.id(), value);
                }
                Err(e) => {
                    warn!(
                        strategy = %self.config.id,
                        indicator = %indicator.id(),
                        error = %e,
                        "Indicator update failed — skipping this indicator"
                    );
                }
            }
        }

        if let Err(e) = self.evaluator.update_market(candle.close, candle.timestamp) {
            self.fail(e);
            return Vec::new();
        }

        match self.evaluator.evaluate() {
            Ok(signals) => {
                self.total_signals += signals.len() as u64;
                signals
            }
            Err(e) => {
                self.fail(e);
                Vec::new()
            }
        }
    }

    fn fail(&mut self, e: Error) {
        error!(
            strategy = %self.config.id,
            error = %e,
            "Signal evaluation failed — strategy entering error state"
        );
        self.error_message = Some(e.to_string());
        self.status = InstanceStatus::Error;
    }

    pub fn indicators(&self) -> &[IndicatorCalculator] {
        &self.indicators
    }

    pub fn total_candles(&self) -> u64 {
        self.total_candles
    }

    pub fn total_signals(&self) -> u64 {
        self.total_signals
    }

    pub fn report(&self) -> StrategyReport {
        StrategyReport {
            id: self.config.id.clone(),
            name: self.config.name.clone(),
            symbol: self.config.symbol.clone(),
            timeframe: self.config.timeframe.clone(),
            status: self.status,
            total_candles: self.total_candles,
            total_signals: self.total_signals,
            start_time: self.start_time,
            last_update: self.last_update,
            error_message: self.error_message.clone(),
        }
    }
}
