use std::collections::HashMap;

use tracing::{info, warn};

use common::{
    Candle, Error, FeedKey, InstanceStatus, LifecycleKind, ManagerStatus, PerformanceMetrics,
    Result, Signal, StrategyReport, TradeRecord,
};
use perf::PerformanceTracker;
use risk::{FilterStatistics, OvertradingFilter};
use strategy::{StrategyConfig, StrategyInstance};

use crate::distributor::DataDistributor;
use crate::events::EventBus;

struct ManagedStrategy {
    instance: StrategyInstance,
    filter: Option<OvertradingFilter>,
}

/// Top-level registry wiring the whole pipeline: candle fan-out through
/// the distributor, per-instance processing, optional overtrading
/// filtering, performance recording and event emission.
///
/// State is partitioned per strategy id and never shared across
/// instances; the manager itself is owned by a single runtime task, so
/// no candle dispatch ever interleaves mid-computation.
pub struct StrategyManager {
    strategies: HashMap<String, ManagedStrategy>,
    distributor: DataDistributor,
    tracker: PerformanceTracker,
    events: EventBus,
    history_capacity: usize,
}

impl StrategyManager {
    pub fn new(history_capacity: usize, event_capacity: usize) -> Self {
        Self {
            strategies: HashMap::new(),
            distributor: DataDistributor::new(),
            tracker: PerformanceTracker::new(),
            events: EventBus::new(event_capacity),
            history_capacity,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Validate the config, construct and start an instance, register its
    /// feed subscription and begin performance tracking.
    ///
    /// Fails with `AlreadyExists` (before any state mutation) when the id
    /// is already registered; the original instance is untouched.
    pub fn start_strategy(&mut self, config: StrategyConfig) -> Result<String> {
        config.validate()?;
        if self.strategies.contains_key(&config.id) {
            return Err(Error::AlreadyExists(config.id));
        }

        let id = config.id.clone();
        let key = FeedKey::new(&config.symbol, &config.timeframe);
        let filter = config
            .risk
            .overtrading_protection
            .as_ref()
            .filter(|c| c.enabled)
            .map(|c| OvertradingFilter::new(c.clone()));

        let mut instance = StrategyInstance::new(config, self.history_capacity);
        instance.start()?;

        self.distributor.subscribe_strategy(&id, key);
        self.tracker.track_strategy(&id);
        self.strategies
            .insert(id.clone(), ManagedStrategy { instance, filter });
        self.events.emit_lifecycle(&id, LifecycleKind::Started);
        info!(strategy = %id, total = self.strategies.len(), "Strategy registered");
        Ok(id)
    }

    /// Stop and remove an instance. Indicator/evaluator state and the
    /// overtrading window are discarded; the performance ledger survives
    /// so metrics remain queryable. A later start with the same id is a
    /// cold restart.
    pub fn stop_strategy(&mut self, id: &str) -> Result<()> {
        let mut managed = self
            .strategies
            .remove(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        managed.instance.stop();
        if let Some(filter) = managed.filter.as_mut() {
            filter.reset();
        }
        self.distributor.unsubscribe_strategy(id);
        self.events.emit_lifecycle(id, LifecycleKind::Stopped);
        Ok(())
    }

    pub fn pause_strategy(&mut self, id: &str) -> Result<()> {
        let managed = self
            .strategies
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let before = managed.instance.status();
        managed.instance.pause();
        if before != managed.instance.status() {
            self.events.emit_lifecycle(id, LifecycleKind::Paused);
        }
        Ok(())
    }

    pub fn resume_strategy(&mut self, id: &str) -> Result<()> {
        let managed = self
            .strategies
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let before = managed.instance.status();
        managed.instance.resume();
        if before != managed.instance.status() {
            self.events.emit_lifecycle(id, LifecycleKind::Resumed);
        }
        Ok(())
    }

    /// Single entry point for the external candle feed. Processing errors
    /// never propagate out of the dispatch: each instance contains its own
    /// failures, so one broken strategy cannot disrupt others sharing the
    /// feed.
    pub fn on_new_candle(&mut self, candle: &Candle) {
        for id in self.distributor.subscribers_for(candle) {
            let signals = match self.strategies.get_mut(&id) {
                Some(managed) => {
                    if let Some(filter) = managed.filter.as_mut() {
                        filter.observe_candle(candle);
                    }
                    managed.instance.process_candle(candle)
                }
                None => continue,
            };
            for signal in signals {
                self.handle_signal(&id, signal);
            }
        }
    }

    /// Route a raw signal through the instance's overtrading filter (if
    /// any), record it, and re-emit it for external consumers. A filtered
    /// signal is dropped silently.
    fn handle_signal(&mut self, id: &str, signal: Signal) {
        let Some(managed) = self.strategies.get_mut(id) else {
            return;
        };

        let accepted = match managed.filter.as_mut() {
            Some(filter) => match filter.process_signal(signal) {
                Some(s) => s,
                None => return,
            },
            None => signal,
        };

        info!(
            strategy = id,
            kind = %accepted.kind,
            side = %accepted.side,
            price = accepted.price,
            reason = %accepted.reason,
            "Signal accepted"
        );

        let quantity = managed.instance.config().risk.quantity;
        self.tracker.record_signal(id, &accepted);
        self.tracker.record_trade(TradeRecord {
            id: uuid::Uuid::new_v4().to_string(),
            strategy_id: id.to_string(),
            timestamp: accepted.timestamp,
            kind: accepted.kind,
            side: accepted.side,
            price: accepted.price,
            quantity,
            pnl: None,
        });
        self.events.emit_signal(accepted);
    }

    pub fn get_active_strategies(&self) -> Vec<StrategyReport> {
        self.strategies
            .values()
            .map(|m| m.instance.report())
            .collect()
    }

    /// Unknown ids yield the tracker's idle default snapshot.
    pub fn get_strategy_metrics(&self, id: &str) -> PerformanceMetrics {
        self.tracker.get_performance(id)
    }

    pub fn filter_statistics(&self, id: &str) -> Option<FilterStatistics> {
        self.strategies
            .get(id)?
            .filter
            .as_ref()
            .map(|f| f.statistics())
    }

    pub fn get_status(&self) -> ManagerStatus {
        let mut status = ManagerStatus {
            total: self.strategies.len(),
            distributor: self.distributor.status(),
            ..ManagerStatus::default()
        };
        for managed in self.strategies.values() {
            match managed.instance.status() {
                InstanceStatus::Running => status.running += 1,
                InstanceStatus::Paused => status.paused += 1,
                InstanceStatus::Error => status.errored += 1,
                InstanceStatus::Stopped => {}
            }
        }
        status
    }

    /// Stop every registered strategy, swallowing and logging individual
    /// failures so one broken strategy cannot block global shutdown.
    pub fn shutdown(&mut self) {
        let ids: Vec<String> = self.strategies.keys().cloned().collect();
        info!(count = ids.len(), "Stopping all strategies");
        for id in ids {
            if let Err(e) = self.stop_strategy(&id) {
                warn!(strategy = %id, error = %e, "Failed to stop strategy during shutdown");
            }
        }
    }
}
