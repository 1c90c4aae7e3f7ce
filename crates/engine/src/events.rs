use tokio::sync::broadcast;

use common::{LifecycleEvent, LifecycleKind, Signal};

/// Typed publish/subscribe channels, one per concept, backing the push
/// layer (WebSocket and friends live outside this crate).
///
/// Consumers subscribe explicitly; publishing with no subscribers is fine
/// and the event is discarded.
#[derive(Debug, Clone)]
pub struct EventBus {
    lifecycle_tx: broadcast::Sender<LifecycleEvent>,
    signal_tx: broadcast::Sender<Signal>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (lifecycle_tx, _) = broadcast::channel(capacity);
        let (signal_tx, _) = broadcast::channel(capacity);
        Self {
            lifecycle_tx,
            signal_tx,
        }
    }

    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle_tx.subscribe()
    }

    pub fn subscribe_signals(&self) -> broadcast::Receiver<Signal> {
        self.signal_tx.subscribe()
    }

    pub fn emit_lifecycle(&self, strategy_id: &str, kind: LifecycleKind) {
        let _ = self.lifecycle_tx.send(LifecycleEvent {
            strategy_id: strategy_id.to_string(),
            kind,
            timestamp: chrono::Utc::now(),
        });
    }

    pub fn emit_signal(&self, signal: Signal) {
        let _ = self.signal_tx.send(signal);
    }
}
