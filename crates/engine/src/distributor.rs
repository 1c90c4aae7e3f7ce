use std::collections::HashMap;

use tracing::{debug, info};

use common::{Candle, DistributorStatus, FeedKey};

/// Pub/sub fan-out table: routes each incoming candle to every strategy
/// subscribed to its (symbol, timeframe).
///
/// Delivery order across strategies for the same candle is unspecified;
/// only intra-strategy ordering is guaranteed (the caller dispatches
/// candles one at a time).
#[derive(Debug, Default)]
pub struct DataDistributor {
    subscriptions: HashMap<String, FeedKey>,
}

impl DataDistributor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_strategy(&mut self, id: &str, key: FeedKey) {
        info!(strategy = id, feed = %key, "Strategy subscribed");
        self.subscriptions.insert(id.to_string(), key);
    }

    /// Unknown ids are silently ignored.
    pub fn unsubscribe_strategy(&mut self, id: &str) {
        if self.subscriptions.remove(id).is_some() {
            info!(strategy = id, "Strategy unsubscribed");
        } else {
            debug!(strategy = id, "Unsubscribe for unknown strategy ignored");
        }
    }

    /// Ids of every strategy subscribed to this candle's feed.
    pub fn subscribers_for(&self, candle: &Candle) -> Vec<String> {
        self.subscriptions
            .iter()
            .filter(|(_, key)| key.matches(candle))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn status(&self) -> DistributorStatus {
        let mut feeds: HashMap<String, usize> = HashMap::new();
        for key in self.subscriptions.values() {
            *feeds.entry(key.to_string()).or_insert(0) += 1;
        }
        DistributorStatus {
            subscriptions: self.subscriptions.len(),
            feeds,
        }
    }
}
