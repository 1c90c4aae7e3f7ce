use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One closed OHLCV interval delivered by the upstream candle feed.
///
/// Per (symbol, timeframe) stream timestamps are unique and non-decreasing;
/// the engine trusts upstream ordering and never reorders or gap-fills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timeframe: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn feed_key(&self) -> FeedKey {
        FeedKey::new(&self.symbol, &self.timeframe)
    }
}

/// Identifies one candle stream: a (symbol, timeframe) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedKey {
    pub symbol: String,
    pub timeframe: String,
}

impl FeedKey {
    pub fn new(symbol: impl Into<String>, timeframe: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
        }
    }

    pub fn matches(&self, candle: &Candle) -> bool {
        self.symbol == candle.symbol && self.timeframe == candle.timeframe
    }
}

impl std::fmt::Display for FeedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbol, self.timeframe)
    }
}

/// Whether a signal opens or closes a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Entry,
    Exit,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Entry => write!(f, "entry"),
            SignalKind::Exit => write!(f, "exit"),
        }
    }
}

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// Trading signal emitted by a strategy's signal evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub strategy_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub side: Side,
    pub price: f64,
    /// Rule confidence in [0, 1].
    pub confidence: f64,
    pub reason: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// One entry or exit appended to a strategy's trade ledger.
///
/// `pnl` is present only on an exit trade that closed an open position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: String,
    pub strategy_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub pnl: Option<f64>,
}

/// Open-position record maintained by the performance tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub opened_at: DateTime<Utc>,
}

/// Derived metrics recomputed from the trade ledger, never stored
/// independently of it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub win_rate: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub total_trades: usize,
    pub current_position: Option<PositionSnapshot>,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64,
}

/// Lifecycle status of one strategy instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    #[default]
    Stopped,
    Running,
    Paused,
    Error,
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceStatus::Stopped => write!(f, "stopped"),
            InstanceStatus::Running => write!(f, "running"),
            InstanceStatus::Paused => write!(f, "paused"),
            InstanceStatus::Error => write!(f, "error"),
        }
    }
}

/// Lifecycle notification broadcast by the strategy manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub strategy_id: String,
    pub kind: LifecycleKind,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleKind {
    Started,
    Stopped,
    Paused,
    Resumed,
}

/// Overtrading-protection settings embedded in a strategy's risk block.
///
/// The filter is attached to an instance only when `enabled` is true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OvertradingConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Maximum accepted signals per rolling one-hour window.
    #[serde(default = "default_max_trades_per_hour")]
    pub max_trades_per_hour: u32,
    /// Signals below this confidence are dropped.
    #[serde(default)]
    pub min_confidence: f64,
    /// Entries must agree with the short-term SMA trend.
    #[serde(default)]
    pub require_trend_alignment: bool,
    /// Entries require volume above `volume_factor` × rolling average.
    #[serde(default)]
    pub require_volume_confirmation: bool,
    #[serde(default = "default_volume_factor")]
    pub volume_factor: f64,
    #[serde(default = "default_trend_period")]
    pub trend_period: usize,
}

fn default_max_trades_per_hour() -> u32 {
    3
}

fn default_volume_factor() -> f64 {
    1.2
}

fn default_trend_period() -> usize {
    20
}

impl Default for OvertradingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_trades_per_hour: default_max_trades_per_hour(),
            min_confidence: 0.0,
            require_trend_alignment: false,
            require_volume_confirmation: false,
            volume_factor: default_volume_factor(),
            trend_period: default_trend_period(),
        }
    }
}

/// Per-strategy status row returned by `get_active_strategies`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyReport {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub timeframe: String,
    pub status: InstanceStatus,
    pub total_candles: u64,
    pub total_signals: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub last_update: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Subscriber counts exposed by the data distributor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistributorStatus {
    pub subscriptions: usize,
    /// Subscriber count per feed, keyed "SYMBOL@timeframe".
    pub feeds: HashMap<String, usize>,
}

/// Aggregated engine status backing the control surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManagerStatus {
    pub total: usize,
    pub running: usize,
    pub paused: usize,
    pub errored: usize,
    pub distributor: DistributorStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_and_trade_serialize_kind_as_type() {
        let ts = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let signal = Signal {
            id: "sig-1".into(),
            strategy_id: "s1".into(),
            timestamp: ts,
            kind: SignalKind::Entry,
            side: Side::Long,
            price: 100.0,
            confidence: 1.0,
            reason: "test".into(),
            metadata: HashMap::new(),
        };
        let v = serde_json::to_value(&signal).unwrap();
        assert_eq!(v["type"], "entry");
        assert_eq!(v["side"], "long");
        assert!(v.get("kind").is_none());

        let trade = TradeRecord {
            id: "t1".into(),
            strategy_id: "s1".into(),
            timestamp: ts,
            kind: SignalKind::Exit,
            side: Side::Short,
            price: 90.0,
            quantity: 1.0,
            pnl: Some(10.0),
        };
        let v = serde_json::to_value(&trade).unwrap();
        assert_eq!(v["type"], "exit");
        assert!(v.get("kind").is_none());
    }

    #[test]
    fn signal_json_round_trips() {
        let raw = r#"{
            "id": "sig-1",
            "strategy_id": "s1",
            "timestamp": "2023-11-14T22:13:20Z",
            "type": "entry",
            "side": "long",
            "price": 100.0,
            "confidence": 0.9,
            "reason": "dip"
        }"#;
        let signal: Signal = serde_json::from_str(raw).unwrap();
        assert_eq!(signal.kind, SignalKind::Entry);
        assert!(signal.metadata.is_empty());
    }
}
