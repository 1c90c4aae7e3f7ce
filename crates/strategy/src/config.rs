use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{Candle, Error, OvertradingConfig, Result, SignalKind, Side};

/// Top-level strategies file (TOML).
///
/// Example `config/strategies.toml`:
/// ```toml
/// [[strategy]]
/// id = "btc-rsi-dip"
/// name = "BTC RSI dip buyer"
/// symbol = "BTCUSDT"
/// timeframe = "1m"
///
/// [strategy.meta]
/// version = "1"
///
/// [[strategy.indicators]]
/// id = "rsi14"
/// type = "rsi"
/// period = 14
///
/// [[strategy.signals]]
/// id = "oversold-entry"
/// type = "entry"
/// side = "long"
///
/// [[strategy.signals.conditions]]
/// op = "indicator_below"
/// indicator = "rsi14"
/// value = 30.0
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    #[serde(rename = "strategy")]
    pub strategies: Vec<StrategyConfig>,
}

impl StrategyFileConfig {
    /// Load and validate every strategy from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse '{path}': {e}")))?;
        for cfg in &file.strategies {
            cfg.validate()?;
        }
        Ok(file)
    }
}

/// Definition of one strategy: its feed, indicators, signal rules and risk
/// settings. Immutable for the lifetime of a running instance; changes
/// require stop + restart.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    pub id: String,
    pub name: String,
    /// Trading pair, e.g. "BTCUSDT".
    pub symbol: String,
    /// Candle interval, e.g. "1m".
    pub timeframe: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub indicators: Vec<IndicatorSpec>,
    #[serde(default)]
    pub signals: Vec<SignalRule>,
    #[serde(default)]
    pub risk: RiskSettings,
    pub meta: StrategyMeta,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyMeta {
    pub version: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RiskSettings {
    /// Order quantity in base asset units recorded per accepted signal.
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default)]
    pub overtrading_protection: Option<OvertradingConfig>,
}

fn default_quantity() -> f64 {
    1.0
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            quantity: default_quantity(),
            overtrading_protection: None,
        }
    }
}

/// One indicator owned by a strategy, parameterized independently of the
/// others in the same strategy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndicatorSpec {
    pub id: String,
    #[serde(default)]
    pub source: PriceSource,
    #[serde(flatten)]
    pub kind: IndicatorKind,
}

/// Tagged indicator variant carrying only the parameters valid for it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IndicatorKind {
    Sma { period: usize },
    Ema { period: usize },
    Rsi { period: usize },
    Macd { fast: usize, slow: usize, signal: usize },
}

impl IndicatorKind {
    pub fn label(&self) -> &'static str {
        match self {
            IndicatorKind::Sma { .. } => "sma",
            IndicatorKind::Ema { .. } => "ema",
            IndicatorKind::Rsi { .. } => "rsi",
            IndicatorKind::Macd { .. } => "macd",
        }
    }
}

/// Which candle field an indicator reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Open,
    High,
    Low,
    #[default]
    Close,
    Volume,
}

impl PriceSource {
    pub fn extract(&self, candle: &Candle) -> f64 {
        match self {
            PriceSource::Open => candle.open,
            PriceSource::High => candle.high,
            PriceSource::Low => candle.low,
            PriceSource::Close => candle.close,
            PriceSource::Volume => candle.volume,
        }
    }
}

impl std::fmt::Display for PriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceSource::Open => write!(f, "open"),
            PriceSource::High => write!(f, "high"),
            PriceSource::Low => write!(f, "low"),
            PriceSource::Close => write!(f, "close"),
            PriceSource::Volume => write!(f, "volume"),
        }
    }
}

/// One declarative signal rule. All conditions must hold for the rule to
/// be true; the evaluator fires on the false→true transition only.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignalRule {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub side: Side,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub reason: Option<String>,
    pub conditions: Vec<Condition>,
}

fn default_confidence() -> f64 {
    1.0
}

/// Comparator referencing indicator ids and/or the current close price.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    IndicatorBelow { indicator: String, value: f64 },
    IndicatorAbove { indicator: String, value: f64 },
    PriceBelowIndicator { indicator: String },
    PriceAboveIndicator { indicator: String },
    IndicatorBelowIndicator { indicator: String, other: String },
    IndicatorAboveIndicator { indicator: String, other: String },
}

impl Condition {
    /// All indicator ids this condition references.
    pub fn indicator_refs(&self) -> Vec<&str> {
        match self {
            Condition::IndicatorBelow { indicator, .. }
            | Condition::IndicatorAbove { indicator, .. }
            | Condition::PriceBelowIndicator { indicator }
            | Condition::PriceAboveIndicator { indicator } => vec![indicator],
            Condition::IndicatorBelowIndicator { indicator, other }
            | Condition::IndicatorAboveIndicator { indicator, other } => {
                vec![indicator, other]
            }
        }
    }
}

impl StrategyConfig {
    /// Decode a single strategy from the JSON shape the config store serves.
    pub fn from_json(raw: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate once at start time. Instances trust a validated config and
    /// do not re-check parameters on every access.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("id", &self.id),
            ("name", &self.name),
            ("symbol", &self.symbol),
            ("timeframe", &self.timeframe),
            ("meta.version", &self.meta.version),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Validation(format!("'{field}' must not be empty")));
            }
        }

        if !(self.risk.quantity.is_finite() && self.risk.quantity > 0.0) {
            return Err(Error::Validation(format!(
                "risk.quantity must be a positive number, got {}",
                self.risk.quantity
            )));
        }

        let mut indicator_ids = std::collections::HashSet::new();
        for spec in &self.indicators {
            if spec.id.trim().is_empty() {
                return Err(Error::Validation("indicator id must not be empty".into()));
            }
            if !indicator_ids.insert(spec.id.as_str()) {
                return Err(Error::Validation(format!(
                    "duplicate indicator id '{}'",
                    spec.id
                )));
            }
            match spec.kind {
                IndicatorKind::Sma { period } | IndicatorKind::Ema { period } => {
                    if period < 1 {
                        return Err(Error::Validation(format!(
                            "indicator '{}': period must be >= 1",
                            spec.id
                        )));
                    }
                }
                IndicatorKind::Rsi { period } => {
                    if period < 2 {
                        return Err(Error::Validation(format!(
                            "indicator '{}': RSI period must be >= 2",
                            spec.id
                        )));
                    }
                }
                IndicatorKind::Macd { fast, slow, signal } => {
                    if fast < 1 || signal < 1 || fast >= slow {
                        return Err(Error::Validation(format!(
                            "indicator '{}': MACD requires 1 <= fast < slow and signal >= 1",
                            spec.id
                        )));
                    }
                }
            }
        }

        let mut rule_ids = std::collections::HashSet::new();
        for rule in &self.signals {
            if rule.id.trim().is_empty() {
                return Err(Error::Validation("signal rule id must not be empty".into()));
            }
            if !rule_ids.insert(rule.id.as_str()) {
                return Err(Error::Validation(format!(
                    "duplicate signal rule id '{}'",
                    rule.id
                )));
            }
            if !(0.0..=1.0).contains(&rule.confidence) {
                return Err(Error::Validation(format!(
                    "rule '{}': confidence must be within [0, 1]",
                    rule.id
                )));
            }
            if rule.conditions.is_empty() {
                return Err(Error::Validation(format!(
                    "rule '{}' has no conditions",
                    rule.id
                )));
            }
            for cond in &rule.conditions {
                for referenced in cond.indicator_refs() {
                    if !indicator_ids.contains(referenced) {
                        return Err(Error::Validation(format!(
                            "rule '{}' references unknown indicator '{referenced}'",
                            rule.id
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
