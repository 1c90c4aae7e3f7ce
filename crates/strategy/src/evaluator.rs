use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::json;

use common::{Error, Result, Signal};

use crate::config::{Condition, SignalRule};

/// Evaluates a strategy's declarative rules against the latest indicator
/// and price snapshot.
///
/// Emission is edge-triggered: the evaluator remembers each rule's last
/// known boolean state and fires only on a false→true transition, so a
/// condition that stays true across consecutive candles produces one
/// signal, not one per candle. A rule touching an indicator still inside
/// its warm-up window is treated as false rather than an error.
#[derive(Debug)]
pub struct SignalEvaluator {
    strategy_id: String,
    rules: Vec<SignalRule>,
    /// Latest value per indicator id; `None` while warming up.
    snapshots: HashMap<String, Option<f64>>,
    last_close: Option<f64>,
    last_timestamp: Option<DateTime<Utc>>,
    /// Last known boolean state per rule id.
    rule_state: HashMap<String, bool>,
}

impl SignalEvaluator {
    pub fn new(strategy_id: impl Into<String>, rules: Vec<SignalRule>) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            rules,
            snapshots: HashMap::new(),
            last_close: None,
            last_timestamp: None,
            rule_state: HashMap::new(),
        }
    }

    /// Store the latest value for one indicator id. `None` means the
    /// indicator is still warming up.
    pub fn update_indicator(&mut self, id: &str, value: Option<f64>) {
        self.snapshots.insert(id.to_string(), value);
    }

    /// Record the current close price and candle time.
    pub fn update_market(&mut self, close: f64, timestamp: DateTime<Utc>) -> Result<()> {
        if !close.is_finite() {
            return Err(Error::Processing(format!(
                "non-finite close price at {timestamp}"
            )));
        }
        self.last_close = Some(close);
        self.last_timestamp = Some(timestamp);
        Ok(())
    }

    /// Run every rule against the current snapshot; returns newly fired
    /// signals (zero or more).
    pub fn evaluate(&mut self) -> Result<Vec<Signal>> {
        let (close, timestamp) = match (self.last_close, self.last_timestamp) {
            (Some(c), Some(t)) => (c, t),
            _ => return Ok(Vec::new()),
        };

        let mut holds = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let mut all = true;
            for cond in &rule.conditions {
                if !self.condition_holds(close, cond)? {
                    all = false;
                    break;
                }
            }
            holds.push(all);
        }

        let mut fired = Vec::new();
        for (rule, now_true) in self.rules.iter().zip(holds) {
            let was_true = self
                .rule_state
                .insert(rule.id.clone(), now_true)
                .unwrap_or(false);
            if now_true && !was_true {
                fired.push(make_signal(&self.strategy_id, rule, close, timestamp));
            }
        }
        Ok(fired)
    }

    /// Clear all per-rule transition state and snapshots. Used on strategy
    /// stop, never on pause.
    pub fn reset(&mut self) {
        self.snapshots.clear();
        self.rule_state.clear();
        self.last_close = None;
        self.last_timestamp = None;
    }

    fn condition_holds(&self, close: f64, cond: &Condition) -> Result<bool> {
        Ok(match cond {
            Condition::IndicatorBelow { indicator, value } => {
                matches!(self.value_of(indicator)?, Some(v) if v < *value)
            }
            Condition::IndicatorAbove { indicator, value } => {
                matches!(self.value_of(indicator)?, Some(v) if v > *value)
            }
            Condition::PriceBelowIndicator { indicator } => {
                matches!(self.value_of(indicator)?, Some(v) if close < v)
            }
            Condition::PriceAboveIndicator { indicator } => {
                matches!(self.value_of(indicator)?, Some(v) if close > v)
            }
            Condition::IndicatorBelowIndicator { indicator, other } => {
                matches!(
                    (self.value_of(indicator)?, self.value_of(other)?),
                    (Some(a), Some(b)) if a < b
                )
            }
            Condition::IndicatorAboveIndicator { indicator, other } => {
                matches!(
                    (self.value_of(indicator)?, self.value_of(other)?),
                    (Some(a), Some(b)) if a > b
                )
            }
        })
    }

    /// `Ok(None)` while the indicator is warming up. A reference to an id
    /// the strategy never produced is a broken config invariant and
    /// surfaces as a processing error.
    fn value_of(&self, id: &str) -> Result<Option<f64>> {
        self.snapshots
            .get(id)
            .copied()
            .ok_or_else(|| Error::Processing(format!("rule references unknown indicator '{id}'")))
    }
}

fn make_signal(strategy_id: &str, rule: &SignalRule, close: f64, timestamp: DateTime<Utc>) -> Signal {
    let mut metadata = HashMap::new();
    metadata.insert("rule_id".to_string(), json!(rule.id));
    metadata.insert("conditions".to_string(), json!(rule.conditions.len()));
    Signal {
        id: uuid::Uuid::new_v4().to_string(),
        strategy_id: strategy_id.to_string(),
        timestamp,
        kind: rule.kind,
        side: rule.side,
        price: close,
        confidence: rule.confidence,
        reason: rule
            .reason
            .clone()
            .unwrap_or_else(|| format!("rule '{}' fired", rule.id)),
        metadata,
    }
}
