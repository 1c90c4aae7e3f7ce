pub mod config;
pub mod evaluator;
pub mod indicators;
pub mod instance;

pub use config::{
    Condition, IndicatorKind, IndicatorSpec, PriceSource, RiskSettings, SignalRule,
    StrategyConfig, StrategyFileConfig, StrategyMeta,
};
pub use evaluator::SignalEvaluator;
pub use indicators::IndicatorCalculator;
pub use instance::StrategyInstance;
