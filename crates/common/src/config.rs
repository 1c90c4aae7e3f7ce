/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path to the strategies TOML file.
    pub strategy_config_path: String,

    /// Path to the JSON-lines candle file replayed into the engine.
    pub candle_feed_path: String,

    /// Ring-buffer capacity for per-indicator history.
    pub indicator_history: usize,

    /// Capacity of the candle channel into the manager runtime.
    pub candle_channel_capacity: usize,

    /// Capacity of the lifecycle/signal broadcast channels.
    pub event_channel_capacity: usize,
}

impl AppConfig {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        AppConfig {
            strategy_config_path: optional_env("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string()),
            candle_feed_path: required_env("CANDLE_FEED_PATH"),
            indicator_history: optional_env("INDICATOR_HISTORY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(250),
            candle_channel_capacity: optional_env("CANDLE_CHANNEL_CAPACITY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
            event_channel_capacity: optional_env("EVENT_CHANNEL_CAPACITY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(256),
        }
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
