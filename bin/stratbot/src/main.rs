use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{AppConfig, Candle};
use engine::{ManagerHandle, ManagerRuntime, StrategyManager};
use strategy::StrategyFileConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = AppConfig::from_env();
    info!(config = %cfg.strategy_config_path, feed = %cfg.candle_feed_path, "StratBot starting");

    let strategy_file = StrategyFileConfig::load(&cfg.strategy_config_path)
        .with_context(|| format!("loading strategies from '{}'", cfg.strategy_config_path))?;

    // ── Manager runtime ───────────────────────────────────────────────────────
    let manager = StrategyManager::new(cfg.indicator_history, cfg.event_channel_capacity);
    let (candle_tx, candle_rx) = mpsc::channel::<Candle>(cfg.candle_channel_capacity);
    let (runtime, handle) = ManagerRuntime::new(manager, candle_rx);
    let runtime_task = tokio::spawn(runtime.run());

    // ── Strategies ────────────────────────────────────────────────────────────
    for config in strategy_file.strategies {
        if !config.enabled {
            info!(strategy = %config.id, "Strategy disabled, skipping");
            continue;
        }
        let id = config.id.clone();
        match handle.start_strategy(config).await {
            Ok(_) => {}
            Err(e) => warn!(strategy = %id, error = %e, "Failed to start strategy"),
        }
    }

    let status = handle.status().await?;
    info!(
        total = status.total,
        running = status.running,
        feeds = status.distributor.subscriptions,
        "Strategies loaded"
    );

    // ── Event logger ──────────────────────────────────────────────────────────
    tokio::spawn(log_events(handle.clone()));

    // ── Candle feed replay ────────────────────────────────────────────────────
    let feed_path = cfg.candle_feed_path.clone();
    tokio::spawn(async move {
        if let Err(e) = replay_feed(&feed_path, candle_tx).await {
            error!(path = %feed_path, error = %e, "Candle feed replay failed");
        }
    });

    // ── Shutdown ──────────────────────────────────────────────────────────────
    info!("Engine running. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    for report in handle.active_strategies().await? {
        let metrics = handle.strategy_metrics(&report.id).await?;
        info!(
            strategy = %report.id,
            status = %report.status,
            candles = report.total_candles,
            signals = report.total_signals,
            trades = metrics.total_trades,
            realized_pnl = metrics.realized_pnl,
            win_rate = metrics.win_rate,
            "Final strategy report"
        );
    }

    handle.shutdown().await?;
    runtime_task.await?;
    info!("Exited cleanly");
    Ok(())
}

/// Read a JSON-lines candle file and push each candle into the engine.
/// Malformed lines are logged and skipped.
async fn replay_feed(path: &str, candle_tx: mpsc::Sender<Candle>) -> anyhow::Result<()> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("opening candle feed '{path}'"))?;
    let mut lines = BufReader::new(file).lines();
    let mut sent = 0u64;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Candle>(&line) {
            Ok(candle) => {
                if candle_tx.send(candle).await.is_err() {
                    break;
                }
                sent += 1;
            }
            Err(e) => warn!(error = %e, "Skipping malformed candle line"),
        }
    }

    info!(candles = sent, "Candle feed replay finished");
    Ok(())
}

async fn log_events(handle: ManagerHandle) {
    use tokio::sync::broadcast::error::RecvError;

    let mut lifecycle = handle.subscribe_lifecycle();
    let mut signals = handle.subscribe_signals();
    loop {
        tokio::select! {
            event = lifecycle.recv() => match event {
                Ok(event) => info!(
                    strategy = %event.strategy_id,
                    kind = ?event.kind,
                    "Lifecycle event"
                ),
                Err(RecvError::Lagged(missed)) => warn!(missed, "Lifecycle log lagging"),
                Err(RecvError::Closed) => break,
            },
            signal = signals.recv() => match signal {
                Ok(signal) => info!(
                    strategy = %signal.strategy_id,
                    kind = %signal.kind,
                    side = %signal.side,
                    price = signal.price,
                    confidence = signal.confidence,
                    "Signal"
                ),
                Err(RecvError::Lagged(missed)) => warn!(missed, "Signal log lagging"),
                Err(RecvError::Closed) => break,
            },
        }
    }
}
