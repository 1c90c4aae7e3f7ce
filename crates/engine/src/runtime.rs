use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{info, warn};

use common::{
    Candle, Error, LifecycleEvent, ManagerStatus, PerformanceMetrics, Result, Signal,
    StrategyReport,
};
use strategy::StrategyConfig;

use crate::events::EventBus;
use crate::manager::StrategyManager;

/// Control messages accepted by the runtime task. Every request carries a
/// oneshot for its reply, so callers always learn the outcome.
pub enum ManagerCommand {
    StartStrategy(Box<StrategyConfig>, oneshot::Sender<Result<String>>),
    StopStrategy(String, oneshot::Sender<Result<()>>),
    PauseStrategy(String, oneshot::Sender<Result<()>>),
    ResumeStrategy(String, oneshot::Sender<Result<()>>),
    ActiveStrategies(oneshot::Sender<Vec<StrategyReport>>),
    Metrics(String, oneshot::Sender<PerformanceMetrics>),
    Status(oneshot::Sender<ManagerStatus>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable client for the runtime task. All mutations go through the
/// command channel, so the manager state is only ever touched from one
/// task.
#[derive(Clone)]
pub struct ManagerHandle {
    command_tx: mpsc::Sender<ManagerCommand>,
    events: EventBus,
}

impl ManagerHandle {
    pub async fn start_strategy(&self, config: StrategyConfig) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        self.send(ManagerCommand::StartStrategy(Box::new(config), tx))
            .await?;
        rx.await.map_err(|_| runtime_gone())?
    }

    pub async fn stop_strategy(&self, id: &str) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ManagerCommand::StopStrategy(id.to_string(), tx))
            .await?;
        rx.await.map_err(|_| runtime_gone())?
    }

    pub async fn pause_strategy(&self, id: &str) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ManagerCommand::PauseStrategy(id.to_string(), tx))
            .await?;
        rx.await.map_err(|_| runtime_gone())?
    }

    pub async fn resume_strategy(&self, id: &str) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ManagerCommand::ResumeStrategy(id.to_string(), tx))
            .await?;
        rx.await.map_err(|_| runtime_gone())?
    }

    pub async fn active_strategies(&self) -> Result<Vec<StrategyReport>> {
        let (tx, rx) = oneshot::channel();
        self.send(ManagerCommand::ActiveStrategies(tx)).await?;
        rx.await.map_err(|_| runtime_gone())
    }

    pub async fn strategy_metrics(&self, id: &str) -> Result<PerformanceMetrics> {
        let (tx, rx) = oneshot::channel();
        self.send(ManagerCommand::Metrics(id.to_string(), tx))
            .await?;
        rx.await.map_err(|_| runtime_gone())
    }

    pub async fn status(&self) -> Result<ManagerStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(ManagerCommand::Status(tx)).await?;
        rx.await.map_err(|_| runtime_gone())
    }

    /// Stop every strategy and terminate the runtime task. Resolves once
    /// the manager has finished shutting down.
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ManagerCommand::Shutdown(tx)).await?;
        rx.await.map_err(|_| runtime_gone())
    }

    pub fn subscribe_signals(&self) -> broadcast::Receiver<Signal> {
        self.events.subscribe_signals()
    }

    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe_lifecycle()
    }

    async fn send(&self, command: ManagerCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| runtime_gone())
    }
}

fn runtime_gone() -> Error {
    Error::Processing("manager runtime is no longer running".to_string())
}

/// Single task owning the strategy manager. Candles and control commands
/// are interleaved through one `select!` loop, so state transitions never
/// race with candle processing.
pub struct ManagerRuntime {
    manager: StrategyManager,
    candle_rx: mpsc::Receiver<Candle>,
    command_rx: mpsc::Receiver<ManagerCommand>,
}

impl ManagerRuntime {
    pub fn new(manager: StrategyManager, candle_rx: mpsc::Receiver<Candle>) -> (Self, ManagerHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let handle = ManagerHandle {
            command_tx,
            events: manager.events().clone(),
        };
        (
            Self {
                manager,
                candle_rx,
                command_rx,
            },
            handle,
        )
    }

    pub async fn run(mut self) {
        info!("Manager runtime started");
        let mut feed_open = true;
        loop {
            tokio::select! {
                candle = self.candle_rx.recv(), if feed_open => match candle {
                    Some(candle) => self.manager.on_new_candle(&candle),
                    None => {
                        warn!("Candle feed closed, continuing on commands only");
                        feed_open = false;
                    }
                },
                command = self.command_rx.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command) {
                            break;
                        }
                    }
                    None => {
                        warn!("All handles dropped, shutting down");
                        self.manager.shutdown();
                        break;
                    }
                },
            }
        }
        info!("Manager runtime stopped");
    }

    /// Returns true when the runtime should exit.
    fn handle_command(&mut self, command: ManagerCommand) -> bool {
        match command {
            ManagerCommand::StartStrategy(config, reply) => {
                let _ = reply.send(self.manager.start_strategy(*config));
            }
            ManagerCommand::StopStrategy(id, reply) => {
                let _ = reply.send(self.manager.stop_strategy(&id));
            }
            ManagerCommand::PauseStrategy(id, reply) => {
                let _ = reply.send(self.manager.pause_strategy(&id));
            }
            ManagerCommand::ResumeStrategy(id, reply) => {
                let _ = reply.send(self.manager.resume_strategy(&id));
            }
            ManagerCommand::ActiveStrategies(reply) => {
                let _ = reply.send(self.manager.get_active_strategies());
            }
            ManagerCommand::Metrics(id, reply) => {
                let _ = reply.send(self.manager.get_strategy_metrics(&id));
            }
            ManagerCommand::Status(reply) => {
                let _ = reply.send(self.manager.get_status());
            }
            ManagerCommand::Shutdown(reply) => {
                self.manager.shutdown();
                let _ = reply.send(());
                return true;
            }
        }
        false
    }
}
