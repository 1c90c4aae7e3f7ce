pub mod distributor;
pub mod events;
pub mod manager;
pub mod runtime;

pub use distributor::DataDistributor;
pub use events::EventBus;
pub use manager::StrategyManager;
pub use runtime::{ManagerHandle, ManagerRuntime};
