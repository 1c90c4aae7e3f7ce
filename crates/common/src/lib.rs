pub mod config;
pub mod error;
pub mod series;
pub mod types;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use series::{BoundedSeries, SeriesPoint};
pub use types::*;
