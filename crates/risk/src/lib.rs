pub mod filter;

pub use filter::{FilterStatistics, OvertradingFilter};
