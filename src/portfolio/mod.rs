//! Portfolio module
//!
//! High-water mark and drawdown tracking over the singleton portfolio row

mod state;
mod tracker;

pub use state::{drawdown_pct, PortfolioState};
pub use tracker::{PortfolioError, PortfolioStateTracker};
