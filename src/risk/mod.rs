//! Risk module
//!
//! Kelly position sizing, dynamic leverage and the audited decision record

pub(crate) mod decision;
mod kelly;
mod leverage;
mod sizing;
mod types;

pub use decision::{DecisionId, DecisionReview, PositionDecision};
pub use kelly::KellyCalculator;
pub use leverage::{LeverageBreakdown, LeverageCalculator};
pub use sizing::{PositionSizer, SizingRequest};
pub use types::RiskError;
