//! Per-decision state machine

use std::fmt;

/// Stage a single `decide` call has reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionStage {
    Start,
    VolatilityRefreshed,
    PortfolioSnapshotted,
    Sized,
    /// Terminal: the sizer declined to trade
    NoTrade,
    Leveraged,
    /// Terminal: the decision is persisted
    Audited,
}

impl DecisionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStage::Start => "START",
            DecisionStage::VolatilityRefreshed => "VOLATILITY_REFRESHED",
            DecisionStage::PortfolioSnapshotted => "PORTFOLIO_SNAPSHOTTED",
            DecisionStage::Sized => "SIZED",
            DecisionStage::NoTrade => "NO_TRADE",
            DecisionStage::Leveraged => "LEVERAGED",
            DecisionStage::Audited => "AUDITED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DecisionStage::NoTrade | DecisionStage::Audited)
    }

    /// Whether `next` directly follows this stage
    pub fn can_advance_to(&self, next: DecisionStage) -> bool {
        use DecisionStage::*;
        matches!(
            (self, next),
            (Start, VolatilityRefreshed)
                | (VolatilityRefreshed, PortfolioSnapshotted)
                | (PortfolioSnapshotted, Sized)
                | (PortfolioSnapshotted, NoTrade)
                | (Sized, Leveraged)
                | (Leveraged, Audited)
        )
    }

    /// Move to `next`, logging the transition
    pub fn advance(self, next: DecisionStage, pair: &str) -> DecisionStage {
        debug_assert!(
            self.can_advance_to(next),
            "illegal stage transition {self} -> {next}"
        );
        if next.is_terminal() {
            tracing::debug!(pair, from = self.as_str(), outcome = next.as_str(), "Decision finished");
        } else {
            tracing::debug!(pair, from = self.as_str(), to = next.as_str(), "Decision stage");
        }
        next
    }
}

impl fmt::Display for DecisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
