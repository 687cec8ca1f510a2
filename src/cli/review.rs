//! Decision listing and downstream status commands

use super::output::{print_decision_row, print_json};
use crate::engine::RiskEngine;
use crate::risk::{DecisionId, DecisionReview};
use clap::Args;

fn parse_payload(raw: Option<&str>) -> anyhow::Result<Option<serde_json::Value>> {
    raw.map(|s| serde_json::from_str(s).map_err(|e| anyhow::anyhow!("Invalid --payload JSON: {}", e)))
        .transpose()
}

fn report(id: DecisionId, action: &str, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(&serde_json::json!({ "decision_id": id, "action": action }))
    } else {
        println!("Decision {} {}", id, action);
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct DecisionsArgs {
    /// Only decisions for this pair
    #[arg(long)]
    pub pair: Option<String>,

    /// Maximum rows to show
    #[arg(long, default_value = "20")]
    pub limit: usize,
}

impl DecisionsArgs {
    pub async fn execute(&self, engine: &RiskEngine, json: bool) -> anyhow::Result<()> {
        let decisions = engine
            .recent_decisions(self.pair.as_deref(), self.limit)
            .await?;

        if json {
            return print_json(&decisions);
        }
        if decisions.is_empty() {
            println!("No decisions recorded");
        }
        for d in &decisions {
            print_decision_row(d);
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct RejectArgs {
    /// Pair whose latest decision is rejected
    pub pair: String,

    /// Stage rejecting the decision, e.g. llm_validator
    #[arg(long)]
    pub by: String,

    /// Rejection reason
    #[arg(long)]
    pub reason: String,

    /// Target a specific decision of the pair instead of the latest
    #[arg(long)]
    pub id: Option<DecisionId>,

    /// Reviewer payload as JSON
    #[arg(long)]
    pub payload: Option<String>,

    /// Reviewer reasoning text
    #[arg(long)]
    pub reasoning: Option<String>,
}

impl RejectArgs {
    pub async fn execute(&self, engine: &RiskEngine, json: bool) -> anyhow::Result<()> {
        let mut review = DecisionReview::rejected(&self.by, &self.reason);
        review.payload = parse_payload(self.payload.as_deref())?;
        review.reasoning = self.reasoning.clone();

        let id = engine.resolve_decision(&self.pair, self.id).await?;
        engine.review_decision(id, &review).await?;
        report(id, "rejected", json)
    }
}

#[derive(Args, Debug)]
pub struct ApproveArgs {
    /// Pair whose latest decision is approved
    pub pair: String,

    /// Target a specific decision of the pair instead of the latest
    #[arg(long)]
    pub id: Option<DecisionId>,

    /// Reviewer payload as JSON
    #[arg(long)]
    pub payload: Option<String>,

    /// Reviewer reasoning text
    #[arg(long)]
    pub reasoning: Option<String>,
}

impl ApproveArgs {
    pub async fn execute(&self, engine: &RiskEngine, json: bool) -> anyhow::Result<()> {
        let mut review = DecisionReview::approved();
        review.payload = parse_payload(self.payload.as_deref())?;
        review.reasoning = self.reasoning.clone();

        let id = engine.resolve_decision(&self.pair, self.id).await?;
        engine.review_decision(id, &review).await?;
        report(id, "approved", json)
    }
}

#[derive(Args, Debug)]
pub struct ExecuteArgs {
    /// Pair whose latest decision was executed
    pub pair: String,

    /// Execution identifier from the order layer
    #[arg(long)]
    pub execution_id: String,

    /// Target a specific decision of the pair instead of the latest
    #[arg(long)]
    pub id: Option<DecisionId>,
}

impl ExecuteArgs {
    pub async fn execute(&self, engine: &RiskEngine, json: bool) -> anyhow::Result<()> {
        let id = engine.resolve_decision(&self.pair, self.id).await?;
        engine.confirm_execution(id, &self.execution_id).await?;
        report(id, "executed", json)
    }
}
