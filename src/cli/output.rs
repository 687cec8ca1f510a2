//! Text and JSON rendering for CLI results

use crate::portfolio::PortfolioState;
use crate::risk::PositionDecision;
use crate::volatility::VolatilityForecast;
use serde::Serialize;

/// Pretty-print any serializable value as JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_decision(d: &PositionDecision) {
    println!("Decision {}", d.id);
    println!("  Pair:        {} {}", d.pair, d.signal);
    println!("  Confidence:  {}", d.confidence);
    println!(
        "  Kelly:       {} -> {} -> {}",
        d.kelly_fraction.round_dp(6),
        d.fractional_kelly.round_dp(6),
        d.volatility_adjusted_fraction.round_dp(6)
    );
    println!(
        "  Size:        {} ZAR ({}% of {})",
        d.position_size_zar,
        (d.final_fraction() * rust_decimal_macros::dec!(100)).round_dp(2),
        d.portfolio_value_zar
    );
    println!("  Leverage:    {}x", d.leverage);
    println!(
        "  Stop/Target: {}% / {}%",
        d.stop_loss_pct.round_dp(2),
        d.take_profit_pct.round_dp(2)
    );
    println!("  Hold:        {}h", d.max_hold_time_hours);
    println!(
        "  Regime:      {} (daily vol {})",
        d.volatility_regime, d.daily_volatility
    );
    let status = decision_status(d);
    println!("  Status:      {}", status);
    if let Some(reasoning) = &d.reasoning {
        println!("  Reasoning:   {}", reasoning);
    }
}

/// Downstream status of a decision
fn decision_status(d: &PositionDecision) -> String {
    if d.executed {
        format!("executed ({})", d.execution_id.as_deref().unwrap_or("-"))
    } else if d.is_rejected() {
        format!(
            "rejected by {}: {}",
            d.rejected_by.as_deref().unwrap_or("-"),
            d.rejection_reason.as_deref().unwrap_or("-")
        )
    } else if d.approved == Some(true) {
        "approved".to_string()
    } else {
        "pending".to_string()
    }
}

pub fn print_decision_row(d: &PositionDecision) {
    println!(
        "{}  {}  {:<8} {:<4} {:>12} ZAR  {:>4}x  {:<8} {}",
        d.created_at.format("%Y-%m-%d %H:%M:%S"),
        d.id,
        d.pair,
        d.signal,
        d.position_size_zar,
        d.leverage,
        d.volatility_regime,
        if d.executed { "executed" } else { "open" }
    );
}

pub fn print_forecast(f: &VolatilityForecast) {
    println!("Forecast {} ({})", f.pair, f.trigger.as_str());
    println!("  At:          {}", f.forecast_timestamp.to_rfc3339());
    println!(
        "  Volatility:  {:.4}% daily, {:.2}% annualized",
        f.daily_volatility * 100.0,
        f.annualized_volatility * 100.0
    );
    println!("  Regime:      {}", f.regime);
    let params = f.params();
    println!(
        "  GARCH:       omega={:.6} alpha={:.4} beta={:.4} persistence={:.4}",
        params.omega,
        params.alpha,
        params.beta,
        params.persistence()
    );
    println!("  Returns:     {}", f.observations);
}

pub fn print_portfolio(s: &PortfolioState) {
    println!("Portfolio");
    println!("  Value:        {} ZAR", s.total_value_zar);
    println!("  Peak:         {} ZAR", s.peak_value_zar);
    println!("  Drawdown:     {}%", s.current_drawdown_pct.round_dp(2));
    println!("  Max drawdown: {}%", s.max_drawdown_pct.round_dp(2));
    println!("  Updated:      {}", s.last_updated.to_rfc3339());
    println!("  Version:      {}", s.version);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::decision::fixtures::decision;
    use crate::risk::DecisionReview;

    #[test]
    fn test_decision_status() {
        let mut d = decision("BTCZAR");
        assert_eq!(decision_status(&d), "pending");

        d.apply_review(&DecisionReview::rejected("llm_validator", "news risk"));
        assert_eq!(decision_status(&d), "rejected by llm_validator: news risk");

        d.apply_review(&DecisionReview::approved());
        assert_eq!(decision_status(&d), "approved");

        d.apply_execution("order-7");
        assert_eq!(decision_status(&d), "executed (order-7)");
    }
}
