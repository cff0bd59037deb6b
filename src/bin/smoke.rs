//! Calls the explanation client once with a fixed sample stack and prints the
//! result. Needs `OPENAI_API_KEY`; no server or collector is involved.

use std::sync::Arc;

use serde_json::json;

use risk_explainer::config::Config;
use risk_explainer::insights::{self, RiskScores, StackEntry};
use risk_explainer::llm::{LlmClient, openai::OpenAIProvider};
use risk_explainer::telemetry::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_logging();

    let provider = Arc::new(OpenAIProvider::new(
        &config.openai_api_key,
        &config.openai_base_url,
    ));
    let llm_client = LlmClient::new(provider, config.llm_model.clone())
        .with_temperature(config.llm_temperature)
        .with_timeout(Some(config.llm_timeout))
        .with_base_url(&config.openai_base_url);

    let stack: Vec<StackEntry> = serde_json::from_value(json!([
        {"name": "Magnesium Glycinate", "dosage": "400mg", "timing": "evening"},
        {"name": "Zinc Picolinate", "dosage": "30mg", "timing": "evening"},
        {"name": "Calcium", "dosage": "1000mg", "timing": "evening"},
    ]))?;

    // Zinc, calcium and magnesium compete for absorption when taken together.
    let risk_scores: RiskScores = serde_json::from_value(json!({
        "interaction_severity": 0.7,
        "cumulative_load": 0.5,
        "timing_conflicts": 0.8,
    }))?;

    let result = insights::explain_risk(&llm_client, &stack, &risk_scores).await?;

    println!("\nRisk Level: {}", result.risk_level);
    println!("\nSummary: {}", result.user_friendly_summary);
    println!("\nWarnings: {}", result.warnings.join(", "));
    println!("\nNext Steps: {}", result.next_steps.join(", "));
    println!("\nAffected Compounds: {}", result.affected_compounds.join(", "));
    println!("\nConfidence: {:.2}", result.confidence_score);

    Ok(())
}
