use opentelemetry::KeyValue;

use crate::error::AppError;
use crate::llm::{ChatRequest, ChatResponse, LlmClient, ResponseSchema};
use crate::telemetry::metrics::{INSIGHTS_EXPLANATIONS, INSIGHTS_STACK_SIZE};

use super::format::{format_scores, format_stack};
use super::models::{RiskExplanation, RiskScores, StackEntry};

pub const SYSTEM_PROMPT: &str = "You are a supplement safety expert. Analyze the user's stack \
    and provide clear risk explanations based on the provided scores. Be direct and actionable.";

pub fn build_prompt(stack: &[StackEntry], risk_scores: &RiskScores) -> String {
    format!(
        "\nUser's Current Stack:\n{}\n\n\
        Risk Assessment Scores:\n{}\n\n\
        Provide a clear, actionable risk explanation for this supplement combination.\n",
        format_stack(stack),
        format_scores(risk_scores),
    )
}

pub fn explanation_request(llm: &LlmClient, prompt: String) -> ChatRequest {
    ChatRequest {
        model: llm.model().to_string(),
        system: SYSTEM_PROMPT.to_string(),
        prompt,
        temperature: llm.temperature(),
        response_schema: ResponseSchema {
            name: RiskExplanation::SCHEMA_NAME.to_string(),
            description: Some(
                "Structured risk explanation for a supplement stack".to_string(),
            ),
            schema: RiskExplanation::json_schema(),
        },
        operation: "explain_risk".to_string(),
    }
}

#[tracing::instrument(
    name = "insights explain_risk",
    skip(llm, stack, risk_scores),
    fields(
        insights.stack_size = stack.len(),
        insights.scores_count = risk_scores.len(),
        insights.risk_level,
        insights.confidence_score,
    )
)]
pub async fn explain_risk(
    llm: &LlmClient,
    stack: &[StackEntry],
    risk_scores: &RiskScores,
) -> Result<RiskExplanation, AppError> {
    let request = explanation_request(llm, build_prompt(stack, risk_scores));

    let response = llm
        .complete(&request)
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    let explanation = parse_explanation(&response)?;

    let span = tracing::Span::current();
    span.record("insights.risk_level", explanation.risk_level.as_str());
    span.record("insights.confidence_score", explanation.confidence_score);

    INSIGHTS_EXPLANATIONS.add(
        1,
        &[KeyValue::new("risk.level", explanation.risk_level.as_str())],
    );
    INSIGHTS_STACK_SIZE.record(stack.len() as f64, &[]);

    Ok(explanation)
}

fn parse_explanation(response: &ChatResponse) -> Result<RiskExplanation, AppError> {
    if let Some(refusal) = response.refusal.as_deref() {
        return Err(AppError::Upstream(format!(
            "model refused the request: {refusal}"
        )));
    }

    let content = response
        .content
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::SchemaViolation("response contained no content".into()))?;

    let explanation: RiskExplanation = serde_json::from_str(content)
        .map_err(|e| AppError::SchemaViolation(format!("reply did not match schema: {e}")))?;

    if !explanation.confidence_score.is_finite() {
        return Err(AppError::SchemaViolation(
            "confidence_score must be a finite number".into(),
        ));
    }

    Ok(explanation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::models::RiskLevel;

    fn response_with(content: &str) -> ChatResponse {
        ChatResponse {
            content: Some(content.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_prompt_embeds_both_blocks() {
        let stack: Vec<StackEntry> = serde_json::from_str(
            r#"[{"name": "Magnesium Glycinate", "dosage": "400mg", "timing": "evening"},
                {"name": "Zinc Picolinate"}]"#,
        )
        .unwrap();
        let scores: RiskScores =
            serde_json::from_str(r#"{"interaction_severity": 0.2}"#).unwrap();

        let prompt = build_prompt(&stack, &scores);

        assert_eq!(
            prompt,
            "\nUser's Current Stack:\n\
            - Magnesium Glycinate: 400mg (evening)\n\
            - Zinc Picolinate: N/A (unspecified)\n\n\
            Risk Assessment Scores:\n\
            interaction_severity: 0.2\n\n\
            Provide a clear, actionable risk explanation for this supplement combination.\n"
        );
    }

    #[test]
    fn test_system_prompt_text() {
        assert!(SYSTEM_PROMPT.starts_with("You are a supplement safety expert."));
        assert!(SYSTEM_PROMPT.ends_with("Be direct and actionable."));
        assert!(!SYSTEM_PROMPT.contains("  "));
    }

    #[test]
    fn test_parse_valid_reply() {
        let content = r#"{
            "risk_level": "high",
            "user_friendly_summary": "Zinc, calcium and magnesium compete for absorption.",
            "warnings": ["Taking all three together in the evening reduces absorption"],
            "next_steps": ["Move zinc to the morning"],
            "affected_compounds": ["Zinc Picolinate", "Calcium"],
            "confidence_score": 0.82
        }"#;
        let explanation = parse_explanation(&response_with(content)).unwrap();
        assert_eq!(explanation.risk_level, RiskLevel::High);
        assert_eq!(explanation.affected_compounds.len(), 2);
        assert_eq!(explanation.confidence_score, 0.82);
    }

    #[test]
    fn test_parse_does_not_clamp_confidence() {
        let content = r#"{"risk_level": "low", "user_friendly_summary": "ok", "warnings": [],
            "next_steps": [], "affected_compounds": [], "confidence_score": 1.7}"#;
        let explanation = parse_explanation(&response_with(content)).unwrap();
        assert_eq!(explanation.confidence_score, 1.7);
    }

    #[test]
    fn test_parse_rejects_unknown_risk_level() {
        let content = r#"{"risk_level": "severe", "user_friendly_summary": "ok", "warnings": [],
            "next_steps": [], "affected_compounds": [], "confidence_score": 0.5}"#;
        let err = parse_explanation(&response_with(content)).unwrap_err();
        assert!(matches!(err, AppError::SchemaViolation(_)));
    }

    #[test]
    fn test_parse_rejects_missing_field() {
        let content = r#"{"risk_level": "low", "user_friendly_summary": "ok", "warnings": [],
            "next_steps": [], "confidence_score": 0.5}"#;
        let err = parse_explanation(&response_with(content)).unwrap_err();
        assert!(err.to_string().contains("affected_compounds"));
    }

    #[test]
    fn test_parse_rejects_empty_content() {
        let err = parse_explanation(&ChatResponse::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Schema violation: response contained no content"
        );
    }

    #[test]
    fn test_parse_refusal_is_upstream_error() {
        let response = ChatResponse {
            refusal: Some("I can't help with that.".to_string()),
            ..Default::default()
        };
        let err = parse_explanation(&response).unwrap_err();
        assert_eq!(
            err.to_string(),
            "OpenAI API error: model refused the request: I can't help with that."
        );
    }
}
