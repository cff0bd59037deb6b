use axum::{Json, extract::State, extract::rejection::JsonRejection};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::insights::{self, ExplainRiskRequest, RiskExplanation};

pub async fn explain_risk(
    State(state): State<AppState>,
    payload: Result<Json<ExplainRiskRequest>, JsonRejection>,
) -> AppResult<Json<RiskExplanation>> {
    let Json(body) = payload.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    body.validate()?;

    let explanation =
        insights::explain_risk(&state.llm_client, &body.stack, &body.risk_scores).await?;

    Ok(Json(explanation))
}
