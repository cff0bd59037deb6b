pub mod health;
pub mod insights;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

pub const EXPLAIN_RISK_PATH: &str = "/api/insights/explain-risk";

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health))
        .route(EXPLAIN_RISK_PATH, post(insights::explain_risk))
        .with_state(state)
}
