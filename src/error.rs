use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use opentelemetry::trace::TraceContextExt;
use serde_json::json;
use thiserror::Error;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("OpenAI API error: {0}")]
    Upstream(String),

    #[error("Schema violation: {0}")]
    SchemaViolation(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::SchemaViolation(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

fn get_trace_id() -> Option<String> {
    let span = Span::current();
    let context = span.context();
    let span_ref = context.span();
    let span_context = span_ref.span_context();

    if span_context.is_valid() {
        Some(span_context.trace_id().to_string())
    } else {
        None
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Validation(msg) => tracing::warn!(error = %msg, "Rejected request"),
            AppError::Upstream(msg) => tracing::error!(error = %msg, "Upstream provider error"),
            AppError::SchemaViolation(msg) => {
                tracing::error!(error = %msg, "Provider reply violated the response schema")
            }
        }

        let status = self.status();
        let detail = self.to_string();

        let body = if let Some(trace_id) = get_trace_id() {
            json!({
                "detail": detail,
                "trace_id": trace_id,
            })
        } else {
            json!({ "detail": detail })
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
