use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::pricing::{calculate_cost, server_endpoint};
use super::{ChatRequest, ChatResponse, Provider};
use crate::telemetry::metrics::{
    GEN_AI_COST, GEN_AI_ERROR_COUNT, GEN_AI_OPERATION_DURATION, GEN_AI_TOKEN_USAGE,
};

/// Shared, read-only handle to the model provider. Built once at startup and
/// reused by every request.
pub struct LlmClient {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: Option<f32>,
    timeout: Option<Duration>,
    server_address: String,
    server_port: i64,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
            timeout: None,
            server_address: "api.openai.com".to_string(),
            server_port: 443,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let (address, port) = server_endpoint(base_url);
        self.server_address = address;
        self.server_port = port;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    /// Performs exactly one provider call. There is no retry and no fallback.
    pub async fn complete(&self, req: &ChatRequest) -> anyhow::Result<ChatResponse> {
        let provider_name = self.provider.name().to_string();
        let span_display_name = format!("gen_ai.chat {}", req.model);
        let start = Instant::now();

        let span = tracing::info_span!(
            "gen_ai.chat",
            otel.name = %span_display_name,
            gen_ai.operation.name = "chat",
            gen_ai.provider.name = %provider_name,
            gen_ai.request.model = %req.model,
            gen_ai.output.type = "json",
            server.address = %self.server_address,
            server.port = self.server_port,
            gen_ai.request.temperature = tracing::field::Empty,
            gen_ai.response.model = tracing::field::Empty,
            gen_ai.usage.input_tokens = tracing::field::Empty,
            gen_ai.usage.output_tokens = tracing::field::Empty,
            gen_ai.usage.cost_usd = tracing::field::Empty,
            gen_ai.response.finish_reasons = tracing::field::Empty,
            insights.operation = %req.operation,
            otel.status_code = tracing::field::Empty,
            error.type = tracing::field::Empty,
        );

        if let Some(temperature) = req.temperature {
            span.record("gen_ai.request.temperature", f64::from(temperature));
        }

        span.add_event(
            "gen_ai.user.message",
            vec![
                KeyValue::new("gen_ai.prompt", truncate(&req.prompt, 1000)),
                KeyValue::new("gen_ai.system_instructions", truncate(&req.system, 500)),
            ],
        );

        let call = self.provider.complete(req).instrument(span.clone());
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!(
                    "request timed out after {}s",
                    limit.as_secs_f64()
                )),
            },
            None => call.await,
        };

        let duration = start.elapsed().as_secs_f64();

        match result {
            Ok(mut resp) => {
                resp.provider = provider_name.clone();
                resp.cost_usd = calculate_cost(&resp.model, resp.input_tokens, resp.output_tokens);

                span.record("gen_ai.response.model", resp.model.as_str());
                span.record("gen_ai.usage.input_tokens", resp.input_tokens as i64);
                span.record("gen_ai.usage.output_tokens", resp.output_tokens as i64);
                span.record("gen_ai.usage.cost_usd", resp.cost_usd);
                if !resp.finish_reason.is_empty() {
                    span.record(
                        "gen_ai.response.finish_reasons",
                        resp.finish_reason.as_str(),
                    );
                }

                let completion = resp
                    .content
                    .as_deref()
                    .or(resp.refusal.as_deref())
                    .unwrap_or_default();
                span.add_event(
                    "gen_ai.assistant.message",
                    vec![KeyValue::new(
                        "gen_ai.completion",
                        truncate(completion, 2000),
                    )],
                );

                let op_kv = KeyValue::new("gen_ai.operation.name", "chat");
                let provider_kv = KeyValue::new("gen_ai.provider.name", provider_name);
                let model_kv = KeyValue::new("gen_ai.request.model", resp.model.clone());

                GEN_AI_TOKEN_USAGE.record(
                    f64::from(resp.input_tokens),
                    &[
                        KeyValue::new("gen_ai.token.type", "input"),
                        op_kv.clone(),
                        provider_kv.clone(),
                        model_kv.clone(),
                    ],
                );
                GEN_AI_TOKEN_USAGE.record(
                    f64::from(resp.output_tokens),
                    &[
                        KeyValue::new("gen_ai.token.type", "output"),
                        op_kv.clone(),
                        provider_kv.clone(),
                        model_kv.clone(),
                    ],
                );
                GEN_AI_OPERATION_DURATION.record(
                    duration,
                    &[op_kv.clone(), provider_kv.clone(), model_kv.clone()],
                );
                GEN_AI_COST.add(resp.cost_usd, &[op_kv, provider_kv, model_kv]);

                Ok(resp)
            }
            Err(err) => {
                let error_type = classify_error(&err);
                span.record("otel.status_code", "ERROR");
                span.record("error.type", error_type);

                GEN_AI_ERROR_COUNT.add(
                    1,
                    &[
                        KeyValue::new("gen_ai.provider.name", provider_name.clone()),
                        KeyValue::new("gen_ai.request.model", req.model.clone()),
                        KeyValue::new("error.type", error_type),
                    ],
                );

                tracing::warn!(
                    provider = %provider_name,
                    model = %req.model,
                    error.type = error_type,
                    error = %err,
                    "LLM call failed"
                );

                Err(err)
            }
        }
    }
}

fn classify_error(err: &anyhow::Error) -> &'static str {
    let msg = err.to_string().to_lowercase();
    if msg.contains("rate limit") || msg.contains("429") {
        "rate_limit"
    } else if msg.contains("timeout") || msg.contains("timed out") || msg.contains("deadline") {
        "timeout"
    } else if msg.contains("401")
        || msg.contains("403")
        || msg.contains("auth")
        || msg.contains("api key")
    {
        "auth_error"
    } else if msg.contains("400") || msg.contains("422") || msg.contains("invalid") {
        "invalid_request"
    } else if msg.contains("500")
        || msg.contains("502")
        || msg.contains("503")
        || msg.contains("server")
    {
        "server_error"
    } else if msg.contains("connect")
        || msg.contains("dns")
        || msg.contains("network")
        || msg.contains("reset")
    {
        "network_error"
    } else {
        "unknown_error"
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.char_indices()
            .take_while(|&(i, c)| i + c.len_utf8() <= max)
            .map(|(_, c)| c)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ResponseSchema;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
        delay: Option<Duration>,
    }

    impl CountingProvider {
        fn new(fail: bool, delay: Option<Duration>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
                delay,
            }
        }
    }

    #[async_trait::async_trait]
    impl Provider for CountingProvider {
        async fn complete(&self, _req: &ChatRequest) -> anyhow::Result<ChatResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(anyhow::anyhow!("503 service unavailable"));
            }
            Ok(ChatResponse {
                content: Some("{}".to_string()),
                model: "gpt-4.1-mini-2025-04-14".to_string(),
                input_tokens: 600,
                output_tokens: 300,
                finish_reason: "stop".to_string(),
                ..Default::default()
            })
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "gpt-4.1-mini".to_string(),
            system: "system".to_string(),
            prompt: "prompt".to_string(),
            temperature: None,
            response_schema: ResponseSchema {
                name: "empty".to_string(),
                description: None,
                schema: serde_json::json!({"type": "object"}),
            },
            operation: "test".to_string(),
        }
    }

    #[test]
    fn test_complete_fills_provider_and_cost() {
        let provider = Arc::new(CountingProvider::new(false, None));
        let client = LlmClient::new(provider.clone(), "gpt-4.1-mini");

        let resp = tokio_test::block_on(client.complete(&request())).unwrap();

        assert_eq!(resp.provider, "counting");
        assert!(resp.cost_usd > 0.0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_complete_makes_single_attempt_on_failure() {
        let provider = Arc::new(CountingProvider::new(true, None));
        let client = LlmClient::new(provider.clone(), "gpt-4.1-mini");

        let err = tokio_test::block_on(client.complete(&request())).unwrap_err();

        assert_eq!(err.to_string(), "503 service unavailable");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_complete_times_out() {
        let provider = Arc::new(CountingProvider::new(false, Some(Duration::from_secs(5))));
        let client = LlmClient::new(provider, "gpt-4.1-mini")
            .with_timeout(Some(Duration::from_millis(20)));

        let err = client.complete(&request()).await.unwrap_err();

        assert!(err.to_string().starts_with("request timed out after"));
        assert_eq!(classify_error(&err), "timeout");
    }

    #[test]
    fn test_with_base_url_sets_server_endpoint() {
        let provider = Arc::new(CountingProvider::new(false, None));
        let client =
            LlmClient::new(provider, "gpt-4.1-mini").with_base_url("http://localhost:8081/v1");
        assert_eq!(client.server_address, "localhost");
        assert_eq!(client.server_port, 8081);
        assert_eq!(client.model(), "gpt-4.1-mini");
    }

    #[test]
    fn test_classify_error_categories() {
        let cases = vec![
            ("rate limit exceeded", "rate_limit"),
            ("status 429: too many requests", "rate_limit"),
            ("request timed out after 30s", "timeout"),
            ("401 unauthorized", "auth_error"),
            ("Incorrect API key provided", "auth_error"),
            ("400 bad request", "invalid_request"),
            ("invalid schema for response_format", "invalid_request"),
            ("500 internal server error", "server_error"),
            ("503 service unavailable", "server_error"),
            ("connection refused", "network_error"),
            ("dns resolution failed", "network_error"),
            ("something unexpected", "unknown_error"),
        ];

        for (msg, expected) in cases {
            let err = anyhow::anyhow!("{}", msg);
            assert_eq!(
                classify_error(&err),
                expected,
                "classify_error({msg:?}) should be {expected:?}"
            );
        }
    }

    #[test]
    fn test_truncate_short() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_long() {
        assert_eq!(truncate("hello world", 5), "hello");
    }

    #[test]
    fn test_truncate_multibyte_safe() {
        let result = truncate("hé世界!", 3);
        assert!(result.len() <= 3);
        assert!(result.is_char_boundary(result.len()));
    }
}
