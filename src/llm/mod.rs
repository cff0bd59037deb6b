pub mod client;
pub mod openai;
pub mod pricing;

pub use client::LlmClient;

/// JSON schema the provider must constrain its reply to.
#[derive(Debug, Clone)]
pub struct ResponseSchema {
    pub name: String,
    pub description: Option<String>,
    pub schema: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: Option<f32>,
    pub response_schema: ResponseSchema,
    pub operation: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    /// Raw JSON text of the structured reply; `None` when the model refused
    /// or returned nothing.
    pub content: Option<String>,
    pub refusal: Option<String>,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: f64,
    pub finish_reason: String,
    pub provider: String,
}

#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    async fn complete(&self, req: &ChatRequest) -> anyhow::Result<ChatResponse>;
    fn name(&self) -> &str;
}
