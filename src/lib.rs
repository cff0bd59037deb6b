pub mod config;
pub mod error;
pub mod insights;
pub mod llm;
pub mod routes;
pub mod telemetry;

use std::sync::Arc;

pub use config::Config;

#[derive(Clone)]
pub struct AppState {
    pub llm_client: Arc<llm::LlmClient>,
}

impl AppState {
    pub fn new(llm_client: Arc<llm::LlmClient>) -> Self {
        Self { llm_client }
    }
}
