use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub llm_model: String,
    pub llm_temperature: Option<f32>,
    pub llm_timeout: Duration,
    pub request_timeout: Duration,
    pub otel_service_name: String,
    pub otel_exporter_endpoint: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_source(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. `from_env`
    /// passes the process environment.
    pub fn from_source<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .context("OPENAI_API_KEY must be set")?;

        let llm_timeout = parse_secs("LLM_TIMEOUT_SECS", &var("LLM_TIMEOUT_SECS", "60"))?;
        let request_timeout =
            parse_secs("REQUEST_TIMEOUT_SECS", &var("REQUEST_TIMEOUT_SECS", "120"))?;

        // The provider call has to time out before the HTTP layer does.
        if llm_timeout >= request_timeout {
            anyhow::bail!(
                "LLM_TIMEOUT_SECS ({}) must be lower than REQUEST_TIMEOUT_SECS ({})",
                llm_timeout.as_secs(),
                request_timeout.as_secs()
            );
        }

        Ok(Self {
            port: parse("APP_PORT", &var("APP_PORT", "8080"))?,
            environment: var("ENVIRONMENT", "development"),
            openai_api_key,
            openai_base_url: var("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            llm_model: var("LLM_MODEL", "gpt-4.1-mini"),
            llm_temperature: lookup("LLM_TEMPERATURE")
                .map(|raw| parse("LLM_TEMPERATURE", &raw))
                .transpose()?,
            llm_timeout,
            request_timeout,
            otel_service_name: var("OTEL_SERVICE_NAME", "risk-explainer"),
            otel_exporter_endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317"),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{key} must be a number, got {raw:?}"))
}

fn parse_secs(key: &str, raw: &str) -> anyhow::Result<Duration> {
    match parse::<u64>(key, raw)? {
        0 => anyhow::bail!("{key} must be greater than zero"),
        secs => Ok(Duration::from_secs(secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_source(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.environment, "development");
        assert_eq!(config.openai_api_key, "sk-test");
        assert_eq!(config.openai_base_url, "https://api.openai.com/v1");
        assert_eq!(config.llm_model, "gpt-4.1-mini");
        assert_eq!(config.llm_temperature, None);
        assert_eq!(config.llm_timeout, Duration::from_secs(60));
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.otel_service_name, "risk-explainer");
        assert!(!config.is_production());
    }

    #[test]
    fn test_missing_api_key_fails() {
        let err = config_from(&[]).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_blank_api_key_fails() {
        assert!(config_from(&[("OPENAI_API_KEY", "   ")]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("APP_PORT", "9000"),
            ("ENVIRONMENT", "production"),
            ("LLM_MODEL", "gpt-4.1"),
            ("LLM_TEMPERATURE", "0.2"),
            ("LLM_TIMEOUT_SECS", "30"),
            ("REQUEST_TIMEOUT_SECS", "45"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.is_production());
        assert_eq!(config.llm_model, "gpt-4.1");
        assert_eq!(config.llm_temperature, Some(0.2));
        assert_eq!(config.llm_timeout, Duration::from_secs(30));
        assert_eq!(config.request_timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_malformed_number_fails() {
        let err = config_from(&[("OPENAI_API_KEY", "sk-test"), ("APP_PORT", "eighty")])
            .unwrap_err();
        assert!(err.to_string().contains("APP_PORT"));
    }

    #[test]
    fn test_zero_timeouts_fail() {
        let err = config_from(&[("OPENAI_API_KEY", "sk-test"), ("LLM_TIMEOUT_SECS", "0")])
            .unwrap_err();
        assert_eq!(err.to_string(), "LLM_TIMEOUT_SECS must be greater than zero");

        let err = config_from(&[("OPENAI_API_KEY", "sk-test"), ("REQUEST_TIMEOUT_SECS", "0")])
            .unwrap_err();
        assert_eq!(err.to_string(), "REQUEST_TIMEOUT_SECS must be greater than zero");
    }

    #[test]
    fn test_llm_timeout_must_undercut_request_timeout() {
        let err = config_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("LLM_TIMEOUT_SECS", "120"),
            ("REQUEST_TIMEOUT_SECS", "120"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("must be lower than REQUEST_TIMEOUT_SECS"));
    }
}
