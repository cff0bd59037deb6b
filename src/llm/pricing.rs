use serde::Deserialize;
use std::collections::HashMap;
use std::sync::LazyLock;

/// USD per one million tokens.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PriceEntry {
    pub input: f64,
    pub output: f64,
}

#[derive(Deserialize)]
struct PricingFile {
    models: HashMap<String, PriceEntry>,
}

fn builtin_prices() -> HashMap<String, PriceEntry> {
    [
        ("gpt-4.1-mini", 0.40, 1.60),
        ("gpt-4.1", 2.00, 8.00),
        ("gpt-4o-mini", 0.15, 0.60),
        ("gpt-4o", 2.50, 10.00),
    ]
    .into_iter()
    .map(|(model, input, output)| (model.to_string(), PriceEntry { input, output }))
    .collect()
}

pub static PRICING: LazyLock<HashMap<String, PriceEntry>> = LazyLock::new(|| {
    let mut prices = builtin_prices();

    if let Ok(path) = std::env::var("PRICING_JSON_PATH")
        && !path.is_empty()
    {
        match std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|data| Ok(serde_json::from_str::<PricingFile>(&data)?))
        {
            Ok(parsed) => prices.extend(parsed.models),
            Err(e) => tracing::warn!(path = %path, error = %e, "ignoring unreadable pricing file"),
        }
    }

    prices
});

pub fn calculate_cost(model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
    match lookup_price(model) {
        Some(entry) => {
            (f64::from(input_tokens) * entry.input / 1_000_000.0)
                + (f64::from(output_tokens) * entry.output / 1_000_000.0)
        }
        None => 0.0,
    }
}

/// Providers answer with dated snapshots such as `gpt-4.1-mini-2025-04-14`;
/// those are priced like their base model.
fn lookup_price(model: &str) -> Option<&'static PriceEntry> {
    if let Some(entry) = PRICING.get(model) {
        return Some(entry);
    }
    PRICING
        .iter()
        .filter(|(name, _)| is_snapshot_of(model, name))
        .max_by_key(|(name, _)| name.len())
        .map(|(_, entry)| entry)
}

fn is_snapshot_of(model: &str, base: &str) -> bool {
    model
        .strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|suffix| suffix.starts_with(|c: char| c.is_ascii_digit()))
}

/// Splits an API base URL into the host and port reported on GenAI spans.
pub fn server_endpoint(base_url: &str) -> (String, i64) {
    let (scheme, rest) = base_url.split_once("://").unwrap_or(("https", base_url));
    let authority = rest.split('/').next().unwrap_or_default();
    let default_port = if scheme == "http" { 80 } else { 443 };

    match authority.rsplit_once(':') {
        Some((host, port)) => (
            host.to_string(),
            port.parse().unwrap_or(default_port),
        ),
        None => (authority.to_string(), default_port),
    }
}
