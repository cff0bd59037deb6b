use super::models::{RiskScores, StackEntry};

pub const MISSING_DOSAGE: &str = "N/A";
pub const MISSING_TIMING: &str = "unspecified";

/// One line per entry, `- <name>: <dosage> (<timing>)`, in input order.
pub fn format_stack(stack: &[StackEntry]) -> String {
    stack
        .iter()
        .map(|entry| {
            format!(
                "- {}: {} ({})",
                entry.name,
                entry.dosage.as_deref().unwrap_or(MISSING_DOSAGE),
                entry.timing.as_deref().unwrap_or(MISSING_TIMING),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line per score, `<key>: <value>`, in mapping order.
pub fn format_scores(scores: &RiskScores) -> String {
    scores
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}
