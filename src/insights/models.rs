use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value, json};

use crate::error::AppError;

/// One supplement the user currently takes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dosage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<String>,
}

/// Externally computed scores keyed by name, kept in request order.
///
/// Values keep their JSON number form, so `0.0` renders as `0.0` and `1`
/// as `1` when formatted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct RiskScores(Vec<(String, Number)>);

impl RiskScores {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Number)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Map<String, Value>> for RiskScores {
    type Error = String;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        map.into_iter()
            .map(|(name, value)| match value {
                Value::Number(number) => Ok((name, number)),
                other => Err(format!(
                    "risk score '{name}' must be a number, got {other}"
                )),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(RiskScores)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExplainRiskRequest {
    pub stack: Vec<StackEntry>,
    #[serde(default)]
    pub risk_scores: RiskScores,
}

impl ExplainRiskRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.stack.is_empty() {
            return Err(AppError::Validation("stack must not be empty".into()));
        }

        if let Some(index) = self
            .stack
            .iter()
            .position(|entry| entry.name.trim().is_empty())
        {
            return Err(AppError::Validation(format!(
                "stack[{index}].name must not be blank"
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Moderate,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskExplanation {
    pub risk_level: RiskLevel,
    pub user_friendly_summary: String,
    pub warnings: Vec<String>,
    pub next_steps: Vec<String>,
    pub affected_compounds: Vec<String>,
    /// Intended to lie in 0.0..=1.0; passed through as the model reports it.
    pub confidence_score: f64,
}

impl RiskExplanation {
    pub const SCHEMA_NAME: &'static str = "risk_explanation";

    /// Strict Structured Outputs schema: every property required, no extras.
    pub fn json_schema() -> Value {
        let string_list = json!({ "type": "array", "items": { "type": "string" } });
        let levels: Vec<&str> = RiskLevel::ALL.iter().map(RiskLevel::as_str).collect();

        json!({
            "type": "object",
            "properties": {
                "risk_level": { "type": "string", "enum": levels },
                "user_friendly_summary": { "type": "string" },
                "warnings": string_list,
                "next_steps": string_list,
                "affected_compounds": string_list,
                "confidence_score": { "type": "number" },
            },
            "required": [
                "risk_level",
                "user_friendly_summary",
                "warnings",
                "next_steps",
                "affected_compounds",
                "confidence_score",
            ],
            "additionalProperties": false,
        })
    }
}
