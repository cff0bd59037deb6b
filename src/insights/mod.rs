pub mod explain;
pub mod format;
pub mod models;

pub use explain::explain_risk;
pub use models::{ExplainRiskRequest, RiskExplanation, RiskLevel, RiskScores, StackEntry};
