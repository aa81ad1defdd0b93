//! Read-only model of a finished project analysis.
//!
//! The host hands one [`ProjectAnalysis`] to the notifier per completed run.
//! Enum values use the host's SCREAMING_SNAKE_CASE names so analyses can be
//! passed in as JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A completed analysis of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectAnalysis {
    pub project: Project,
    #[serde(default)]
    pub branch: Option<Branch>,
    #[serde(default)]
    pub quality_gate: Option<QualityGate>,
}

impl ProjectAnalysis {
    /// Name of the analyzed branch when it is not the main branch.
    #[must_use]
    pub fn non_main_branch_name(&self) -> Option<&str> {
        self.branch
            .as_ref()
            .filter(|branch| !branch.is_main)
            .and_then(|branch| branch.name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub is_main: bool,
    #[serde(default)]
    pub name: Option<String>,
}

/// Overall quality gate verdict plus the evaluated conditions, in gate order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityGate {
    pub status: GateStatus,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub metric_key: String,
    pub status: EvaluationStatus,
    pub operator: Operator,
    #[serde(default)]
    pub error_threshold: Option<String>,
    /// Raw measured value; empty when the metric produced nothing.
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateStatus {
    Ok,
    Warn,
    Error,
}

impl GateStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-condition evaluation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationStatus {
    Ok,
    Warn,
    Error,
    NoValue,
}

impl EvaluationStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::NoValue => "NO_VALUE",
        }
    }

    /// Whether the condition counts as degraded or failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Warn | Self::Error)
    }
}

impl fmt::Display for EvaluationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threshold comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "EQ", alias = "EQUALS")]
    Eq,
    #[serde(rename = "NEQ", alias = "NOT_EQUALS")]
    Neq,
    #[serde(rename = "GT", alias = "GREATER_THAN")]
    Gt,
    #[serde(rename = "LT", alias = "LESS_THAN")]
    Lt,
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_host_analysis() {
        let analysis: ProjectAnalysis = serde_json::from_str(
            r#"{
                "project": {"key": "org:app", "name": "App"},
                "branch": {"isMain": false, "name": "feature-x"},
                "qualityGate": {
                    "status": "ERROR",
                    "conditions": [
                        {"metricKey": "new_bugs", "status": "ERROR", "operator": "GREATER_THAN",
                         "errorThreshold": "0", "value": "3"},
                        {"metricKey": "new_coverage", "status": "NO_VALUE", "operator": "LT"},
                        {"metricKey": "odd", "status": "OK", "operator": "BETWEEN", "value": "1"}
                    ]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(analysis.non_main_branch_name(), Some("feature-x"));
        let gate = analysis.quality_gate.unwrap();
        assert_eq!(gate.status, GateStatus::Error);
        assert_eq!(gate.conditions[0].operator, Operator::Gt);
        assert_eq!(gate.conditions[1].value, "");
        assert_eq!(gate.conditions[1].error_threshold, None);
        assert_eq!(gate.conditions[2].operator, Operator::Unknown);
    }

    #[test]
    fn test_main_branch_has_no_display_name() {
        let analysis = ProjectAnalysis {
            project: Project {
                key: "k".to_string(),
                name: "n".to_string(),
            },
            branch: Some(Branch {
                is_main: true,
                name: Some("main".to_string()),
            }),
            quality_gate: None,
        };
        assert_eq!(analysis.non_main_branch_name(), None);
    }

    #[test]
    fn test_failure_statuses() {
        assert!(EvaluationStatus::Warn.is_failure());
        assert!(EvaluationStatus::Error.is_failure());
        assert!(!EvaluationStatus::Ok.is_failure());
        assert!(!EvaluationStatus::NoValue.is_failure());
    }
}
