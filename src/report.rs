//! Report tree emitted after one script run.
//!
//! The tree is append-only while the run is in flight and immutable once
//! the run closes. Absent optionals and empty sequences stay out of the
//! serialized document.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::severity::Severity;

/// Root report for one script run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    /// Epoch milliseconds of the first start event seen.
    pub started: u64,
    /// Epoch milliseconds of run end; absent until the run closes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Messages printed while no step was open.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
}

impl Report {
    /// True when any step in the tree closed at `Error` or worse.
    pub fn has_failures(&self) -> bool {
        fn any_failed(steps: &[Step]) -> bool {
            steps
                .iter()
                .any(|step| step.severity >= Severity::Error || any_failed(&step.steps))
        }
        any_failed(&self.steps)
    }
}

/// One graded step; nesting mirrors the before/after call order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Identity key correlating the step with validation outcomes.
    pub id: String,
    pub started: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped: Option<u64>,
    /// Resolved at close time; `Info` when no validation referenced the step.
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
}

impl Step {
    pub(crate) fn open(id: &str, started: u64) -> Self {
        Self {
            id: id.to_string(),
            started,
            stopped: None,
            severity: Severity::Info,
            messages: Vec::new(),
            steps: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Report, Step};
    use crate::severity::Severity;

    #[test]
    fn absent_fields_stay_out_of_the_document() {
        let report = Report {
            started: 10,
            ..Report::default()
        };
        let value = serde_json::to_value(&report).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["started"]);
    }

    #[test]
    fn has_failures_sees_nested_errors() {
        let mut inner = Step::open("inner", 1);
        inner.severity = Severity::Error;
        let mut outer = Step::open("outer", 0);
        outer.steps.push(inner);
        let report = Report {
            started: 0,
            steps: vec![outer],
            ..Report::default()
        };
        assert!(report.has_failures());
    }

    #[test]
    fn has_failures_ignores_warnings() {
        let mut step = Step::open("a", 0);
        step.severity = Severity::Warning;
        let report = Report {
            started: 0,
            steps: vec![step],
            ..Report::default()
        };
        assert!(!report.has_failures());
    }
}
