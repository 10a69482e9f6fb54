use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub state: IssueState,
    pub labels: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Issue {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn is_urgent(&self) -> bool {
        self.has_label(super::ISSUE_URGENT_LABEL)
    }

    pub fn is_aborted(&self) -> bool {
        self.has_label(super::ISSUE_ABORT_LABEL)
    }

    /// The pipeline label currently held, if any. `None` if the issue carries
    /// zero or (in a transient/corrupt state) more than one.
    pub fn pipeline_label(&self) -> Option<&'static str> {
        super::ISSUE_PIPELINE_LABELS
            .iter()
            .copied()
            .find(|l| self.labels.contains(*l))
    }

    /// True when exactly one pipeline label is present, per the data-model invariant.
    pub fn has_exclusive_pipeline_label(&self) -> bool {
        super::ISSUE_PIPELINE_LABELS
            .iter()
            .filter(|l| self.labels.contains(**l))
            .count()
            == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(labels: &[&str]) -> Issue {
        Issue {
            number: 1,
            title: "t".into(),
            state: IssueState::Open,
            labels: labels.iter().map(|s| s.to_string()).collect(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn exclusive_label_detection() {
        assert!(issue(&["loom:issue"]).has_exclusive_pipeline_label());
        assert!(!issue(&["loom:issue", "loom:building"]).has_exclusive_pipeline_label());
        assert!(!issue(&[]).has_exclusive_pipeline_label());
    }

    #[test]
    fn orthogonal_labels_are_not_pipeline_labels() {
        let i = issue(&["loom:issue", "loom:urgent"]);
        assert!(i.is_urgent());
        assert_eq!(i.pipeline_label(), Some("loom:issue"));
    }
}
