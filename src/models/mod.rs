//! Typed entities from spec §3.1, kept deliberately close to their JSON shape:
//! every document the store persists is one of these, `derive(Serialize,
//! Deserialize)`, with `#[serde(default)]` on fields added after the first
//! release so old state files keep loading.

mod daemon_state;
mod health;
mod issue;
mod progress;
mod pull_request;
mod session;
mod shepherd;
mod support_role;
mod worktree;

pub use daemon_state::{DaemonState, PipelineState, Warning, WarningSeverity};
pub use health::{Alert, AlertKind, AlertSeverity, HealthMetricsHistory, HealthSample};
pub use issue::{Issue, IssueState};
pub use progress::{Milestone, MilestoneEvent, ProgressFile, ProgressStatus};
pub use pull_request::{PrState, PullRequest};
pub use session::{Session, SessionEnv};
pub use shepherd::{ShepherdSlot, ShepherdStatus};
pub use support_role::{RoleId, RoleStatus, SupportRole};
pub use worktree::{Worktree, WorktreeMarker};

/// Pipeline labels that may sit on an Issue; at most one holds at once (I2-style
/// invariant on the label set, enforced by single atomic `EditLabels` calls).
pub const ISSUE_PIPELINE_LABELS: &[&str] = &[
    "loom:issue",
    "loom:building",
    "loom:blocked",
    "loom:curated",
    "loom:architect",
    "loom:hermit",
];

pub const ISSUE_URGENT_LABEL: &str = "loom:urgent";
pub const ISSUE_ABORT_LABEL: &str = "loom:abort";

pub const PR_PIPELINE_LABELS: &[&str] = &[
    "loom:review-requested",
    "loom:changes-requested",
    "loom:pr",
    "loom:treating",
];

/// A 7-hex-char task id identifying one shepherd run; also the key of its
/// progress file.
pub fn is_valid_task_id(s: &str) -> bool {
    s.len() == 7 && s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

pub fn generate_task_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..7].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_generation_is_valid() {
        for _ in 0..50 {
            let id = generate_task_id();
            assert!(is_valid_task_id(&id), "{id} should be valid");
        }
    }

    #[test]
    fn task_id_rejects_uppercase_and_wrong_length() {
        assert!(!is_valid_task_id("ABCDEF1"));
        assert!(!is_valid_task_id("abc"));
        assert!(!is_valid_task_id("abcdefg")); // 'g' is not hex
    }
}
