use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The `.loom-in-use` marker asserting a worktree is owned by a live shepherd.
/// Its presence forbids automatic cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorktreeMarker {
    pub task_id: String,
    pub issue: u64,
    pub pid: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worktree {
    pub issue_number: u64,
    pub path: PathBuf,
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<WorktreeMarker>,
}

impl Worktree {
    pub fn marker_path(&self) -> PathBuf {
        self.path.join(".loom-in-use")
    }

    pub fn for_issue(loom_dir: &Path, issue: u64) -> PathBuf {
        loom_dir.join("worktrees").join(format!("issue-{issue}"))
    }

    pub fn branch_name(issue: u64) -> String {
        format!("feature/issue-{issue}")
    }
}
