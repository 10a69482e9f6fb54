use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneEvent {
    Started,
    PhaseEntered,
    WorktreeCreated,
    PrCreated,
    Completed,
    Blocked,
    Error,
    Heartbeat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub event: MilestoneEvent,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Working,
    Completed,
    Error,
}

/// Per-shepherd progress file, keyed by task_id. Written only by the shepherd
/// orchestrator or phase executor; read by snapshot, stuck-detection, diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressFile {
    pub task_id: String,
    pub issue: u64,
    pub current_phase: String,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    pub last_heartbeat: DateTime<Utc>,
    pub status: ProgressStatus,
}

impl ProgressFile {
    pub fn new(task_id: impl Into<String>, issue: u64, now: DateTime<Utc>) -> Self {
        Self {
            task_id: task_id.into(),
            issue,
            current_phase: "start".to_string(),
            milestones: Vec::new(),
            last_heartbeat: now,
            status: ProgressStatus::Working,
        }
    }

    pub fn record(&mut self, event: MilestoneEvent, detail: Option<String>, now: DateTime<Utc>) {
        self.milestones.push(Milestone {
            event,
            timestamp: now,
            detail,
        });
        self.last_heartbeat = now;
    }

    pub fn is_stale(&self, now: DateTime<Utc>, threshold: std::time::Duration) -> bool {
        let age = now - self.last_heartbeat;
        age.to_std().map(|a| a > threshold).unwrap_or(true)
    }
}
