use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::is_valid_task_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShepherdStatus {
    Idle,
    Working,
    Errored,
    Paused,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShepherdSlot {
    pub slot_id: String,
    pub status: ShepherdStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_since: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_reason: Option<String>,
}

impl ShepherdSlot {
    pub fn idle(slot_id: impl Into<String>) -> Self {
        Self {
            slot_id: slot_id.into(),
            status: ShepherdStatus::Idle,
            issue: None,
            task_id: None,
            phase: None,
            started_at: None,
            pr_number: None,
            idle_since: None,
            idle_reason: None,
        }
    }

    /// Validity invariant from spec §3.1: if `status == Working` then `task_id`
    /// matches the 7-hex-char format and `issue` is set.
    pub fn is_valid(&self) -> bool {
        match self.status {
            ShepherdStatus::Working => {
                self.issue.is_some()
                    && self
                        .task_id
                        .as_deref()
                        .is_some_and(is_valid_task_id)
            }
            _ => true,
        }
    }

    pub fn return_to_idle(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.status = ShepherdStatus::Idle;
        self.issue = None;
        self.task_id = None;
        self.phase = None;
        self.started_at = None;
        self.pr_number = None;
        self.idle_since = Some(now);
        self.idle_reason = Some(reason.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_slot_is_always_valid() {
        assert!(ShepherdSlot::idle("shepherd-1").is_valid());
    }

    #[test]
    fn working_slot_requires_task_id_and_issue() {
        let mut slot = ShepherdSlot::idle("shepherd-1");
        slot.status = ShepherdStatus::Working;
        assert!(!slot.is_valid());
        slot.issue = Some(42);
        slot.task_id = Some("abc1234".into());
        assert!(slot.is_valid());
        slot.task_id = Some("ABC1234".into());
        assert!(!slot.is_valid());
    }
}
