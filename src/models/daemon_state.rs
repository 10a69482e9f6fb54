use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::support_role::{RoleId, SupportRole};
use crate::models::{ShepherdSlot, ShepherdStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub severity: WarningSeverity,
    pub message: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub acknowledged: bool,
}

/// Maximum number of warnings retained (retention rule added in SPEC_FULL.md §B,
/// generalized from the explicit `health-metrics.json` retention cap in spec §4.10).
pub const MAX_WARNINGS: usize = 200;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineState {
    #[serde(default)]
    pub ready: Vec<u64>,
    #[serde(default)]
    pub building: Vec<u64>,
    #[serde(default)]
    pub blocked: Vec<u64>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IterationTiming {
    pub last: Option<f64>,
    pub avg: Option<f64>,
    pub max: Option<f64>,
}

/// The authoritative, process-wide document (spec §3.1). Every mutation goes
/// through `StateStore::update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonState {
    pub daemon_session_id: String,
    pub started_at: DateTime<Utc>,
    pub running: bool,
    pub iteration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub force_mode: bool,
    pub shepherds: HashMap<String, ShepherdSlot>,
    pub support_roles: HashMap<RoleId, SupportRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_architect_trigger: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_hermit_trigger: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pipeline_state: PipelineState,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    #[serde(default)]
    pub completed_issues: Vec<u64>,
    #[serde(default)]
    pub total_prs_merged: u64,
    #[serde(default)]
    pub iteration_timing: IterationTiming,
}

impl DaemonState {
    pub fn new(daemon_session_id: impl Into<String>, max_shepherds: usize, now: DateTime<Utc>) -> Self {
        let mut shepherds = HashMap::new();
        for i in 1..=max_shepherds {
            let slot_id = format!("shepherd-{i}");
            shepherds.insert(slot_id.clone(), ShepherdSlot::idle(slot_id));
        }
        let mut support_roles = HashMap::new();
        for role in RoleId::ALL {
            support_roles.insert(role, SupportRole::idle(role));
        }
        Self {
            daemon_session_id: daemon_session_id.into(),
            started_at: now,
            running: true,
            iteration: 0,
            stopped_at: None,
            force_mode: false,
            shepherds,
            support_roles,
            last_architect_trigger: None,
            last_hermit_trigger: None,
            pipeline_state: PipelineState::default(),
            warnings: Vec::new(),
            completed_issues: Vec::new(),
            total_prs_merged: 0,
            iteration_timing: IterationTiming::default(),
        }
    }

    /// I2: number of working shepherds never exceeds the slot count (enforced by
    /// construction — there are exactly `max_shepherds` slots).
    pub fn working_count(&self) -> usize {
        self.shepherds
            .values()
            .filter(|s| s.status == ShepherdStatus::Working)
            .count()
    }

    pub fn available_slots(&self) -> Vec<String> {
        self.shepherds
            .values()
            .filter(|s| s.status == ShepherdStatus::Idle)
            .map(|s| s.slot_id.clone())
            .collect()
    }

    /// I3: the set of `issue` fields across working shepherds is disjoint.
    pub fn working_issues_are_disjoint(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.shepherds
            .values()
            .filter(|s| s.status == ShepherdStatus::Working)
            .all(|s| match s.issue {
                Some(n) => seen.insert(n),
                None => false,
            })
    }

    pub fn push_warning(&mut self, severity: WarningSeverity, message: impl Into<String>, now: DateTime<Utc>) {
        self.warnings.push(Warning {
            severity,
            message: message.into(),
            time: now,
            acknowledged: false,
        });
        if self.warnings.len() > MAX_WARNINGS {
            let excess = self.warnings.len() - MAX_WARNINGS;
            self.warnings.drain(0..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_has_exactly_max_shepherds_slots_all_idle() {
        let state = DaemonState::new("s1", 3, Utc::now());
        assert_eq!(state.shepherds.len(), 3);
        assert_eq!(state.working_count(), 0);
        assert!(state.working_issues_are_disjoint());
    }

    #[test]
    fn warnings_are_capped_at_retention_limit() {
        let mut state = DaemonState::new("s1", 1, Utc::now());
        for i in 0..(MAX_WARNINGS + 10) {
            state.push_warning(WarningSeverity::Info, format!("w{i}"), Utc::now());
        }
        assert_eq!(state.warnings.len(), MAX_WARNINGS);
        assert_eq!(state.warnings.last().unwrap().message, format!("w{}", MAX_WARNINGS + 9));
    }

    #[test]
    fn duplicate_working_issue_breaks_disjointness() {
        let mut state = DaemonState::new("s1", 2, Utc::now());
        for slot in state.shepherds.values_mut() {
            slot.status = ShepherdStatus::Working;
            slot.issue = Some(1);
            slot.task_id = Some("abc1234".into());
        }
        assert!(!state.working_issues_are_disjoint());
    }
}
