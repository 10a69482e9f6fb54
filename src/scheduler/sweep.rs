//! Daemon-level stuck-detection sweep (spec §4.9): distinct from the
//! worker-level wait-loop detection in `worker::stuck`, this runs once per
//! iteration and looks for issues/slots the per-worker checks can't see —
//! an issue claimed on GitHub with no matching shepherd slot, or a slot
//! whose progress file has gone quiet.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::DaemonConfig;
use crate::error::LoomError;
use crate::models::{DaemonState, Issue, ShepherdStatus};
use crate::platform::github::{GitHubFacade, Target};
use crate::platform::{FsOps, Mux};
use crate::store::StateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct Intervention {
    pub agent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<u64>,
    pub severity: InterventionSeverity,
    pub indicators: Vec<String>,
    pub suggested_intervention: String,
    pub triggered_at: DateTime<Utc>,
}

pub fn write_intervention(loom_dir: &Path, intervention: &Intervention) -> Result<(), LoomError> {
    let dir = loom_dir.join("interventions");
    std::fs::create_dir_all(&dir)
        .map_err(|e| LoomError::external(format!("mkdir {}: {e}", dir.display()), crate::error::Transience::Transient))?;
    let ts = intervention.triggered_at.format("%Y%m%d-%H%M%S");
    let json = serde_json::to_string_pretty(intervention)
        .map_err(|e| LoomError::external(format!("serialize intervention: {e}"), crate::error::Transience::Permanent))?;
    FsOps::atomic_write(&dir.join(format!("{}-{ts}.json", intervention.agent_id)), &json)?;

    let text = format!(
        "agent: {}\nissue: {}\nseverity: {:?}\nindicators:\n{}\nsuggested intervention: {}\ntriggered at: {}\n",
        intervention.agent_id,
        intervention.issue.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string()),
        intervention.severity,
        intervention.indicators.iter().map(|i| format!("  - {i}")).collect::<Vec<_>>().join("\n"),
        intervention.suggested_intervention,
        intervention.triggered_at,
    );
    std::fs::write(dir.join(format!("{}-latest.txt", intervention.agent_id)), text)
        .map_err(|e| LoomError::external(format!("write intervention text: {e}"), crate::error::Transience::Transient))?;
    Ok(())
}

fn issue_age(issue: &Issue, now: DateTime<Utc>) -> std::time::Duration {
    (now - issue.updated_at).to_std().unwrap_or_default()
}

/// Runs the three daemon-level checks against `building`. Recovery (label
/// swaps, slot resets, session destruction) only happens when `recover` is
/// true; otherwise this just reports what it would have done via returned
/// interventions, matching the `--recover` / force-mode gate in spec §4.9.
pub fn run_sweep(
    gh: &GitHubFacade,
    store: &StateStore,
    loom_dir: &Path,
    cfg: &DaemonConfig,
    building: &[Issue],
    now: DateTime<Utc>,
    recover: bool,
) -> Result<Vec<Intervention>, LoomError> {
    let mut interventions = Vec::new();
    let state = store.read()?;

    let claimed_issues: std::collections::HashSet<u64> =
        state.shepherds.values().filter_map(|s| s.issue).collect();

    for issue in building {
        let orphaned = !claimed_issues.contains(&issue.number);
        let stale_building = issue_age(issue, now).as_secs() > cfg.stale_building_minutes * 60
            && gh.list_prs_by_label("loom:review-requested")?.iter().all(|pr| pr.closes_issue() != Some(issue.number))
            && gh.list_prs_by_label("loom:changes-requested")?.iter().all(|pr| pr.closes_issue() != Some(issue.number))
            && gh.list_prs_by_label("loom:pr")?.iter().all(|pr| pr.closes_issue() != Some(issue.number));

        if !orphaned && !stale_building {
            continue;
        }

        let mut indicators = Vec::new();
        if orphaned {
            indicators.push("loom:building with no matching shepherd slot".to_string());
        }
        if stale_building {
            indicators.push(format!("loom:building for over {} min with no linked PR", cfg.stale_building_minutes));
        }

        let intervention = Intervention {
            agent_id: format!("issue-{}", issue.number),
            issue: Some(issue.number),
            severity: InterventionSeverity::Warning,
            indicators,
            suggested_intervention: "restore loom:issue and re-queue".to_string(),
            triggered_at: now,
        };
        write_intervention(loom_dir, &intervention)?;

        if recover {
            gh.edit_labels(Target::Issue(issue.number), &["loom:issue"], &["loom:building"])?;
            gh.comment(
                Target::Issue(issue.number),
                "Daemon sweep: issue was claimed with no active shepherd (or stale with no PR); restored to loom:issue.",
            )?;
        }
        interventions.push(intervention);
    }

    for slot in state.shepherds.values() {
        if slot.status != ShepherdStatus::Working {
            continue;
        }
        let Some(task_id) = &slot.task_id else { continue };
        let fresh = store
            .read_progress(task_id)
            .map(|p| !p.is_stale(now, cfg.heartbeat_stale_threshold))
            .unwrap_or(false);
        if fresh {
            continue;
        }

        let intervention = Intervention {
            agent_id: slot.slot_id.clone(),
            issue: slot.issue,
            severity: InterventionSeverity::Critical,
            indicators: vec!["progress file heartbeat is stale".to_string()],
            suggested_intervention: "mark slot errored and destroy its session".to_string(),
            triggered_at: now,
        };
        write_intervention(loom_dir, &intervention)?;

        if recover {
            Mux::kill_session(&format!("loom-{task_id}")).ok();
            let slot_id = slot.slot_id.clone();
            store.update(|mut s| {
                if let Some(slot) = s.shepherds.get_mut(&slot_id) {
                    slot.status = ShepherdStatus::Errored;
                }
                s
            })?;
        }
        interventions.push(intervention);
    }

    Ok(interventions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intervention_serializes_with_snake_case_severity() {
        let i = Intervention {
            agent_id: "shepherd-1".to_string(),
            issue: Some(7),
            severity: InterventionSeverity::Critical,
            indicators: vec!["x".to_string()],
            suggested_intervention: "y".to_string(),
            triggered_at: Utc::now(),
        };
        let json = serde_json::to_string(&i).unwrap();
        assert!(json.contains("\"critical\""));
    }
}
