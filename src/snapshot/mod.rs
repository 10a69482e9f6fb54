//! Snapshot assembly (spec §3.1, §4.7): one read-mostly fan-out over GitHub
//! label queries plus the daemon state file, turned into a single ephemeral
//! value the scheduler consumes for one iteration. Nothing here mutates
//! anything; a `Snapshot` is a pure function of its inputs at the instant it
//! was built.

pub mod scoring;

use std::thread;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::Clock;
use crate::config::{DaemonConfig, IssueStrategy};
use crate::error::LoomError;
use crate::models::{DaemonState, Issue, PullRequest, ShepherdStatus};
use crate::platform::github::GitHubFacade;
use crate::platform::usage::UsageFacade;
use crate::store::StateStore;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineBuckets {
    pub ready: Vec<Issue>,
    pub building: Vec<Issue>,
    pub blocked: Vec<Issue>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Proposals {
    pub architect: Vec<Issue>,
    pub hermit: Vec<Issue>,
    pub curated: Vec<Issue>,
}

impl Proposals {
    fn total(&self) -> usize {
        self.architect.len() + self.hermit.len() + self.curated.len()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PrBuckets {
    pub review_requested: Vec<PullRequest>,
    pub changes_requested: Vec<PullRequest>,
    pub ready_to_merge: Vec<PullRequest>,
    /// `loom:treating` PRs: a Doctor is actively applying a fix. Orthogonal to
    /// the other three buckets (spec §6.2) — read-only from the scheduler's
    /// perspective, so it is not folded into `recommended_actions`.
    pub treating: Vec<PullRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageInfo {
    pub session_percent: Option<f64>,
    pub healthy: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Computed {
    pub totals: usize,
    pub active_shepherds: usize,
    pub available_slots: usize,
    pub needs_work_generation: bool,
    pub architect_cooldown_ok: bool,
    pub hermit_cooldown_ok: bool,
    pub recommended_actions: Vec<String>,
    pub stale_heartbeat_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub issue_threshold: usize,
    pub max_shepherds: usize,
    pub max_proposals: usize,
    pub issue_strategy: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub pipeline: PipelineBuckets,
    pub proposals: Proposals,
    pub prs: PrBuckets,
    pub usage: UsageInfo,
    pub computed: Computed,
    pub config: ConfigSummary,
}

fn strategy_name(strategy: &IssueStrategy) -> &'static str {
    match strategy {
        IssueStrategy::Fifo => "fifo",
        IssueStrategy::Lifo => "lifo",
        IssueStrategy::Priority => "priority",
    }
}

/// Queries every pipeline label in parallel threads (each opens its own `gh`
/// child process, so there's no shared mutable state to race on) and
/// assembles the result into a `Snapshot`.
pub fn build_snapshot(
    gh: &GitHubFacade,
    usage: &UsageFacade,
    cfg: &DaemonConfig,
    state: &DaemonState,
    store: &StateStore,
    clock: &dyn Clock,
) -> Result<Snapshot, LoomError> {
    let (ready, building, blocked, architect, hermit, curated, review_requested, changes_requested, ready_to_merge, treating) =
        thread::scope(|scope| {
            let h_ready = scope.spawn(|| gh.list_issues_by_label("loom:issue"));
            let h_building = scope.spawn(|| gh.list_issues_by_label("loom:building"));
            let h_blocked = scope.spawn(|| gh.list_issues_by_label("loom:blocked"));
            let h_architect = scope.spawn(|| gh.list_issues_by_label("loom:architect"));
            let h_hermit = scope.spawn(|| gh.list_issues_by_label("loom:hermit"));
            let h_curated = scope.spawn(|| gh.list_issues_by_label("loom:curated"));
            let h_review = scope.spawn(|| gh.list_prs_by_label("loom:review-requested"));
            let h_changes = scope.spawn(|| gh.list_prs_by_label("loom:changes-requested"));
            let h_merge = scope.spawn(|| gh.list_prs_by_label("loom:pr"));
            let h_treating = scope.spawn(|| gh.list_prs_by_label("loom:treating"));

            let join = |h: thread::ScopedJoinHandle<Result<Vec<Issue>, LoomError>>| -> Result<Vec<Issue>, LoomError> {
                h.join().unwrap_or_else(|_| Err(LoomError::external("snapshot query thread panicked", crate::error::Transience::Transient)))
            };
            let join_pr = |h: thread::ScopedJoinHandle<Result<Vec<PullRequest>, LoomError>>| -> Result<Vec<PullRequest>, LoomError> {
                h.join().unwrap_or_else(|_| Err(LoomError::external("snapshot query thread panicked", crate::error::Transience::Transient)))
            };

            Ok::<_, LoomError>((
                join(h_ready)?,
                join(h_building)?,
                join(h_blocked)?,
                join(h_architect)?,
                join(h_hermit)?,
                join(h_curated)?,
                join_pr(h_review)?,
                join_pr(h_changes)?,
                join_pr(h_merge)?,
                join_pr(h_treating)?,
            ))
        })?;

    let ready = scoring::sort_ready_issues(ready, &cfg.issue_strategy);

    let proposals = Proposals { architect, hermit, curated };
    let pipeline = PipelineBuckets { ready, building, blocked };
    let prs = PrBuckets { review_requested, changes_requested, ready_to_merge, treating };

    let usage_reading = usage.check_advisory();
    let usage_info = UsageInfo {
        session_percent: usage_reading.map(|r| r.session_percent),
        healthy: usage_reading.map(|r| r.session_percent < cfg.rate_limit_threshold).unwrap_or(true),
    };

    let now = clock.now();
    let available_slots = state.available_slots().len();
    let needs_work_generation = scoring::needs_work_generation(
        pipeline.ready.len(),
        proposals.total(),
        cfg.issue_threshold,
        cfg.max_proposals,
    );
    let architect_cooldown_ok = scoring::cooldown_ok(state.last_architect_trigger, cfg.architect_cooldown, now);
    let hermit_cooldown_ok = scoring::cooldown_ok(state.last_hermit_trigger, cfg.hermit_cooldown, now);

    let stale_heartbeat_count = state
        .shepherds
        .values()
        .filter(|s| s.status == ShepherdStatus::Working)
        .filter_map(|s| s.task_id.as_deref())
        .filter(|task_id| {
            store
                .read_progress(task_id)
                .map(|p| p.is_stale(now, cfg.heartbeat_stale_threshold))
                .unwrap_or(true)
        })
        .count();

    let action_inputs = scoring::ActionInputs {
        has_promotable_proposals: proposals.total() > 0,
        ready_issue_count: pipeline.ready.len(),
        available_slot_count: available_slots,
        needs_work_generation,
        architect_cooldown_ok,
        hermit_cooldown_ok,
        active_proposal_roles: state
            .support_roles
            .values()
            .filter(|r| r.status == crate::models::RoleStatus::Running)
            .count(),
        any_building: !pipeline.building.is_empty(),
    };
    let recommended_actions = scoring::recommended_actions(&action_inputs);

    let computed = Computed {
        totals: pipeline.ready.len() + pipeline.building.len() + pipeline.blocked.len(),
        active_shepherds: state.working_count(),
        available_slots,
        needs_work_generation,
        architect_cooldown_ok,
        hermit_cooldown_ok,
        recommended_actions,
        stale_heartbeat_count,
    };

    let config = ConfigSummary {
        issue_threshold: cfg.issue_threshold,
        max_shepherds: cfg.max_shepherds,
        max_proposals: cfg.max_proposals,
        issue_strategy: strategy_name(&cfg.issue_strategy).to_string(),
    };

    Ok(Snapshot { timestamp: now, pipeline, proposals, prs, usage: usage_info, computed, config })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposals_total_sums_all_three_buckets() {
        let p = Proposals {
            architect: vec![],
            hermit: vec![],
            curated: vec![],
        };
        assert_eq!(p.total(), 0);
    }

    #[test]
    fn strategy_name_round_trips() {
        assert_eq!(strategy_name(&IssueStrategy::Fifo), "fifo");
        assert_eq!(strategy_name(&IssueStrategy::Lifo), "lifo");
        assert_eq!(strategy_name(&IssueStrategy::Priority), "priority");
    }
}
