//! Pure scoring rules over a snapshot's raw query results (spec §4.7):
//! issue ordering, work-generation and cooldown gates, and the deterministic
//! `recommended_actions` list.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::config::IssueStrategy;
use crate::models::Issue;

/// Sort ready issues by strategy; `loom:urgent` issues always precede
/// non-urgent ones regardless of strategy, each partition ordered by
/// `created_at` (ascending for fifo/priority, descending for lifo).
pub fn sort_ready_issues(mut issues: Vec<Issue>, strategy: &IssueStrategy) -> Vec<Issue> {
    let descending = matches!(strategy, IssueStrategy::Lifo);
    issues.sort_by(|a, b| {
        let urgency = b.is_urgent().cmp(&a.is_urgent());
        if urgency != std::cmp::Ordering::Equal {
            return urgency;
        }
        if descending {
            b.created_at.cmp(&a.created_at)
        } else {
            a.created_at.cmp(&b.created_at)
        }
    });
    issues
}

pub fn needs_work_generation(ready_count: usize, proposals_total: usize, issue_threshold: usize, max_proposals: usize) -> bool {
    ready_count < issue_threshold && proposals_total < max_proposals
}

pub fn cooldown_ok(last_trigger: Option<DateTime<Utc>>, cooldown: Duration, now: DateTime<Utc>) -> bool {
    match last_trigger {
        None => true,
        Some(last) => (now - last).to_std().map(|age| age > cooldown).unwrap_or(true),
    }
}

pub struct ActionInputs {
    pub has_promotable_proposals: bool,
    pub ready_issue_count: usize,
    pub available_slot_count: usize,
    pub needs_work_generation: bool,
    pub architect_cooldown_ok: bool,
    pub hermit_cooldown_ok: bool,
    pub active_proposal_roles: usize,
    pub any_building: bool,
}

/// Builds the ordered `recommended_actions` list deterministically, per the
/// priority order spec §4.7 lists.
pub fn recommended_actions(inputs: &ActionInputs) -> Vec<String> {
    let mut actions = Vec::new();
    if inputs.has_promotable_proposals {
        actions.push("promote_proposals".to_string());
    }
    if inputs.ready_issue_count > 0 && inputs.available_slot_count > 0 {
        actions.push("spawn_shepherds".to_string());
    }
    if inputs.needs_work_generation && inputs.active_proposal_roles < 2 {
        if inputs.architect_cooldown_ok {
            actions.push("trigger_architect".to_string());
        }
        if inputs.hermit_cooldown_ok {
            actions.push("trigger_hermit".to_string());
        }
    }
    if inputs.any_building {
        actions.push("check_stuck".to_string());
    }
    if actions.is_empty() || actions == ["check_stuck"] {
        actions.push("wait".to_string());
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn issue(n: u64, urgent: bool, created_secs_ago: i64) -> Issue {
        let created_at = Utc::now() - chrono::Duration::seconds(created_secs_ago);
        let mut labels: BTreeSet<String> = BTreeSet::from(["loom:issue".to_string()]);
        if urgent {
            labels.insert("loom:urgent".to_string());
        }
        Issue {
            number: n,
            title: format!("issue {n}"),
            state: crate::models::IssueState::Open,
            labels,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn urgent_issues_always_sort_first() {
        let issues = vec![issue(1, false, 10), issue(2, true, 5), issue(3, false, 1)];
        let sorted = sort_ready_issues(issues, &IssueStrategy::Fifo);
        assert_eq!(sorted[0].number, 2);
    }

    #[test]
    fn fifo_orders_oldest_first_within_partition() {
        let issues = vec![issue(1, false, 1), issue(2, false, 10)];
        let sorted = sort_ready_issues(issues, &IssueStrategy::Fifo);
        assert_eq!(sorted[0].number, 2);
    }

    #[test]
    fn lifo_orders_newest_first_within_partition() {
        let issues = vec![issue(1, false, 1), issue(2, false, 10)];
        let sorted = sort_ready_issues(issues, &IssueStrategy::Lifo);
        assert_eq!(sorted[0].number, 1);
    }

    #[test]
    fn needs_work_generation_requires_both_gates() {
        assert!(needs_work_generation(1, 1, 3, 5));
        assert!(!needs_work_generation(5, 1, 3, 5));
        assert!(!needs_work_generation(1, 5, 3, 5));
    }

    #[test]
    fn cooldown_ok_when_never_triggered() {
        assert!(cooldown_ok(None, Duration::from_secs(1800), Utc::now()));
    }

    #[test]
    fn cooldown_blocks_within_window() {
        let last = Utc::now() - chrono::Duration::seconds(60);
        assert!(!cooldown_ok(Some(last), Duration::from_secs(1800), Utc::now()));
    }

    #[test]
    fn actions_fall_back_to_wait_when_nothing_to_do() {
        let inputs = ActionInputs {
            has_promotable_proposals: false,
            ready_issue_count: 0,
            available_slot_count: 3,
            needs_work_generation: false,
            architect_cooldown_ok: true,
            hermit_cooldown_ok: true,
            active_proposal_roles: 0,
            any_building: false,
        };
        assert_eq!(recommended_actions(&inputs), vec!["wait".to_string()]);
    }

    #[test]
    fn check_stuck_alone_still_falls_back_to_wait() {
        let inputs = ActionInputs {
            has_promotable_proposals: false,
            ready_issue_count: 0,
            available_slot_count: 0,
            needs_work_generation: false,
            architect_cooldown_ok: true,
            hermit_cooldown_ok: true,
            active_proposal_roles: 0,
            any_building: true,
        };
        let actions = recommended_actions(&inputs);
        assert_eq!(actions, vec!["check_stuck".to_string(), "wait".to_string()]);
    }

    #[test]
    fn spawn_and_promote_compose_in_priority_order() {
        let inputs = ActionInputs {
            has_promotable_proposals: true,
            ready_issue_count: 2,
            available_slot_count: 1,
            needs_work_generation: false,
            architect_cooldown_ok: true,
            hermit_cooldown_ok: true,
            active_proposal_roles: 0,
            any_building: false,
        };
        assert_eq!(
            recommended_actions(&inputs),
            vec!["promote_proposals".to_string(), "spawn_shepherds".to_string()]
        );
    }
}
