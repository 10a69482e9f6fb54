//! Per-issue pipeline orchestration (spec §4.6):
//! `Start → Curator → Approval → StageDetect → Builder/Judge ↔ Doctor → Merge`.
//!
//! One `run` call drives a single issue to a terminal outcome. The caller
//! (scheduler for background shepherds, or the `shepherd` CLI command for a
//! synchronous one-off run) owns the slot and is responsible for releasing
//! it once `run` returns.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;

use crate::clock::Clock;
use crate::config::DaemonConfig;
use crate::error::LoomError;
use crate::models::{MilestoneEvent, ProgressFile, Worktree, WorktreeMarker};
use crate::phase::{contracts, run_phase, ContractOutcome, PhaseRequest, PhaseResult};
use crate::platform::git::GitFacade;
use crate::platform::github::{GitHubFacade, Target};
use crate::platform::usage::UsageFacade;
use crate::signals::SignalBus;
use crate::store::StateStore;
use crate::worker::WaitOptions;

use super::stage_detect::{detect_stage, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShepherdMode {
    Wait,
    /// `shepherd --to curated`: stop once Curator has moved the issue to
    /// `loom:curated`, without forcing the approval edit.
    ForceCurated,
    /// `shepherd --to approved`: force the curated->issue approval edit,
    /// then stop before claiming the issue.
    ForceApproved,
    /// `shepherd --to pr`: force through Builder/Judge/Doctor to an open PR
    /// carrying `loom:pr`, but do not merge it.
    ForcePr,
    /// `shepherd --force`: force all the way through to merge.
    ForceMerge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShepherdOutcome {
    Done,
    Blocked(String),
    Shutdown,
    RateLimited,
    NoOp(String),
}

pub struct ShepherdContext<'a> {
    pub repo_root: &'a Path,
    pub loom_dir: &'a Path,
    pub cfg: &'a DaemonConfig,
    pub store: &'a StateStore,
    pub signals: &'a SignalBus,
    pub gh: &'a GitHubFacade,
    pub usage: &'a UsageFacade,
    pub clock: &'a dyn Clock,
}

pub fn run_shepherd(ctx: &ShepherdContext, issue: u64, mode: ShepherdMode, task_id: String) -> Result<ShepherdOutcome, LoomError> {
    let issue_doc = ctx.gh.view_issue(issue)?;
    if matches!(issue_doc.state, crate::models::IssueState::Closed) {
        return Ok(ShepherdOutcome::NoOp("issue is closed".to_string()));
    }
    if issue_doc.has_label("loom:blocked") && mode != ShepherdMode::ForceMerge {
        return Ok(ShepherdOutcome::NoOp("issue is loom:blocked".to_string()));
    }
    if issue_doc.is_aborted() {
        return Ok(ShepherdOutcome::NoOp("issue carries loom:abort".to_string()));
    }

    let mut progress = ProgressFile::new(task_id.clone(), issue, ctx.clock.now());
    progress.record(MilestoneEvent::Started, None, ctx.clock.now());
    ctx.store.write_progress(&progress)?;

    let result = run_pipeline(ctx, issue, mode, &task_id, &mut progress);

    match &result {
        Ok(ShepherdOutcome::Done) => progress.record(MilestoneEvent::Completed, None, ctx.clock.now()),
        Ok(ShepherdOutcome::Blocked(reason)) => progress.record(MilestoneEvent::Blocked, Some(reason.clone()), ctx.clock.now()),
        Err(e) => progress.record(MilestoneEvent::Error, Some(e.to_string()), ctx.clock.now()),
        _ => {}
    }
    ctx.store.write_progress(&progress).ok();
    result
}

fn run_pipeline(
    ctx: &ShepherdContext,
    issue: u64,
    mode: ShepherdMode,
    task_id: &str,
    progress: &mut ProgressFile,
) -> Result<ShepherdOutcome, LoomError> {
    if ctx.signals.has_graceful_shutdown() || ctx.signals.has_stop_all_shepherds() {
        return Ok(ShepherdOutcome::Shutdown);
    }

    // --- Curator ---
    let curator_req = PhaseRequest {
        role: "curator",
        name: task_id,
        role_command: &format!("/curator {issue}"),
        cwd: ctx.repo_root,
        timeout: ctx.cfg.curator_timeout,
        wait_opts: WaitOptions { issue: Some(issue), phase: Some("curator".to_string()), task_id: Some(task_id.to_string()), ..Default::default() },
    };
    match run_phase(ctx.loom_dir, ctx.cfg, ctx.store, ctx.signals, ctx.clock, &curator_req, |check_only| {
        contracts::check_curator(ctx.gh, issue, check_only)
    })? {
        PhaseResult::Success => {}
        PhaseResult::ShutdownRequested => return Ok(ShepherdOutcome::Shutdown),
        PhaseResult::Paused => return Ok(ShepherdOutcome::NoOp("curator paused".to_string())),
        PhaseResult::Blocked(reason) => return block_issue(ctx, issue, &reason),
    }

    if mode == ShepherdMode::ForceCurated {
        return Ok(ShepherdOutcome::Done);
    }

    // --- Approval ---
    match mode {
        ShepherdMode::ForceApproved | ShepherdMode::ForcePr | ShepherdMode::ForceMerge => {
            ctx.gh.edit_labels(Target::Issue(issue), &["loom:issue"], &["loom:curated"])?;
        }
        ShepherdMode::Wait => {
            if !poll_for_approval(ctx, issue)? {
                return Ok(ShepherdOutcome::Shutdown);
            }
        }
        ShepherdMode::ForceCurated => unreachable!("returned above"),
    }

    if mode == ShepherdMode::ForceApproved {
        return Ok(ShepherdOutcome::Done);
    }

    // Rate-limit check before the expensive claim + Builder phase.
    if let Some(reading) = ctx.usage.check_advisory() {
        if reading.session_percent >= ctx.cfg.rate_limit_threshold {
            return Ok(ShepherdOutcome::RateLimited);
        }
    }

    // --- Claim: loom:issue -> loom:building (single atomic edit) ---
    ctx.gh.edit_labels(Target::Issue(issue), &["loom:building"], &["loom:issue"])?;
    let claim_result = run_claimed_pipeline(ctx, issue, mode, task_id, progress);
    if claim_result.is_err() || matches!(claim_result, Ok(ShepherdOutcome::Shutdown)) {
        // Revert the claim if the pipeline didn't reach a PR: best-effort, the
        // issue is left workable by the next iteration.
        ctx.gh.edit_labels(Target::Issue(issue), &["loom:issue"], &["loom:building"]).ok();
    }
    claim_result
}

fn run_claimed_pipeline(
    ctx: &ShepherdContext,
    issue: u64,
    mode: ShepherdMode,
    task_id: &str,
    progress: &mut ProgressFile,
) -> Result<ShepherdOutcome, LoomError> {
    let (stage, existing_pr) = detect_stage(ctx.gh, issue)?;
    let worktree_path = Worktree::for_issue(ctx.loom_dir, issue);
    let branch = Worktree::branch_name(issue);

    let pr_number = match stage {
        Stage::NeedsJudge => {
            progress.record(MilestoneEvent::PrCreated, None, ctx.clock.now());
            existing_pr.expect("NeedsJudge implies a linked PR")
        }
        Stage::NeedsBuilder => {
            let worktree = GitFacade::ensure_worktree(ctx.repo_root, ctx.loom_dir, issue)?;
            let _marker_guard = write_marker(&worktree, task_id, issue)?;
            progress.record(MilestoneEvent::WorktreeCreated, None, ctx.clock.now());

            let builder_req = PhaseRequest {
                role: "builder",
                name: task_id,
                role_command: &format!("/builder {issue}"),
                cwd: &worktree.path,
                timeout: ctx.cfg.builder_timeout,
                wait_opts: WaitOptions {
                    issue: Some(issue),
                    phase: Some("builder".to_string()),
                    worktree: Some(worktree.path.clone()),
                    task_id: Some(task_id.to_string()),
                    ..Default::default()
                },
            };
            let builder_outcome = run_phase(ctx.loom_dir, ctx.cfg, ctx.store, ctx.signals, ctx.clock, &builder_req, |check_only| {
                contracts::check_builder(ctx.gh, issue, ctx.repo_root, &worktree.path, &branch, check_only)
            });

            match builder_outcome? {
                PhaseResult::Success => {}
                PhaseResult::ShutdownRequested => return Ok(ShepherdOutcome::Shutdown),
                PhaseResult::Paused => return Ok(ShepherdOutcome::NoOp("builder paused".to_string())),
                PhaseResult::Blocked(reason) => return block_issue(ctx, issue, &reason),
            }

            progress.record(MilestoneEvent::PrCreated, None, ctx.clock.now());
            match detect_stage(ctx.gh, issue)? {
                (Stage::NeedsJudge, Some(n)) => n,
                _ => return block_issue(ctx, issue, "builder completed but no linked PR was found"),
            }
        }
    };

    run_judge_doctor_loop(ctx, issue, pr_number, mode, task_id)
}

fn run_judge_doctor_loop(
    ctx: &ShepherdContext,
    issue: u64,
    pr_number: u64,
    mode: ShepherdMode,
    task_id: &str,
) -> Result<ShepherdOutcome, LoomError> {
    let mut doctor_attempts = 0u32;
    loop {
        let judge_req = PhaseRequest {
            role: "judge",
            name: task_id,
            role_command: &format!("/judge {pr_number}"),
            cwd: ctx.repo_root,
            timeout: ctx.cfg.judge_timeout,
            wait_opts: WaitOptions { issue: Some(issue), pr: Some(pr_number), phase: Some("judge".to_string()), task_id: Some(task_id.to_string()), ..Default::default() },
        };
        match run_phase(ctx.loom_dir, ctx.cfg, ctx.store, ctx.signals, ctx.clock, &judge_req, |check_only| {
            contracts::check_judge(ctx.gh, pr_number, check_only)
        })? {
            PhaseResult::Success => {}
            PhaseResult::ShutdownRequested => return Ok(ShepherdOutcome::Shutdown),
            PhaseResult::Paused => return Ok(ShepherdOutcome::NoOp("judge paused".to_string())),
            PhaseResult::Blocked(reason) => return block_issue(ctx, issue, &reason),
        }

        let pr = ctx.gh.view_pr(pr_number)?;
        if pr.has_label("loom:pr") {
            return finish_merge(ctx, issue, pr_number, mode);
        }

        // loom:changes-requested: route to Doctor.
        doctor_attempts += 1;
        if doctor_attempts > ctx.cfg.doctor_max_retries {
            return block_issue(ctx, issue, "doctor exceeded max retries");
        }

        let doctor_req = PhaseRequest {
            role: "doctor",
            name: task_id,
            role_command: &format!("/doctor {pr_number}"),
            cwd: ctx.repo_root,
            timeout: ctx.cfg.doctor_timeout,
            wait_opts: WaitOptions { issue: Some(issue), pr: Some(pr_number), phase: Some("doctor".to_string()), task_id: Some(task_id.to_string()), ..Default::default() },
        };
        match run_phase(ctx.loom_dir, ctx.cfg, ctx.store, ctx.signals, ctx.clock, &doctor_req, |check_only| {
            contracts::check_doctor(ctx.gh, pr_number, check_only)
        })? {
            PhaseResult::Success => continue,
            PhaseResult::ShutdownRequested => return Ok(ShepherdOutcome::Shutdown),
            PhaseResult::Paused => return Ok(ShepherdOutcome::NoOp("doctor paused".to_string())),
            PhaseResult::Blocked(reason) => return block_issue(ctx, issue, &reason),
        }
    }
}

fn finish_merge(ctx: &ShepherdContext, issue: u64, pr_number: u64, mode: ShepherdMode) -> Result<ShepherdOutcome, LoomError> {
    match mode {
        ShepherdMode::ForceMerge => {
            ctx.gh.merge_pr(pr_number, true, true)?;
            ctx.store.update(|mut s| {
                s.completed_issues.push(issue);
                s.total_prs_merged += 1;
                s
            })?;
            remove_merged_worktree(ctx, issue);
            Ok(ShepherdOutcome::Done)
        }
        ShepherdMode::ForcePr => Ok(ShepherdOutcome::Done),
        ShepherdMode::Wait => {
            let outcome = poll_for_merge(ctx, pr_number)?;
            if outcome == ShepherdOutcome::Done {
                remove_merged_worktree(ctx, issue);
            }
            Ok(outcome)
        }
        ShepherdMode::ForceCurated | ShepherdMode::ForceApproved => {
            unreachable!("shepherd run already returned before reaching merge")
        }
    }
}

/// Worktree lifetime ends at a successful merge (spec §3.2). `gh merge
/// --delete-branch` already removed the remote branch; this removes the
/// local worktree and its now-merged local branch. Best-effort: a worktree
/// that was never created (re-entry straight into Judge) is a no-op.
fn remove_merged_worktree(ctx: &ShepherdContext, issue: u64) {
    let worktree_path = Worktree::for_issue(ctx.loom_dir, issue);
    if !worktree_path.exists() {
        return;
    }
    let branch = Worktree::branch_name(issue);
    if let Err(e) = GitFacade::remove_worktree(ctx.repo_root, &worktree_path, true) {
        tracing::warn!(issue, error = %e, "failed to remove merged worktree");
        return;
    }
    GitFacade::delete_branch(ctx.repo_root, &branch).ok();
}

fn poll_for_approval(ctx: &ShepherdContext, issue: u64) -> Result<bool, LoomError> {
    loop {
        if ctx.signals.has_graceful_shutdown() || ctx.signals.has_stop_all_shepherds() {
            return Ok(false);
        }
        let current = ctx.gh.view_issue(issue)?;
        if current.has_label("loom:issue") {
            return Ok(true);
        }
        std::thread::sleep(Duration::from_secs(5));
    }
}

fn poll_for_merge(ctx: &ShepherdContext, pr_number: u64) -> Result<ShepherdOutcome, LoomError> {
    loop {
        if ctx.signals.has_graceful_shutdown() || ctx.signals.has_stop_all_shepherds() {
            return Ok(ShepherdOutcome::Shutdown);
        }
        let pr = ctx.gh.view_pr(pr_number)?;
        if matches!(pr.state, crate::models::PrState::Merged) {
            return Ok(ShepherdOutcome::Done);
        }
        if matches!(pr.state, crate::models::PrState::Closed) {
            return Ok(ShepherdOutcome::NoOp("PR closed without merging".to_string()));
        }
        std::thread::sleep(Duration::from_secs(5));
    }
}

fn block_issue(ctx: &ShepherdContext, issue: u64, reason: &str) -> Result<ShepherdOutcome, LoomError> {
    ctx.gh.edit_labels(Target::Issue(issue), &["loom:blocked"], &["loom:building"]).ok();
    ctx.gh.comment(Target::Issue(issue), &format!("Shepherd blocked: {reason}")).ok();
    ctx.store.update(|mut s| {
        s.push_warning(crate::models::WarningSeverity::Warning, format!("issue #{issue} blocked: {reason}"), Utc::now());
        s
    }).ok();
    Ok(ShepherdOutcome::Blocked(reason.to_string()))
}

/// Removes the `.loom-in-use` marker when dropped — including on early
/// return via `?` and on panic-driven unwind — so the marker never
/// outlives the shepherd that created it (spec §5 invariant).
struct MarkerGuard {
    path: PathBuf,
}

impl Drop for MarkerGuard {
    fn drop(&mut self) {
        std::fs::remove_file(&self.path).ok();
    }
}

fn write_marker(worktree: &Worktree, task_id: &str, issue: u64) -> Result<MarkerGuard, LoomError> {
    let marker = WorktreeMarker { task_id: task_id.to_string(), issue, pid: std::process::id(), created_at: Utc::now() };
    let json = serde_json::to_string_pretty(&marker)
        .map_err(|e| LoomError::external(format!("serialize worktree marker: {e}"), crate::error::Transience::Permanent))?;
    crate::platform::FsOps::atomic_write(&worktree.marker_path(), &format!("{json}\n"))?;
    Ok(MarkerGuard { path: worktree.marker_path() })
}

/// Absolute path helper re-exported for the CLI's `shepherd` command.
pub fn worktree_path_for(loom_dir: &Path, issue: u64) -> PathBuf {
    Worktree::for_issue(loom_dir, issue)
}
