//! Executes one snapshot's `recommended_actions`, in order, subject to the
//! resource caps in spec §4.8. Shepherds run as background OS threads (no
//! async runtime in this stack — matching the rest of the daemon's
//! synchronous, thread-per-concurrent-task model); everything else here runs
//! synchronously within the iteration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::Utc;

use crate::clock::Clock;
use crate::config::DaemonConfig;
use crate::error::LoomError;
use crate::models::{self, DaemonState, Issue, RoleId, RoleStatus, ShepherdStatus};
use crate::platform::github::{GitHubFacade, Target};
use crate::platform::usage::UsageFacade;
use crate::platform::Mux;
use crate::shepherd::{self, ShepherdContext, ShepherdMode, ShepherdOutcome};
use crate::signals::SignalBus;
use crate::snapshot::{Proposals, Snapshot};
use crate::store::StateStore;

/// Everything a spawned shepherd thread needs, owned (not borrowed) so the
/// thread closure satisfies `'static`.
#[derive(Clone)]
pub struct ShepherdEnv {
    pub repo_root: PathBuf,
    pub loom_dir: PathBuf,
    pub cfg: DaemonConfig,
    pub store: StateStore,
    pub signals: SignalBus,
    pub gh: GitHubFacade,
    pub usage: UsageFacade,
    pub clock: Arc<dyn Clock + Send + Sync>,
}

pub type ShepherdHandle = JoinHandle<(String, u64, Result<ShepherdOutcome, LoomError>)>;

/// Bulk-promotes labeled proposal issues (architect/hermit/curated) back to
/// `loom:issue`, readmitting them to the ready pool. Only runs under force
/// mode (spec §4.8) — under wait mode, promotion happens one issue at a time
/// via the shepherd's own Approval phase.
pub fn promote_proposals(gh: &GitHubFacade, proposals: &Proposals) -> Result<usize, LoomError> {
    let mut promoted = 0;
    for (issues, label) in [
        (&proposals.architect, "loom:architect"),
        (&proposals.hermit, "loom:hermit"),
        (&proposals.curated, "loom:curated"),
    ] {
        for issue in issues {
            gh.edit_labels(Target::Issue(issue.number), &["loom:issue"], &[label])?;
            promoted += 1;
        }
    }
    Ok(promoted)
}

/// Claims an idle slot per ready issue (up to `available_slots`), reserves it
/// in daemon state, and launches a shepherd thread per claimed issue. Slot
/// claim failures (e.g. a concurrent take by a future multi-daemon setup)
/// just skip that issue for this iteration.
pub fn spawn_shepherds(
    env: &ShepherdEnv,
    mode: ShepherdMode,
    ready: &[Issue],
    handles: &mut HashMap<String, ShepherdHandle>,
) -> Result<usize, LoomError> {
    let mut spawned = 0;
    for issue in ready {
        let state = env.store.read()?;
        let available = state.available_slots();
        let Some(slot_id) = available.into_iter().next() else { break };

        let task_id = models::generate_task_id();
        let now = env.clock.now();
        let claimed = env.store.update(|mut s| {
            if let Some(slot) = s.shepherds.get_mut(&slot_id) {
                if slot.status == ShepherdStatus::Idle {
                    slot.status = ShepherdStatus::Working;
                    slot.issue = Some(issue.number);
                    slot.task_id = Some(task_id.clone());
                    slot.started_at = Some(now);
                }
            }
            s
        })?;
        let slot = match claimed.shepherds.get(&slot_id) {
            Some(s) if s.task_id.as_deref() == Some(task_id.as_str()) => s.clone(),
            _ => continue,
        };
        let _ = slot;

        let issue_number = issue.number;
        let thread_env = env.clone();
        let thread_task_id = task_id.clone();
        let handle = std::thread::spawn(move || {
            let ctx = ShepherdContext {
                repo_root: &thread_env.repo_root,
                loom_dir: &thread_env.loom_dir,
                cfg: &thread_env.cfg,
                store: &thread_env.store,
                signals: &thread_env.signals,
                gh: &thread_env.gh,
                usage: &thread_env.usage,
                clock: thread_env.clock.as_ref(),
            };
            let result = shepherd::run_shepherd(&ctx, issue_number, mode, thread_task_id.clone());
            (thread_task_id, issue_number, result)
        });
        handles.insert(slot_id, handle);
        spawned += 1;
    }
    Ok(spawned)
}

/// Non-blocking collection of finished shepherd threads: releases each slot
/// back to idle (or errored, on a thread panic) and records completion in
/// daemon state.
pub fn reap_shepherds(
    store: &StateStore,
    handles: &mut HashMap<String, ShepherdHandle>,
) -> Result<Vec<(String, u64, Result<ShepherdOutcome, LoomError>)>, LoomError> {
    let finished: Vec<String> = handles
        .iter()
        .filter(|(_, h)| h.is_finished())
        .map(|(slot_id, _)| slot_id.clone())
        .collect();

    let mut results = Vec::new();
    for slot_id in finished {
        let handle = handles.remove(&slot_id).expect("just observed in handles");
        let now = Utc::now();
        match handle.join() {
            Ok((task_id, issue_number, outcome)) => {
                let slot_id_for_update = slot_id.clone();
                store.update(|mut s| {
                    if let Some(slot) = s.shepherds.get_mut(&slot_id_for_update) {
                        match &outcome {
                            Ok(ShepherdOutcome::Done) => slot.return_to_idle("completed", now),
                            Ok(ShepherdOutcome::Blocked(reason)) => slot.return_to_idle(format!("blocked: {reason}"), now),
                            Ok(ShepherdOutcome::NoOp(reason)) => slot.return_to_idle(format!("no-op: {reason}"), now),
                            Ok(ShepherdOutcome::RateLimited) => slot.return_to_idle("rate_limited", now),
                            Ok(ShepherdOutcome::Shutdown) => slot.return_to_idle("shutdown", now),
                            Err(e) => slot.return_to_idle(format!("error: {e}"), now),
                        }
                    }
                    s
                })?;
                results.push((task_id, issue_number, outcome));
            }
            Err(_) => {
                store.update(|mut s| {
                    if let Some(slot) = s.shepherds.get_mut(&slot_id) {
                        slot.status = ShepherdStatus::Errored;
                    }
                    s
                })?;
            }
        }
    }
    Ok(results)
}

fn role_command(role: RoleId) -> String {
    format!("/{}", role.as_str())
}

/// Spawns the architect or hermit support role if idle and its cooldown has
/// elapsed. Fire-and-forget: the session runs detached and is reaped by
/// `reap_support_roles` on a later iteration once its tmux session exits.
pub fn trigger_support_role(
    env: &ShepherdEnv,
    state: &DaemonState,
    role: RoleId,
) -> Result<bool, LoomError> {
    let Some(current) = state.support_roles.get(&role) else { return Ok(false) };
    if current.status != RoleStatus::Idle {
        return Ok(false);
    }

    let now = env.clock.now();
    let task_id = models::generate_task_id();
    let name = format!("{}-{task_id}", role.as_str());
    crate::worker::Supervisor::spawn(&env.loom_dir, &env.cfg, &env.signals, role.as_str(), &name, &role_command(role), &env.repo_root)?;

    env.store.update(|mut s| {
        if let Some(r) = s.support_roles.get_mut(&role) {
            r.status = RoleStatus::Running;
            r.task_id = Some(name.clone());
        }
        match role {
            RoleId::Architect => s.last_architect_trigger = Some(now),
            RoleId::Hermit => s.last_hermit_trigger = Some(now),
            _ => {}
        }
        s
    })?;
    Ok(true)
}

/// Checks every `Running` support role's tmux session; once it has exited,
/// returns the role to idle and records completion.
pub fn reap_support_roles(store: &StateStore) -> Result<(), LoomError> {
    let state = store.read()?;
    let finished: Vec<RoleId> = state
        .support_roles
        .values()
        .filter(|r| r.status == RoleStatus::Running)
        .filter(|r| r.task_id.as_ref().map(|t| !Mux::has_session(&format!("loom-{t}"))).unwrap_or(true))
        .map(|r| r.role_id)
        .collect();

    if finished.is_empty() {
        return Ok(());
    }
    let now = Utc::now();
    store.update(|mut s| {
        for role in &finished {
            if let Some(r) = s.support_roles.get_mut(role) {
                r.status = RoleStatus::Idle;
                r.last_completed = Some(now);
                r.task_id = None;
            }
        }
        s
    })?;
    Ok(())
}

pub fn run_actions(
    env: &ShepherdEnv,
    mode: ShepherdMode,
    state: &DaemonState,
    snapshot: &Snapshot,
    handles: &mut HashMap<String, ShepherdHandle>,
) -> Result<(), LoomError> {
    reap_support_roles(&env.store)?;

    for action in &snapshot.computed.recommended_actions {
        match action.as_str() {
            "promote_proposals" => {
                if state.force_mode {
                    promote_proposals(&env.gh, &snapshot.proposals)?;
                }
            }
            "spawn_shepherds" => {
                spawn_shepherds(env, mode, &snapshot.pipeline.ready, handles)?;
            }
            "trigger_architect" => {
                trigger_support_role(env, state, RoleId::Architect)?;
            }
            "trigger_hermit" => {
                trigger_support_role(env, state, RoleId::Hermit)?;
            }
            "check_stuck" => {
                // Handled separately by the sweep module; the scheduler loop
                // invokes it directly so it can gate recovery on the
                // `--recover` flag independent of this action list.
            }
            "wait" => {}
            _ => {}
        }
    }
    Ok(())
}
