//! Runs one phase to completion: spawn the worker, wait for its contract to
//! resolve, retry a bounded number of times on "stuck", and report
//! milestones (spec §4.5). GitHub label transitions that *block* an issue on
//! failure are the shepherd orchestrator's responsibility, not this
//! module's — the executor only knows about the worker session and the
//! contract closure it was handed.

use std::path::Path;
use std::time::Duration;

use crate::clock::Clock;
use crate::config::DaemonConfig;
use crate::error::{LoomError, StuckAction};
use crate::models::MilestoneEvent;
use crate::phase::contracts::ContractOutcome;
use crate::signals::SignalBus;
use crate::store::StateStore;
use crate::worker::{Supervisor, WaitOptions, WaitResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseResult {
    Success,
    Blocked(String),
    Paused,
    ShutdownRequested,
}

pub struct PhaseRequest<'a> {
    pub role: &'a str,
    pub name: &'a str,
    pub role_command: &'a str,
    pub cwd: &'a Path,
    pub timeout: Duration,
    pub wait_opts: WaitOptions,
}

#[allow(clippy::too_many_arguments)]
pub fn run_phase(
    loom_dir: &Path,
    cfg: &DaemonConfig,
    store: &StateStore,
    signals: &SignalBus,
    clock: &dyn Clock,
    req: &PhaseRequest,
    mut check: impl FnMut(bool) -> Result<ContractOutcome, LoomError>,
) -> Result<PhaseResult, LoomError> {
    if let Some(task_id) = &req.wait_opts.task_id {
        if let Ok(mut progress) = store.read_progress(task_id) {
            progress.current_phase = req.role.to_string();
            progress.record(MilestoneEvent::PhaseEntered, Some(req.role.to_string()), clock.now());
            store.write_progress(&progress)?;
        }
    }

    let mut retries = 0u32;
    loop {
        let session = Supervisor::spawn(loom_dir, cfg, signals, req.role, req.name, req.role_command, req.cwd)?;

        let wait_result = Supervisor::wait(
            loom_dir,
            cfg,
            store,
            signals,
            clock,
            &session,
            req.role_command,
            req.timeout,
            &req.wait_opts,
            || check(true).map(|o| o.is_resolved()),
        );

        match wait_result {
            WaitResult::Completed(_) => match check(false)? {
                ContractOutcome::Satisfied | ContractOutcome::Recovered => return Ok(PhaseResult::Success),
                ContractOutcome::Pending => return Ok(PhaseResult::Blocked(format!("{} contract still pending after completion", req.role))),
                ContractOutcome::Failed(reason) => return Ok(PhaseResult::Blocked(reason)),
            },
            WaitResult::Stuck(StuckAction::Pause) => {
                signals.signal_pause_agent(req.name).ok();
                return Ok(PhaseResult::Paused);
            }
            WaitResult::Stuck(StuckAction::Retry) | WaitResult::Stuck(StuckAction::Restart) | WaitResult::NotFound => {
                Supervisor::destroy(&session.tmux_name(), false);
                retries += 1;
                if retries > cfg.stuck_max_retries {
                    return Ok(PhaseResult::Blocked(format!("{} exceeded stuck-retry budget", req.role)));
                }
                continue;
            }
            WaitResult::Timeout => {
                Supervisor::destroy(&session.tmux_name(), false);
                return Ok(PhaseResult::Blocked(format!("{} timed out after {:?}", req.role, req.timeout)));
            }
            WaitResult::SignalReceived => return Ok(PhaseResult::ShutdownRequested),
        }
    }
}
