//! The daemon loop (spec §4.8): check signals, validate ownership, build a
//! snapshot, act on it, reap finished work, sample health, back off, sleep.
//! Everything here is orchestration glue — the actual decisions live in
//! `snapshot::scoring`, `scheduler::actions`, and `scheduler::sweep`.

pub mod actions;
pub mod sweep;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::clock::Clock;
use crate::config::DaemonConfig;
use crate::error::LoomError;
use crate::health::{self, IterationMetrics, IterationStatus, SampleInputs};
use crate::models::WarningSeverity;
use crate::signals::SignalBus;
use crate::store::StateStore;

use actions::{reap_shepherds, run_actions, ShepherdEnv};

/// A timestamp-pid token identifying one daemon run, used to detect takeover
/// by a later `daemon start` against the same state file (I1).
pub fn generate_session_id(now: chrono::DateTime<Utc>) -> String {
    format!("{}-{}", now.format("%Y%m%dT%H%M%S"), std::process::id())
}

/// Sleeps up to `duration`, waking early (and returning `true`) if either
/// signal file appears. Polls in short slices so a signal is observed
/// promptly rather than only at the next iteration boundary.
fn interruptible_sleep(signals: &SignalBus, duration: Duration) -> bool {
    const SLICE: Duration = Duration::from_millis(500);
    let deadline = Instant::now() + duration;
    loop {
        if signals.has_graceful_shutdown() {
            return true;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return false;
        }
        std::thread::sleep(remaining.min(SLICE));
    }
}

/// Controls how many iterations `run` executes; `daemon start --timeout-min`
/// maps to a deadline here, `run_once` (used by tests and `daemon doctor`)
/// runs exactly one.
pub enum StopCondition {
    Never,
    After(Instant),
    Iterations(u64),
}

impl StopCondition {
    fn should_stop(&self, iteration_count: u64, now: Instant) -> bool {
        match self {
            StopCondition::Never => false,
            StopCondition::After(deadline) => now >= *deadline,
            StopCondition::Iterations(n) => iteration_count >= *n,
        }
    }
}

pub struct Scheduler {
    env: ShepherdEnv,
    session_id: String,
}

impl Scheduler {
    pub fn new(env: ShepherdEnv, session_id: String) -> Self {
        Self { env, session_id }
    }

    /// Runs the poll loop until a graceful-shutdown signal, a session
    /// takeover, or `stop_condition` ends it. Returns the reason the loop
    /// stopped, which the `daemon start` command maps to an exit code.
    pub fn run(&self, stop_condition: StopCondition, force_mode: bool) -> Result<StopReason, LoomError> {
        let running = Arc::new(AtomicBool::new(true));
        {
            let running = running.clone();
            // Best-effort: a second `ctrlc::set_handler` call in the same
            // process (e.g. under test) errors, which we ignore.
            let _ = ctrlc::set_handler(move || running.store(false, Ordering::SeqCst));
        }

        let mut handles: HashMap<String, actions::ShepherdHandle> = HashMap::new();
        let mut metrics = IterationMetrics::new();
        let mut backoff = self.env.cfg.poll_interval;
        let mut iteration_count: u64 = 0;

        // Startup crash-recovery sweep: if the daemon died mid-iteration last
        // time, orphaned slots and stale `loom:building` issues should be
        // reconciled before the first normal iteration runs, not left for
        // whatever later iteration happens to notice them.
        if let Err(e) = self.run_startup_sweep() {
            tracing::warn!(error = %e, "startup recovery sweep failed, continuing");
        }

        loop {
            if !running.load(Ordering::SeqCst) || self.env.signals.has_graceful_shutdown() {
                self.env.signals.consume_graceful_shutdown();
                self.mark_stopped()?;
                return Ok(StopReason::GracefulShutdown);
            }
            if !self.env.store.validate_ownership(&self.session_id) {
                tracing::warn!("daemon state taken over by another session, exiting");
                return Ok(StopReason::SessionTakenOver);
            }
            if stop_condition.should_stop(iteration_count, Instant::now()) {
                self.mark_stopped()?;
                return Ok(StopReason::StopConditionReached);
            }

            let iteration_start = Instant::now();
            let status = self.run_iteration(force_mode, &mut handles, &mut metrics);
            let duration = iteration_start.elapsed();

            let health_status = match &status {
                Ok(()) if metrics.is_slow(duration.as_secs_f64(), self.env.cfg.slow_multiplier) => {
                    tracing::warn!(seconds = duration.as_secs_f64(), "slow iteration");
                    IterationStatus::Success
                }
                Ok(()) => IterationStatus::Success,
                Err(e) => {
                    tracing::error!(error = %e, "iteration failed");
                    IterationStatus::Failure
                }
            };
            metrics.record(health_status, duration.as_secs_f64());

            self.env.store.update(|mut s| {
                s.iteration += 1;
                s.iteration_timing.last = Some(duration.as_secs_f64());
                s.iteration_timing.avg = Some(metrics.average_iteration_seconds());
                s.iteration_timing.max = s.iteration_timing.max.map(|m| m.max(duration.as_secs_f64())).or(Some(duration.as_secs_f64()));
                if !metrics.healthy {
                    s.push_warning(WarningSeverity::Critical, "daemon unhealthy: 3+ consecutive iteration failures", Utc::now());
                }
                s
            })?;
            iteration_count += 1;

            backoff = match health_status {
                IterationStatus::Success => self.env.cfg.poll_interval,
                IterationStatus::Failure | IterationStatus::Timeout => {
                    if metrics.consecutive_failures >= self.env.cfg.backoff_threshold {
                        let scaled = backoff.as_secs().saturating_mul(self.env.cfg.backoff_multiplier as u64);
                        Duration::from_secs(scaled.min(self.env.cfg.max_backoff.as_secs()))
                    } else {
                        backoff
                    }
                }
            };

            if interruptible_sleep(&self.env.signals, backoff) {
                self.env.signals.consume_graceful_shutdown();
                self.mark_stopped()?;
                return Ok(StopReason::GracefulShutdown);
            }
        }
    }

    fn run_startup_sweep(&self) -> Result<(), LoomError> {
        let state = self.env.store.read()?;
        let building = self.env.gh.list_issues_by_label("loom:building")?;
        sweep::run_sweep(&self.env.gh, &self.env.store, &self.env.loom_dir, &self.env.cfg, &building, self.env.clock.now(), state.force_mode)?;
        Ok(())
    }

    fn mark_stopped(&self) -> Result<(), LoomError> {
        let now = Utc::now();
        self.env.store.update(|mut s| {
            s.running = false;
            s.stopped_at = Some(now);
            s
        })?;
        Ok(())
    }

    fn run_iteration(
        &self,
        force_mode: bool,
        handles: &mut HashMap<String, actions::ShepherdHandle>,
        metrics: &mut IterationMetrics,
    ) -> Result<(), LoomError> {
        if self.env.signals.consume_stop_all_shepherds() {
            tracing::info!("stop-shepherds observed; no new shepherds will spawn this iteration");
        }

        let state = self.env.store.read()?;
        let snapshot = crate::snapshot::build_snapshot(&self.env.gh, &self.env.usage, &self.env.cfg, &state, &self.env.store, self.env.clock.as_ref())?;

        let mode = if force_mode {
            crate::shepherd::ShepherdMode::ForceMerge
        } else {
            crate::shepherd::ShepherdMode::Wait
        };
        run_actions(&self.env, mode, &state, &snapshot, handles)?;

        let finished = reap_shepherds(&self.env.store, handles)?;
        let completed_now: Vec<u64> = finished
            .iter()
            .filter(|(_, _, outcome)| matches!(outcome, Ok(crate::shepherd::ShepherdOutcome::Done)))
            .map(|(_, issue, _)| *issue)
            .collect();
        let error_count = finished.iter().filter(|(_, _, outcome)| outcome.is_err()).count();

        if !completed_now.is_empty() {
            self.env.store.update(|mut s| {
                s.completed_issues.extend(completed_now.iter().copied());
                s
            })?;
        }

        let building = snapshot.pipeline.building.clone();
        let interventions = sweep::run_sweep(&self.env.gh, &self.env.store, &self.env.loom_dir, &self.env.cfg, &building, self.env.clock.now(), force_mode)?;
        let critical_stuck = interventions.iter().filter(|i| i.severity == sweep::InterventionSeverity::Critical).count();

        let error_rate = if finished.is_empty() { 0.0 } else { error_count as f64 / finished.len() as f64 };
        let sample_inputs = SampleInputs {
            issues_per_hour: 0.0,
            prs_per_hour: 0.0,
            queue_depth: snapshot.computed.totals,
            error_rate,
            stuck_agents: snapshot.computed.stale_heartbeat_count.max(critical_stuck),
            max_shepherds: self.env.cfg.max_shepherds,
            resource_usage_percent: snapshot.usage.session_percent.unwrap_or(0.0),
        };
        health::record_sample(&self.env.store, sample_inputs, self.env.clock.now())?;

        let _ = metrics;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    GracefulShutdown,
    SessionTakenOver,
    StopConditionReached,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_contains_pid() {
        let id = generate_session_id(Utc::now());
        assert!(id.ends_with(&std::process::id().to_string()));
    }

    #[test]
    fn stop_condition_iterations_triggers_after_count() {
        let cond = StopCondition::Iterations(2);
        assert!(!cond.should_stop(1, Instant::now()));
        assert!(cond.should_stop(2, Instant::now()));
    }

    #[test]
    fn stop_condition_after_deadline_triggers_once_passed() {
        let cond = StopCondition::After(Instant::now());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cond.should_stop(0, Instant::now()));
    }
}
