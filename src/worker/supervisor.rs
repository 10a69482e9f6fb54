//! One worker session, from spawn through completion or destruction
//! (spec §4.4). Ties together `Mux`, `ProcessTree`, and the state store's
//! progress-file heartbeat, but never touches GitHub or phase contracts
//! directly — those are supplied by the caller as a `contract_check` closure
//! so the phase executor stays the single place that knows what "done" means
//! for a given role.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::clock::Clock;
use crate::config::DaemonConfig;
use crate::error::{LoomError, StuckAction, Transience};
use crate::models::{Session, SessionEnv};
use crate::platform::{Mux, ProcessTree};
use crate::signals::SignalBus;
use crate::store::StateStore;
use crate::worker::completion::{looks_like_approval_prompt, matches_completion, patterns_for_role};
use crate::worker::stuck::{looks_stuck_at_prompt, IdleSignals};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitResult {
    Completed(String),
    Timeout,
    NotFound,
    SignalReceived,
    Stuck(StuckAction),
}

#[derive(Debug, Clone, Default)]
pub struct WaitOptions {
    pub issue: Option<u64>,
    pub phase: Option<String>,
    pub worktree: Option<PathBuf>,
    pub pr: Option<u64>,
    pub task_id: Option<String>,
}

pub struct Supervisor;

fn log_path(loom_dir: &Path, name: &str) -> PathBuf {
    loom_dir.join("logs").join(format!("loom-{name}.log"))
}

impl Supervisor {
    /// Spawn (or reuse a healthy existing) session named `loom-<name>`
    /// running `role_command` as its initial prompt.
    pub fn spawn(
        loom_dir: &Path,
        cfg: &DaemonConfig,
        signals: &SignalBus,
        role: &str,
        name: &str,
        role_command: &str,
        cwd: &Path,
    ) -> Result<Session, LoomError> {
        if signals.has_stop_agent(name) {
            return Err(LoomError::Shutdown(format!("stop signal present for {name}")));
        }

        let tmux_name = format!("loom-{name}");
        let log = log_path(loom_dir, name);

        if Mux::has_session(&tmux_name) {
            if let Some(session) = Self::reuse_if_healthy(&tmux_name, name, role, &log, cwd)? {
                return Ok(session);
            }
            Self::destroy(&tmux_name, true);
        }

        if log.exists() {
            let ts = Utc::now().format("%Y%m%d-%H%M%S");
            let rotated = log.with_extension(format!("{ts}.log"));
            std::fs::rename(&log, &rotated).ok();
        }
        if let Some(parent) = log.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LoomError::external(format!("mkdir {}: {e}", parent.display()), Transience::Transient)
            })?;
        }
        std::fs::write(&log, format!("=== loom session {name} ({role}) started {} ===\n", Utc::now())).map_err(|e| {
            LoomError::external(format!("write log header {}: {e}", log.display()), Transience::Transient)
        })?;

        Mux::new_detached(
            &tmux_name,
            cwd,
            &[("TERMINAL_ID", name), ("WORKSPACE", cwd.to_string_lossy().as_ref()), ("ROLE", role)],
        )?;
        Mux::pipe_pane_to_file(&tmux_name, &log)?;

        // The role command is passed as a CLI argument to `claude`, not sent
        // as a follow-up keystroke, to avoid a race against the TUI's own
        // input handling (spec §9).
        let launch = format!("claude \"{role_command}\"");
        Mux::send_keys(&tmux_name, &launch)?;

        let shell_pid = Self::verify_spawned(&tmux_name, cfg.spawn_verify_timeout)?;

        Ok(Session {
            name: name.to_string(),
            role: role.to_string(),
            shell_pid: Some(shell_pid),
            output_file: log,
            created_at: Utc::now(),
            ephemeral: true,
            env: SessionEnv {
                terminal_id: name.to_string(),
                workspace: cwd.to_path_buf(),
                role: role.to_string(),
            },
        })
    }

    fn reuse_if_healthy(
        tmux_name: &str,
        name: &str,
        role: &str,
        log: &Path,
        cwd: &Path,
    ) -> Result<Option<Session>, LoomError> {
        let panes = Mux::list_panes(tmux_name).unwrap_or_default();
        let alive = panes.iter().any(|pid| ProcessTree::is_alive(*pid));
        if !alive {
            return Ok(None);
        }
        Ok(Some(Session {
            name: name.to_string(),
            role: role.to_string(),
            shell_pid: panes.first().copied(),
            output_file: log.to_path_buf(),
            created_at: Utc::now(),
            ephemeral: true,
            env: SessionEnv {
                terminal_id: name.to_string(),
                workspace: cwd.to_path_buf(),
                role: role.to_string(),
            },
        }))
    }

    /// Poll until a `claude` process shows up as a descendant of the pane's
    /// shell, or `timeout` elapses.
    fn verify_spawned(tmux_name: &str, timeout: Duration) -> Result<u32, LoomError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(panes) = Mux::list_panes(tmux_name) {
                if let Some(&shell_pid) = panes.first() {
                    let mut descendants = ProcessTree::list_descendants(shell_pid);
                    descendants.push(shell_pid);
                    let has_claude = descendants.iter().any(|&pid| process_is_claude(pid));
                    if has_claude {
                        return Ok(shell_pid);
                    }
                }
            }
            if Instant::now() >= deadline {
                return Err(LoomError::SpawnFailed(format!(
                    "no claude descendant found for {tmux_name} within {timeout:?}"
                )));
            }
            std::thread::sleep(Duration::from_millis(200));
        }
    }

    /// Wait for completion, timeout, a signal, or a stuck determination.
    /// `contract_check` runs the phase-specific validator in check-only mode
    /// and returns `Ok(true)` once the contract is satisfied or recovered.
    #[allow(clippy::too_many_arguments)]
    pub fn wait(
        loom_dir: &Path,
        cfg: &DaemonConfig,
        store: &StateStore,
        signals: &SignalBus,
        clock: &dyn Clock,
        session: &Session,
        role_command: &str,
        timeout: Duration,
        opts: &WaitOptions,
        mut contract_check: impl FnMut() -> Result<bool, LoomError>,
    ) -> WaitResult {
        let tmux_name = session.tmux_name();
        if !Mux::has_session(&tmux_name) {
            return WaitResult::NotFound;
        }

        let patterns = patterns_for_role(&session.role);
        let deadline = Instant::now() + timeout;
        let mut last_contract_check = Instant::now();
        let mut last_heartbeat = Instant::now();
        let mut last_pane_hash: Option<u64> = None;
        let mut last_pane_change = Instant::now();
        let mut approval_sent = false;
        let mut recovery_attempted = false;
        let mut stuck_start: Option<Instant> = None;
        let _ = loom_dir;

        loop {
            if signals.has_stop_agent(&session.name) || signals.has_stop_all_shepherds() || signals.has_graceful_shutdown() {
                return WaitResult::SignalReceived;
            }
            if !Mux::has_session(&tmux_name) {
                return WaitResult::NotFound;
            }

            let pane = Mux::capture_pane(&tmux_name).unwrap_or_default();
            let hash = simple_hash(&pane);
            if last_pane_hash != Some(hash) {
                last_pane_hash = Some(hash);
                last_pane_change = Instant::now();
                recovery_attempted = false;
                stuck_start = None;
            }

            if !approval_sent && looks_like_approval_prompt(&pane) {
                Mux::send_key(&tmux_name, "1").ok();
                Mux::send_key(&tmux_name, "Enter").ok();
                approval_sent = true;
            }

            if let Some(task_id) = &opts.task_id {
                if last_heartbeat.elapsed() >= Duration::from_secs(60) {
                    if let Ok(mut progress) = store.read_progress(task_id) {
                        progress.last_heartbeat = clock.now();
                        store.write_progress(&progress).ok();
                    }
                    last_heartbeat = Instant::now();
                }
            }

            let idle_age = last_pane_change.elapsed();

            if idle_age >= cfg.prompt_stuck_threshold && looks_stuck_at_prompt(&pane, role_command) {
                let started = *stuck_start.get_or_insert(Instant::now());
                if !recovery_attempted && started.elapsed() >= cfg.prompt_stuck_threshold {
                    Mux::send_key(&tmux_name, "Enter").ok();
                    std::thread::sleep(Duration::from_secs(2));
                    let repane = Mux::capture_pane(&tmux_name).unwrap_or_default();
                    if looks_stuck_at_prompt(&repane, role_command) {
                        Mux::send_keys(&tmux_name, role_command).ok();
                    }
                    recovery_attempted = true;
                }
            }

            if matches_completion(&pane, &patterns) {
                std::thread::sleep(Duration::from_secs(3));
                match contract_check() {
                    Ok(true) => return WaitResult::Completed("log_pattern".to_string()),
                    _ => {}
                }
            }

            if last_contract_check.elapsed() >= Duration::from_secs(90) || idle_age >= Duration::from_secs(60) {
                last_contract_check = Instant::now();
                if let Ok(true) = contract_check() {
                    return WaitResult::Completed("phase_contract_satisfied".to_string());
                }
            }

            let signals_snapshot = IdleSignals {
                heartbeat_age: opts
                    .task_id
                    .as_ref()
                    .and_then(|t| store.read_progress(t).ok())
                    .map(|p| clock.since(p.last_heartbeat))
                    .unwrap_or(Duration::ZERO),
                log_mtime_age: std::fs::metadata(&session.output_file)
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|m| m.elapsed().ok())
                    .unwrap_or(Duration::ZERO),
                pane_unchanged_age: idle_age,
            };
            if let Some(action) = signals_snapshot.action_for(cfg) {
                return WaitResult::Stuck(action);
            }

            if Instant::now() >= deadline {
                return WaitResult::Timeout;
            }
            std::thread::sleep(Duration::from_secs(1));
        }
    }

    /// Kill the process tree rooted at the session's pane PID, then the
    /// session itself. `force` skips the SIGTERM grace period.
    pub fn destroy(tmux_name: &str, force: bool) {
        if let Ok(panes) = Mux::list_panes(tmux_name) {
            for pid in panes {
                ProcessTree::kill_tree(pid, Duration::from_secs(1), force);
            }
        }
        Mux::kill_session(tmux_name).ok();
    }
}

fn process_is_claude(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{pid}/cmdline"))
        .map(|c| c.replace('\0', " ").contains("claude"))
        .unwrap_or(false)
}

fn simple_hash(s: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}
