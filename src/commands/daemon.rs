//! `loom daemon <start|status|stop|health|doctor>` (spec §6.3).

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;

use crate::exit_error::ExitError;
use crate::logging;
use crate::platform::ProcessTree;
use crate::scheduler::{generate_session_id, Scheduler, StopCondition, StopReason};

use super::common::build_env;

fn pid_path(loom_dir: &std::path::Path) -> std::path::PathBuf {
    loom_dir.join("daemon-loop.pid")
}

fn read_running_pid(loom_dir: &std::path::Path) -> Option<u32> {
    let raw = std::fs::read_to_string(pid_path(loom_dir)).ok()?;
    let pid: u32 = raw.trim().parse().ok()?;
    ProcessTree::is_alive(pid).then_some(pid)
}

/// `daemon start`: runs the scheduler loop. With `--wait` this blocks in the
/// foreground; otherwise it re-execs itself with `--wait` set, detached from
/// the controlling terminal, and returns once the child is confirmed alive.
pub fn start(force: bool, wait: bool, debug: bool, timeout_min: Option<u64>) -> Result<()> {
    let env = build_env()?;

    if let Some(pid) = read_running_pid(&env.loom_dir) {
        if !force {
            return Err(ExitError::new(2, format!("daemon already running (pid {pid}); use --force to take over")).into());
        }
    }

    if !wait {
        return spawn_background(&env.repo_root, force, debug, timeout_min);
    }

    let _guard = logging::init_daemon_logging(&env.loom_dir, debug)?;
    std::fs::write(pid_path(&env.loom_dir), std::process::id().to_string())
        .with_context(|| format!("failed to write {}", pid_path(&env.loom_dir).display()))?;

    let now = Utc::now();
    let session_id = generate_session_id(now);
    env.store.init(&session_id, env.cfg.max_shepherds, now)?;
    if force {
        env.store.update(|mut s| {
            s.force_mode = true;
            s
        })?;
    }

    tracing::info!(session_id = %session_id, "{}", crate::LOGO);

    let stop_condition = match timeout_min.filter(|m| *m > 0) {
        Some(minutes) => StopCondition::After(Instant::now() + Duration::from_secs(minutes * 60)),
        None => StopCondition::Never,
    };

    let loom_dir = env.loom_dir.clone();
    let scheduler = Scheduler::new(env, session_id);
    let reason = scheduler.run(stop_condition, force).map_err(anyhow::Error::from)?;
    std::fs::remove_file(pid_path(&loom_dir)).ok();

    match reason {
        StopReason::GracefulShutdown => Ok(()),
        StopReason::SessionTakenOver => Err(ExitError::new(3, "daemon session was taken over by a newer instance").into()),
        StopReason::StopConditionReached => Ok(()),
    }
}

fn spawn_background(repo_root: &std::path::Path, force: bool, debug: bool, timeout_min: Option<u64>) -> Result<()> {
    let exe = std::env::current_exe().context("failed to resolve current executable")?;
    let mut args = vec!["daemon".to_string(), "start".to_string(), "--wait".to_string()];
    if force {
        args.push("--force".to_string());
    }
    if debug {
        args.push("--debug".to_string());
    }
    if let Some(minutes) = timeout_min {
        args.push("--timeout-min".to_string());
        args.push(minutes.to_string());
    }

    let child = std::process::Command::new(exe)
        .args(&args)
        .current_dir(repo_root)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .context("failed to fork daemon into the background")?;

    // Give the child a moment to write its PID file and fail fast (bad repo,
    // config error) before this process reports success.
    std::thread::sleep(Duration::from_millis(300));
    if !ProcessTree::is_alive(child.id()) {
        return Err(ExitError::new(2, "daemon exited immediately after starting; rerun with --wait to see the error").into());
    }

    println!("{} daemon started (pid {})", "✓".green().bold(), child.id());
    Ok(())
}

/// `daemon status`: exit 0 if running, 1 otherwise.
pub fn status() -> Result<()> {
    let env = build_env()?;
    match read_running_pid(&env.loom_dir) {
        Some(pid) => {
            let state = env.store.read();
            match state {
                Ok(s) if s.running => {
                    let uptime = (Utc::now() - s.started_at).num_seconds().max(0);
                    println!("{} daemon running (pid {pid}, session {}, uptime {uptime}s, iteration {})", "●".green(), s.daemon_session_id, s.iteration);
                    Ok(())
                }
                _ => Err(ExitError::new(1, "daemon process is alive but state file reports stopped").into()),
            }
        }
        None => Err(ExitError::new(1, "daemon is not running").into()),
    }
}

/// `daemon stop`: writes the graceful-shutdown signal; does not block on exit.
pub fn stop() -> Result<()> {
    let env = build_env()?;
    if read_running_pid(&env.loom_dir).is_none() {
        println!("{} daemon is not running", "─".dimmed());
        return Ok(());
    }
    env.signals.signal_stop_daemon().context("failed to write stop-daemon signal")?;
    println!("{} stop signal sent", "✓".green().bold());
    Ok(())
}

/// `daemon health`: exit 0 healthy, 1 warnings, 2 critical.
pub fn health() -> Result<()> {
    let env = build_env()?;
    let history = env.store.read_health().context("failed to read health metrics")?;
    let Some(latest) = history.samples.last() else {
        println!("{} no health samples yet", "─".dimmed());
        return Ok(());
    };

    println!("{} health score: {}", "●".bold(), latest.score);
    println!("  queue depth:   {}", latest.queue_depth);
    println!("  error rate:    {:.0}%", latest.error_rate * 100.0);
    println!("  stuck agents:  {}", latest.stuck_agents);

    let critical = history.alerts.iter().any(|a| a.severity == crate::models::AlertSeverity::Critical);
    let warning = history.alerts.iter().any(|a| a.severity == crate::models::AlertSeverity::Warning);

    if !history.alerts.is_empty() {
        println!("\n{}", "Alerts".bold());
        for alert in history.alerts.iter().rev().take(10) {
            println!("  [{:?}] {}", alert.severity, alert.message);
        }
    }

    if critical {
        Err(ExitError::new(2, "health check found critical alerts").into())
    } else if warning {
        Err(ExitError::new(1, "health check found warnings").into())
    } else {
        Ok(())
    }
}

/// `daemon doctor [--recover]`: read-only sweep, optionally recovering.
pub fn doctor(recover: bool) -> Result<()> {
    let env = build_env()?;
    let building = env.gh.list_issues_by_label("loom:building").context("failed to list loom:building issues")?;
    let interventions = crate::scheduler::sweep::run_sweep(&env.gh, &env.store, &env.loom_dir, &env.cfg, &building, env.clock.now(), recover)
        .context("sweep failed")?;

    if interventions.is_empty() {
        println!("{} no issues found", "✓".green().bold());
        return Ok(());
    }

    let mut critical = false;
    for i in &interventions {
        let marker = match i.severity {
            crate::scheduler::sweep::InterventionSeverity::Critical => {
                critical = true;
                "✗".red().bold()
            }
            crate::scheduler::sweep::InterventionSeverity::Warning => "!".yellow().bold(),
        };
        println!("{marker} {}: {}", i.agent_id, i.indicators.join(", "));
        if recover {
            println!("    -> {}", i.suggested_intervention);
        }
    }

    if critical {
        Err(ExitError::new(2, "doctor found critical issues").into())
    } else {
        Err(ExitError::new(1, "doctor found warnings").into())
    }
}
