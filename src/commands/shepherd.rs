//! `loom shepherd <issue> [...]` (spec §6.3): runs one shepherd orchestration
//! to completion, outside the daemon loop. Used for manual runs and debugging
//! a single issue without starting the full scheduler.

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;

use crate::exit_error::ExitError;
use crate::logging;
use crate::models::generate_task_id;
use crate::shepherd::{self, ShepherdContext, ShepherdMode, ShepherdOutcome};

use super::common::build_env;

/// Stopping point for a forced `shepherd --to <stage>` run (spec §6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum ToStage {
    Curated,
    Approved,
    Pr,
}

fn resolve_mode(force: bool, to: Option<ToStage>) -> ShepherdMode {
    match to {
        Some(ToStage::Curated) => ShepherdMode::ForceCurated,
        Some(ToStage::Approved) => ShepherdMode::ForceApproved,
        Some(ToStage::Pr) => ShepherdMode::ForcePr,
        None if force => ShepherdMode::ForceMerge,
        None => ShepherdMode::Wait,
    }
}

pub fn run(issue: u64, force: bool, _wait: bool, to: Option<ToStage>, task_id: Option<String>) -> Result<()> {
    let env = build_env()?;
    logging::init_cli_logging();

    let mode = resolve_mode(force, to);
    let task_id = task_id.unwrap_or_else(generate_task_id);

    let ctx = ShepherdContext {
        repo_root: &env.repo_root,
        loom_dir: &env.loom_dir,
        cfg: &env.cfg,
        store: &env.store,
        signals: &env.signals,
        gh: &env.gh,
        usage: &env.usage,
        clock: env.clock.as_ref(),
    };

    println!("{} shepherding issue #{issue} (task {task_id}, mode {mode:?})", "→".cyan().bold());
    let outcome = shepherd::run_shepherd(&ctx, issue, mode, task_id).context("shepherd run failed")?;

    match outcome {
        ShepherdOutcome::Done => {
            println!("{} issue #{issue} done", "✓".green().bold());
            Ok(())
        }
        ShepherdOutcome::Blocked(reason) => {
            println!("{} issue #{issue} blocked: {reason}", "!".yellow().bold());
            Err(ExitError::new(1, format!("blocked: {reason}")).into())
        }
        ShepherdOutcome::NoOp(reason) => {
            println!("{} issue #{issue} no-op: {reason}", "─".dimmed());
            Ok(())
        }
        ShepherdOutcome::RateLimited => {
            println!("{} usage rate limit reached", "!".yellow().bold());
            Err(ExitError::new(1, "usage rate limit reached").into())
        }
        ShepherdOutcome::Shutdown => {
            println!("{} interrupted by shutdown signal", "!".yellow().bold());
            Err(ExitError::new(3, "interrupted by shutdown signal").into())
        }
    }
}
