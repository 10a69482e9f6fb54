//! Structured logging setup.
//!
//! The daemon is a background process; `.loom/daemon.log` is the only record of
//! what happened between polls. CLI subcommands that are not the daemon log to
//! stderr at a coarser default level so they stay quiet for scripting.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Initialize the daemon's file logger. Returns the appender guard; drop it only
/// at process exit (dropping early truncates buffered log lines).
pub fn init_daemon_logging(loom_dir: &Path, debug: bool) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(loom_dir)
        .with_context(|| format!("failed to create {}", loom_dir.display()))?;
    let file_appender = tracing_appender::rolling::never(loom_dir, "daemon.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("RUST_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .init();

    Ok(guard)
}

/// Initialize a quiet stderr logger for non-daemon CLI invocations (`shepherd`,
/// `daemon status`, `daemon health`, ...).
pub fn init_cli_logging() {
    let filter = EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
