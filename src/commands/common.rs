//! Shared setup used by every CLI subcommand: locate the repo root, load
//! config, and assemble the facades each command needs. Kept here instead of
//! duplicated per command, the way the teacher's `commands::common` does.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::clock::{Clock, SystemClock};
use crate::config::DaemonConfig;
use crate::platform::github::GitHubFacade;
use crate::platform::usage::UsageFacade;
use crate::scheduler::actions::ShepherdEnv;
use crate::signals::SignalBus;
use crate::store::StateStore;

/// Walk up from the current directory looking for a `.git` entry, the same
/// repo-root detection every `gh`/`git` invocation in this daemon assumes.
pub fn find_repo_root() -> Result<PathBuf> {
    let mut current = std::env::current_dir().context("failed to read current directory")?;
    loop {
        if current.join(".git").exists() {
            return Ok(current);
        }
        if !current.pop() {
            anyhow::bail!("not inside a git repository (no .git found in any parent directory)");
        }
    }
}

/// Build the environment every command and the scheduler share. `repo_root`
/// is discovered fresh each call rather than cached anywhere, since each CLI
/// invocation is a fresh process.
pub fn build_env() -> Result<ShepherdEnv> {
    let repo_root = find_repo_root()?;
    let cfg = DaemonConfig::load(&repo_root).context("failed to load daemon config")?;
    let loom_dir = cfg.loom_dir.clone();
    std::fs::create_dir_all(&loom_dir).with_context(|| format!("failed to create {}", loom_dir.display()))?;

    Ok(ShepherdEnv {
        repo_root,
        loom_dir: loom_dir.clone(),
        store: StateStore::new(&loom_dir),
        signals: SignalBus::new(&loom_dir),
        gh: GitHubFacade::new(cfg.repo.clone()),
        usage: UsageFacade::default(),
        clock: Arc::new(SystemClock) as Arc<dyn Clock + Send + Sync>,
        cfg,
    })
}
