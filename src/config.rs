//! Daemon configuration: built-in defaults overlaid by environment variables,
//! overlaid by an optional `.loom/config.toml`, overlaid by CLI flags.
//!
//! Nothing outside this module reads `std::env::var` for a tunable directly;
//! that keeps the precedence rules in one place and makes the scheduler testable
//! with a plain [`DaemonConfig`] value.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq)]
pub enum IssueStrategy {
    Fifo,
    Lifo,
    Priority,
}

impl std::str::FromStr for IssueStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(Self::Fifo),
            "lifo" => Ok(Self::Lifo),
            "priority" => Ok(Self::Priority),
            other => anyhow::bail!("unknown issue strategy: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub poll_interval: Duration,
    pub iteration_timeout: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: u32,
    pub backoff_threshold: u32,
    pub max_shepherds: usize,
    pub issue_threshold: usize,
    pub max_proposals: usize,
    pub architect_cooldown: Duration,
    pub hermit_cooldown: Duration,
    pub issue_strategy: IssueStrategy,
    pub rate_limit_threshold: f64,
    pub heartbeat_stale_threshold: Duration,
    pub stuck_warning: Duration,
    pub stuck_critical: Duration,
    pub stuck_action: String,
    pub prompt_stuck_threshold: Duration,
    pub curator_timeout: Duration,
    pub builder_timeout: Duration,
    pub judge_timeout: Duration,
    pub doctor_timeout: Duration,
    pub doctor_max_retries: u32,
    pub stuck_max_retries: u32,
    pub spawn_verify_timeout: Duration,
    pub stale_building_minutes: u64,
    pub slow_multiplier: f64,

    /// `owner/name`; `None` lets `gh` infer it from the repo's git remote.
    pub repo: Option<String>,
    pub loom_dir: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(120),
            iteration_timeout: Duration::from_secs(300),
            max_backoff: Duration::from_secs(1800),
            backoff_multiplier: 2,
            backoff_threshold: 3,
            max_shepherds: 3,
            issue_threshold: 3,
            max_proposals: 5,
            architect_cooldown: Duration::from_secs(1800),
            hermit_cooldown: Duration::from_secs(1800),
            issue_strategy: IssueStrategy::Fifo,
            rate_limit_threshold: 90.0,
            heartbeat_stale_threshold: Duration::from_secs(120),
            stuck_warning: Duration::from_secs(300),
            stuck_critical: Duration::from_secs(600),
            stuck_action: "warn".to_string(),
            prompt_stuck_threshold: Duration::from_secs(30),
            curator_timeout: Duration::from_secs(300),
            builder_timeout: Duration::from_secs(1800),
            judge_timeout: Duration::from_secs(600),
            doctor_timeout: Duration::from_secs(900),
            doctor_max_retries: 3,
            stuck_max_retries: 1,
            spawn_verify_timeout: Duration::from_secs(10),
            stale_building_minutes: 15,
            slow_multiplier: 2.0,
            repo: None,
            loom_dir: PathBuf::from(".loom"),
        }
    }
}

/// Overrides read from `.loom/config.toml`. Every field is optional; only
/// present keys override the built-in default / environment value.
#[derive(Debug, Default, Deserialize)]
struct FileOverrides {
    poll_interval: Option<u64>,
    max_shepherds: Option<usize>,
    issue_threshold: Option<usize>,
    max_proposals: Option<usize>,
    issue_strategy: Option<String>,
    rate_limit_threshold: Option<f64>,
}

impl DaemonConfig {
    /// Load defaults, then environment, then `.loom/config.toml` if present.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let mut cfg = Self::default();
        cfg.loom_dir = repo_root.join(".loom");
        cfg.apply_env();
        let config_path = cfg.loom_dir.join("config.toml");
        if config_path.exists() {
            cfg.apply_file(&config_path)?;
        }
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_u64("POLL_INTERVAL") {
            self.poll_interval = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("ITERATION_TIMEOUT") {
            self.iteration_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("MAX_BACKOFF") {
            self.max_backoff = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("BACKOFF_MULTIPLIER") {
            self.backoff_multiplier = v as u32;
        }
        if let Some(v) = env_u64("BACKOFF_THRESHOLD") {
            self.backoff_threshold = v as u32;
        }
        if let Some(v) = env_u64("MAX_SHEPHERDS") {
            self.max_shepherds = v as usize;
        }
        if let Some(v) = env_u64("ISSUE_THRESHOLD") {
            self.issue_threshold = v as usize;
        }
        if let Some(v) = env_u64("MAX_PROPOSALS") {
            self.max_proposals = v as usize;
        }
        if let Some(v) = env_u64("ARCHITECT_COOLDOWN") {
            self.architect_cooldown = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("HERMIT_COOLDOWN") {
            self.hermit_cooldown = Duration::from_secs(v);
        }
        if let Ok(v) = std::env::var("ISSUE_STRATEGY") {
            if let Ok(parsed) = v.parse() {
                self.issue_strategy = parsed;
            }
        }
        if let Some(v) = env_f64("RATE_LIMIT_THRESHOLD") {
            self.rate_limit_threshold = v;
        }
        if let Some(v) = env_u64("HEARTBEAT_STALE_THRESHOLD") {
            self.heartbeat_stale_threshold = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("STUCK_WARNING") {
            self.stuck_warning = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("STUCK_CRITICAL") {
            self.stuck_critical = Duration::from_secs(v);
        }
        if let Ok(v) = std::env::var("STUCK_ACTION") {
            self.stuck_action = v;
        }
        if let Some(v) = env_u64("PROMPT_STUCK_THRESHOLD") {
            self.prompt_stuck_threshold = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("CURATOR_TIMEOUT") {
            self.curator_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("BUILDER_TIMEOUT") {
            self.builder_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("JUDGE_TIMEOUT") {
            self.judge_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("DOCTOR_TIMEOUT") {
            self.doctor_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("DOCTOR_MAX_RETRIES") {
            self.doctor_max_retries = v as u32;
        }
        if let Some(v) = env_u64("STUCK_MAX_RETRIES") {
            self.stuck_max_retries = v as u32;
        }
        if let Some(v) = env_u64("SPAWN_VERIFY_TIMEOUT") {
            self.spawn_verify_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("STALE_BUILDING_MINUTES") {
            self.stale_building_minutes = v;
        }
        if let Ok(v) = std::env::var("GH_REPO") {
            self.repo = Some(v);
        }
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let overrides: FileOverrides =
            toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))?;
        if let Some(v) = overrides.poll_interval {
            self.poll_interval = Duration::from_secs(v);
        }
        if let Some(v) = overrides.max_shepherds {
            self.max_shepherds = v;
        }
        if let Some(v) = overrides.issue_threshold {
            self.issue_threshold = v;
        }
        if let Some(v) = overrides.max_proposals {
            self.max_proposals = v;
        }
        if let Some(v) = overrides.issue_strategy {
            self.issue_strategy = v.parse()?;
        }
        if let Some(v) = overrides.rate_limit_threshold {
            self.rate_limit_threshold = v;
        }
        Ok(())
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn env_overrides_default() {
        std::env::set_var("MAX_SHEPHERDS", "7");
        let temp = tempfile::tempdir().unwrap();
        let cfg = DaemonConfig::load(temp.path()).unwrap();
        assert_eq!(cfg.max_shepherds, 7);
        std::env::remove_var("MAX_SHEPHERDS");
    }

    #[test]
    #[serial]
    fn file_overrides_env() {
        std::env::remove_var("MAX_SHEPHERDS");
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join(".loom")).unwrap();
        std::fs::write(
            temp.path().join(".loom/config.toml"),
            "max_shepherds = 9\n",
        )
        .unwrap();
        let cfg = DaemonConfig::load(temp.path()).unwrap();
        assert_eq!(cfg.max_shepherds, 9);
    }

    #[test]
    fn defaults_match_spec() {
        let cfg = DaemonConfig::default();
        assert_eq!(cfg.max_shepherds, 3);
        assert_eq!(cfg.issue_threshold, 3);
        assert_eq!(cfg.rate_limit_threshold, 90.0);
    }
}
