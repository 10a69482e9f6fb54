//! The state store (spec §4.2): owns every authoritative JSON document under
//! `.loom/`. All mutation goes through `update`, which takes an exclusive
//! `fs2` lock for the duration of the read-modify-write cycle — the same
//! locked-read/locked-write discipline as the teacher's `fs::locking` module,
//! generalized here into a single-writer `update(fn)` API instead of separate
//! read/write calls, so callers can't interleave a read and a write and race
//! another process.

mod rotation;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{LoomError, Transience};
use crate::models::{DaemonState, HealthMetricsHistory, ProgressFile};
use crate::platform::FsOps;

use rotation::rotate_to_archive;

pub const ARCHIVE_RETENTION: usize = 10;

#[derive(Clone)]
pub struct StateStore {
    loom_dir: PathBuf,
}

impl StateStore {
    pub fn new(loom_dir: impl Into<PathBuf>) -> Self {
        Self { loom_dir: loom_dir.into() }
    }

    fn state_path(&self) -> PathBuf {
        self.loom_dir.join("daemon-state.json")
    }

    fn metrics_path(&self) -> PathBuf {
        self.loom_dir.join("daemon-metrics.json")
    }

    fn health_path(&self) -> PathBuf {
        self.loom_dir.join("health-metrics.json")
    }

    fn progress_path(&self, task_id: &str) -> PathBuf {
        self.loom_dir.join("progress").join(format!("shepherd-{task_id}.json"))
    }

    /// Create (or take over) the state document for `daemon_session_id`. If a
    /// state file already exists and belongs to a different session, the old
    /// file is rotated to a timestamped archive (keep last 10) first, per I1.
    pub fn init(
        &self,
        daemon_session_id: &str,
        max_shepherds: usize,
        now: DateTime<Utc>,
    ) -> Result<DaemonState, LoomError> {
        let path = self.state_path();
        if path.exists() {
            let existing = self.read()?;
            if existing.daemon_session_id != daemon_session_id {
                rotate_to_archive(&path, "daemon-state", now, ARCHIVE_RETENTION)?;
            } else {
                return Ok(existing);
            }
        }
        let fresh = DaemonState::new(daemon_session_id, max_shepherds, now);
        self.write_state(&fresh)?;
        Ok(fresh)
    }

    /// Snapshot read; no lock beyond what `fs2` shared-locks provide against a
    /// concurrent writer.
    pub fn read(&self) -> Result<DaemonState, LoomError> {
        let path = self.state_path();
        let content = locked_read(&path)?;
        serde_json::from_str(&content).map_err(|e| {
            LoomError::external(format!("parse {}: {e}", path.display()), Transience::Permanent)
        })
    }

    fn write_state(&self, state: &DaemonState) -> Result<(), LoomError> {
        let json = serde_json::to_string_pretty(state).map_err(|e| {
            LoomError::external(format!("serialize daemon state: {e}"), Transience::Permanent)
        })?;
        FsOps::atomic_write(&self.state_path(), &format!("{json}\n"))
    }

    /// Run `f` against the current state and persist the result. The whole
    /// cycle holds an exclusive lock on the state file, so concurrent
    /// `update` calls from different shepherd threads serialize rather than
    /// clobbering each other's changes.
    pub fn update<F>(&self, f: F) -> Result<DaemonState, LoomError>
    where
        F: FnOnce(DaemonState) -> DaemonState,
    {
        let path = self.state_path();
        let lock_file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| LoomError::external(format!("open {}: {e}", path.display()), Transience::Transient))?;
        use fs2::FileExt;
        lock_file.lock_exclusive().map_err(|e| {
            LoomError::external(format!("lock {}: {e}", path.display()), Transience::Transient)
        })?;

        let current = self.read()?;
        let updated = f(current);
        let result = self.write_state(&updated);
        fs2::FileExt::unlock(&lock_file).ok();
        result?;
        Ok(updated)
    }

    /// Checked once per scheduler iteration (I1): if another daemon has taken
    /// over the state file, this daemon must exit gracefully.
    pub fn validate_ownership(&self, my_session_id: &str) -> bool {
        self.read().map(|s| s.daemon_session_id == my_session_id).unwrap_or(false)
    }

    pub fn write_progress(&self, progress: &ProgressFile) -> Result<(), LoomError> {
        let json = serde_json::to_string_pretty(progress).map_err(|e| {
            LoomError::external(format!("serialize progress: {e}"), Transience::Permanent)
        })?;
        FsOps::atomic_write(&self.progress_path(&progress.task_id), &format!("{json}\n"))
    }

    pub fn read_progress(&self, task_id: &str) -> Result<ProgressFile, LoomError> {
        let path = self.progress_path(task_id);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LoomError::NotFound(format!("progress for {task_id}"))
            } else {
                LoomError::external(format!("read {}: {e}", path.display()), Transience::Transient)
            }
        })?;
        serde_json::from_str(&content).map_err(|e| {
            LoomError::external(format!("parse {}: {e}", path.display()), Transience::Permanent)
        })
    }

    /// Rotate the prior metrics snapshot to a timestamped archive (keep last
    /// 10) and write the new one, matching the `daemon-metrics-<ts>.json`
    /// layout in the filesystem spec.
    pub fn write_metrics_rotated(&self, history: &HealthMetricsHistory, now: DateTime<Utc>) -> Result<(), LoomError> {
        let path = self.metrics_path();
        if path.exists() {
            rotate_to_archive(&path, "daemon-metrics", now, ARCHIVE_RETENTION)?;
        }
        let json = serde_json::to_string_pretty(history).map_err(|e| {
            LoomError::external(format!("serialize metrics: {e}"), Transience::Permanent)
        })?;
        FsOps::atomic_write(&path, &format!("{json}\n"))
    }

    pub fn read_health(&self) -> Result<HealthMetricsHistory, LoomError> {
        let path = self.health_path();
        let content = FsOps::read_or_default(&path, "{}")?;
        serde_json::from_str(&content).map_err(|e| {
            LoomError::external(format!("parse {}: {e}", path.display()), Transience::Permanent)
        })
    }

    pub fn write_health(&self, history: &HealthMetricsHistory) -> Result<(), LoomError> {
        let json = serde_json::to_string_pretty(history).map_err(|e| {
            LoomError::external(format!("serialize health: {e}"), Transience::Permanent)
        })?;
        FsOps::atomic_write(&self.health_path(), &format!("{json}\n"))
    }
}

/// Shared-lock read, mirroring the teacher's `fs::locking::locked_read`.
fn locked_read(path: &Path) -> Result<String, LoomError> {
    let file = std::fs::File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            LoomError::NotFound(path.display().to_string())
        } else {
            LoomError::external(format!("open {}: {e}", path.display()), Transience::Transient)
        }
    })?;
    use fs2::FileExt;
    file.lock_shared().map_err(|e| {
        LoomError::external(format!("lock {}: {e}", path.display()), Transience::Transient)
    })?;
    use std::io::Read;
    let mut content = String::new();
    std::io::BufReader::new(&file).read_to_string(&mut content).map_err(|e| {
        LoomError::external(format!("read {}: {e}", path.display()), Transience::Transient)
    })?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_fresh_state_with_no_prior_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        let state = store.init("session-1", 3, Utc::now()).unwrap();
        assert_eq!(state.daemon_session_id, "session-1");
        assert_eq!(state.shepherds.len(), 3);
    }

    #[test]
    fn init_with_same_session_returns_existing_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        store.init("session-1", 3, Utc::now()).unwrap();
        store.update(|mut s| { s.iteration = 5; s }).unwrap();
        let second = store.init("session-1", 3, Utc::now()).unwrap();
        assert_eq!(second.iteration, 5);
    }

    #[test]
    fn init_with_different_session_rotates_old_state_to_archive() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        store.init("session-1", 3, Utc::now()).unwrap();
        let second = store.init("session-2", 3, Utc::now()).unwrap();
        assert_eq!(second.daemon_session_id, "session-2");
        let archives = FsOps::list_glob(&format!("{}/daemon-state-*.json", dir.path().display())).unwrap();
        assert_eq!(archives.len(), 1);
    }

    #[test]
    fn validate_ownership_detects_takeover() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        store.init("session-1", 3, Utc::now()).unwrap();
        assert!(store.validate_ownership("session-1"));
        store.init("session-2", 3, Utc::now()).unwrap();
        assert!(!store.validate_ownership("session-1"));
    }

    #[test]
    fn update_applies_closure_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        store.init("session-1", 3, Utc::now()).unwrap();
        store.update(|mut s| { s.iteration += 1; s }).unwrap();
        let read_back = store.read().unwrap();
        assert_eq!(read_back.iteration, 1);
    }

    #[test]
    fn progress_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        let progress = ProgressFile::new("abc1234", 9, Utc::now());
        store.write_progress(&progress).unwrap();
        let read_back = store.read_progress("abc1234").unwrap();
        assert_eq!(read_back.issue, 9);
    }

    #[test]
    fn missing_progress_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        let err = store.read_progress("0000000").unwrap_err();
        assert!(matches!(err, LoomError::NotFound(_)));
    }
}
