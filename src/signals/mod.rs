//! Filesystem-based signal bus (spec §4.3): presence of a file *is* the
//! signal (level-triggered); consuming it deletes the file (edge
//! transition). Exists so external helpers and operators can steer the
//! daemon without an RPC surface — `touch .loom/stop-daemon` works from a
//! shell.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalKind {
    GracefulShutdown,
    StopAllShepherds,
    StopAgent(String),
    PauseAgent(String),
}

#[derive(Clone)]
pub struct SignalBus {
    loom_dir: PathBuf,
}

impl SignalBus {
    pub fn new(loom_dir: impl Into<PathBuf>) -> Self {
        Self { loom_dir: loom_dir.into() }
    }

    fn stop_daemon_path(&self) -> PathBuf {
        self.loom_dir.join("stop-daemon")
    }

    fn stop_shepherds_path(&self) -> PathBuf {
        self.loom_dir.join("stop-shepherds")
    }

    fn signals_dir(&self) -> PathBuf {
        self.loom_dir.join("signals")
    }

    fn stop_agent_path(&self, name: &str) -> PathBuf {
        self.signals_dir().join(format!("stop-{name}"))
    }

    fn pause_agent_path(&self, name: &str) -> PathBuf {
        self.signals_dir().join(format!("pause-{name}"))
    }

    pub fn has_graceful_shutdown(&self) -> bool {
        self.stop_daemon_path().exists()
    }

    pub fn has_stop_all_shepherds(&self) -> bool {
        self.stop_shepherds_path().exists()
    }

    pub fn has_stop_agent(&self, name: &str) -> bool {
        self.stop_agent_path(name).exists()
    }

    pub fn has_pause_agent(&self, name: &str) -> bool {
        self.pause_agent_path(name).exists()
    }

    pub fn signal_stop_daemon(&self) -> std::io::Result<()> {
        touch(&self.stop_daemon_path())
    }

    pub fn signal_stop_all_shepherds(&self) -> std::io::Result<()> {
        touch(&self.stop_shepherds_path())
    }

    pub fn signal_stop_agent(&self, name: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(self.signals_dir())?;
        touch(&self.stop_agent_path(name))
    }

    pub fn signal_pause_agent(&self, name: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(self.signals_dir())?;
        touch(&self.pause_agent_path(name))
    }

    /// Consume (delete) the daemon-wide `stop-daemon` signal, returning whether
    /// it was present.
    pub fn consume_graceful_shutdown(&self) -> bool {
        consume(&self.stop_daemon_path())
    }

    pub fn consume_stop_all_shepherds(&self) -> bool {
        consume(&self.stop_shepherds_path())
    }

    pub fn consume_stop_agent(&self, name: &str) -> bool {
        consume(&self.stop_agent_path(name))
    }

    /// Pause signals are advisory and re-checked every phase, so they are not
    /// consumed on read — only explicitly, once the shepherd has actually
    /// paused.
    pub fn consume_pause_agent(&self, name: &str) -> bool {
        consume(&self.pause_agent_path(name))
    }

    /// Scan `signals/` and return every `stop-<name>` / `pause-<name>` target
    /// currently asserted, without consuming them.
    pub fn list_agent_signals(&self) -> Vec<SignalKind> {
        let dir = self.signals_dir();
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for entry in entries.flatten() {
            let Some(filename) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Some(name) = filename.strip_prefix("stop-") {
                out.push(SignalKind::StopAgent(name.to_string()));
            } else if let Some(name) = filename.strip_prefix("pause-") {
                out.push(SignalKind::PauseAgent(name.to_string()));
            }
        }
        out
    }
}

fn touch(path: &Path) -> std::io::Result<()> {
    std::fs::write(path, b"")
}

fn consume(path: &Path) -> bool {
    if path.exists() {
        std::fs::remove_file(path).ok();
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_daemon_signal_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let bus = SignalBus::new(dir.path());
        assert!(!bus.has_graceful_shutdown());
        bus.signal_stop_daemon().unwrap();
        assert!(bus.has_graceful_shutdown());
        assert!(bus.consume_graceful_shutdown());
        assert!(!bus.has_graceful_shutdown());
        assert!(!bus.consume_graceful_shutdown());
    }

    #[test]
    fn per_agent_signals_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let bus = SignalBus::new(dir.path());
        bus.signal_stop_agent("shepherd-1").unwrap();
        bus.signal_pause_agent("shepherd-2").unwrap();
        assert!(bus.has_stop_agent("shepherd-1"));
        assert!(!bus.has_stop_agent("shepherd-2"));
        assert!(bus.has_pause_agent("shepherd-2"));
        let signals = bus.list_agent_signals();
        assert_eq!(signals.len(), 2);
        assert!(bus.consume_stop_agent("shepherd-1"));
        assert!(!bus.has_stop_agent("shepherd-1"));
    }
}
