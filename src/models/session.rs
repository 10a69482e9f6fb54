use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A worker session: one tmux pane running one opaque `claude` process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session name suffix; the tmux session itself is `loom-<name>`.
    pub name: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell_pid: Option<u32>,
    pub output_file: PathBuf,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub ephemeral: bool,
    pub env: SessionEnv,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEnv {
    pub terminal_id: String,
    pub workspace: PathBuf,
    pub role: String,
}

impl Session {
    pub fn tmux_name(&self) -> String {
        format!("loom-{}", self.name)
    }
}
