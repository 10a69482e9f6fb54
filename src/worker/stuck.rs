//! Stuck-worker analysis: idle-age computation, severity thresholds, and the
//! fast stuck-at-prompt detector (spec §4.4, §4.9 worker-level).

use std::time::Duration;

use crate::config::DaemonConfig;
use crate::error::StuckAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StuckSeverity {
    Ok,
    Warning,
    Critical,
}

/// The three independent idle signals a worker can go quiet on; idle age is
/// their max, so any one of them staying fresh keeps the worker un-stuck.
#[derive(Debug, Clone, Copy)]
pub struct IdleSignals {
    pub heartbeat_age: Duration,
    pub log_mtime_age: Duration,
    pub pane_unchanged_age: Duration,
}

impl IdleSignals {
    pub fn idle_age(&self) -> Duration {
        self.heartbeat_age.max(self.log_mtime_age).max(self.pane_unchanged_age)
    }

    pub fn severity(&self, cfg: &DaemonConfig) -> StuckSeverity {
        let age = self.idle_age();
        if age >= cfg.stuck_critical {
            StuckSeverity::Critical
        } else if age >= cfg.stuck_warning {
            StuckSeverity::Warning
        } else {
            StuckSeverity::Ok
        }
    }

    /// The recovery action to take once critical severity is reached, per the
    /// configured `stuck_action`. `"warn"` alerts only and takes no action.
    pub fn action_for(&self, cfg: &DaemonConfig) -> Option<StuckAction> {
        if self.severity(cfg) != StuckSeverity::Critical {
            return None;
        }
        match cfg.stuck_action.as_str() {
            "pause" => Some(StuckAction::Pause),
            "restart" => Some(StuckAction::Restart),
            "retry" => Some(StuckAction::Retry),
            _ => None,
        }
    }
}

/// Detects a bare role slash-command sitting at the prompt with no streaming
/// indicator — the "stuck-at-prompt" fast path, checked after
/// `prompt_stuck_threshold` of otherwise-idle time.
pub fn looks_stuck_at_prompt(pane_text: &str, role_command: &str) -> bool {
    let Some(last_line) = pane_text.trim_end().lines().last() else {
        return false;
    };
    let lower = pane_text.to_ascii_lowercase();
    let has_processing_indicator =
        lower.contains("thinking") || pane_text.contains("...") || pane_text.contains('⠋') || pane_text.contains('⠙');
    last_line.trim_start().starts_with(role_command) && !has_processing_indicator
}
