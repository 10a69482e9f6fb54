//! Session usage facade: an advisory helper that reports how much of the
//! current LLM session budget has been consumed, so the scheduler can defer
//! spawning a new Builder when usage is high. Per spec §9's guidance, a
//! failure here is never fatal: the caller proceeds as if usage were unknown.

use std::process::Command;

use crate::error::{LoomError, Transience};

#[derive(Clone)]
pub struct UsageFacade {
    /// Name of the external helper binary to shell out to. Configurable so a
    /// deployment can point this at whatever usage-reporting tool it has.
    command: String,
}

#[derive(Debug, Clone, Copy)]
pub struct UsageReading {
    pub session_percent: f64,
}

impl Default for UsageFacade {
    fn default() -> Self {
        Self { command: "loom-usage".to_string() }
    }
}

impl UsageFacade {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }

    /// Shell out to the configured usage helper and parse a bare percentage
    /// (e.g. `"42.5"`) from its stdout. Any failure — missing binary,
    /// non-zero exit, unparsable output — is surfaced as a transient
    /// `LoomError`; callers are expected to log it and continue rather than
    /// block progress on a monitoring failure.
    pub fn check(&self) -> Result<UsageReading, LoomError> {
        let output = Command::new(&self.command).output().map_err(|e| {
            LoomError::external(format!("{}: {e}", self.command), Transience::Transient)
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(LoomError::external(
                format!("{}: {stderr}", self.command),
                Transience::Transient,
            ));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let percent: f64 = text.trim().parse().map_err(|e| {
            LoomError::external(format!("parse usage output {text:?}: {e}"), Transience::Permanent)
        })?;
        Ok(UsageReading { session_percent: percent })
    }

    /// Run `check`, logging and swallowing any error so callers get `None`
    /// instead of having to thread error handling through advisory-only logic.
    pub fn check_advisory(&self) -> Option<UsageReading> {
        match self.check() {
            Ok(reading) => Some(reading),
            Err(e) => {
                tracing::warn!(error = %e, "usage check failed, proceeding without it");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_transient_error() {
        let facade = UsageFacade::new("loom-usage-binary-that-does-not-exist");
        let err = facade.check().unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn check_advisory_swallows_errors() {
        let facade = UsageFacade::new("loom-usage-binary-that-does-not-exist");
        assert!(facade.check_advisory().is_none());
    }
}
