//! The daemon's exhaustive error taxonomy.
//!
//! Facade operations (platform, store, signal bus) return `Result<T, LoomError>`
//! so callers can branch on error *kind* instead of string-matching. Higher-level
//! orchestration composes these with `anyhow::Result` for ergonomic `?` chains and
//! downcasts back to `LoomError` only where the kind drives a decision (retry,
//! backoff, `loom:blocked` transitions).

use std::fmt;

/// Whether an `External` failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transience {
    /// The same call might succeed on the next iteration (network blip, lock contention).
    Transient,
    /// The call will keep failing until something about the world changes (bad credentials,
    /// missing binary, malformed repository).
    Permanent,
}

/// A suggested recovery action for a [`LoomError::Stuck`] worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StuckAction {
    Pause,
    Restart,
    Retry,
}

#[derive(Debug, thiserror::Error)]
pub enum LoomError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("state precondition not met: {0}")]
    StatePrecondition(String),

    #[error("external call failed ({transience:?}): {message}")]
    External {
        message: String,
        transience: Transience,
    },

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("worker stuck: {message} (suggest {action:?})")]
    Stuck {
        message: String,
        action: StuckAction,
    },

    #[error("session did not host a live worker within the verify window: {0}")]
    SpawnFailed(String),

    #[error("daemon-state session conflict: expected {expected}, found {found}")]
    Conflict { expected: String, found: String },

    #[error("usage above threshold: {session_percent}% >= {threshold}%")]
    RateLimited { session_percent: f64, threshold: f64 },

    #[error("interrupted by signal: {0}")]
    Shutdown(String),
}

impl LoomError {
    pub fn external(message: impl Into<String>, transience: Transience) -> Self {
        LoomError::External {
            message: message.into(),
            transience,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LoomError::External {
                transience: Transience::Transient,
                ..
            }
        )
    }
}

impl fmt::Display for Transience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transience::Transient => write!(f, "transient"),
            Transience::Permanent => write!(f, "permanent"),
        }
    }
}
