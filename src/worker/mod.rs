//! Worker supervisor (spec §4.4): spawn, wait, and destroy one tmux-hosted
//! worker session.

mod completion;
mod stuck;
mod supervisor;

pub use completion::{looks_like_approval_prompt, matches_completion, patterns_for_role};
pub use stuck::{looks_stuck_at_prompt, IdleSignals, StuckSeverity};
pub use supervisor::{Supervisor, WaitOptions, WaitResult};
