//! Platform facade (spec §4.1): every call the daemon makes into the outside
//! world — filesystem, process tree, tmux, git, GitHub, usage, clock — goes
//! through here, typed and fallible, never silently retried. Retry policy
//! lives at higher levels (scheduler backoff, phase executor retry).

pub mod fs_ops;
pub mod git;
pub mod github;
pub mod mux;
pub mod process;
pub mod usage;

pub use fs_ops::FsOps;
pub use git::GitFacade;
pub use github::GitHubFacade;
pub use mux::Mux;
pub use process::ProcessTree;
pub use usage::UsageFacade;
