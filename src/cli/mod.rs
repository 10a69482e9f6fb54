mod dispatch;
mod types;

pub use dispatch::dispatch;
pub use loom::exit_error::ExitError;
pub use types::{Cli, Commands, DaemonCommands, ToStage};
