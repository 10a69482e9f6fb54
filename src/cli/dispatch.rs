use anyhow::Result;

use loom::commands::{daemon, shepherd};

use super::types::{Commands, DaemonCommands};

pub fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Daemon { command } => match command {
            DaemonCommands::Start { force, wait, debug, timeout_min } => daemon::start(force, wait, debug, timeout_min),
            DaemonCommands::Status => daemon::status(),
            DaemonCommands::Stop => daemon::stop(),
            DaemonCommands::Health => daemon::health(),
            DaemonCommands::Doctor { recover } => daemon::doctor(recover),
        },
        Commands::Shepherd { issue, force, wait, to, task_id } => shepherd::run(issue, force, wait, to, task_id),
    }
}
