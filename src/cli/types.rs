use clap::{Parser, Subcommand};

pub use loom::commands::shepherd::ToStage;

const HELP_TEMPLATE: &str = "
   ╷
   │  ┌─┐┌─┐┌┬┐
   │  │ ││ ││││
   ┴─┘└─┘└─┘┴ ┴

{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}";

#[derive(Parser)]
#[command(name = "loom")]
#[command(about = "Autonomous software-development orchestrator", long_about = None)]
#[command(version)]
#[command(help_template = HELP_TEMPLATE)]
#[command(subcommand_help_heading = "Commands")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the daemon process
    Daemon {
        #[command(subcommand)]
        command: DaemonCommands,
    },

    /// Run one shepherd orchestration for an issue to completion
    Shepherd {
        /// Issue number to shepherd
        issue: u64,

        /// Force the pipeline through to merge without waiting on external
        /// approval or review
        #[arg(short, long, conflicts_with_all = ["wait", "to"])]
        force: bool,

        /// Wait for external approval/review transitions instead of forcing
        /// them (default)
        #[arg(short, long, conflicts_with = "to")]
        wait: bool,

        /// Force the pipeline up to (and including) a specific stopping
        /// point, then exit
        #[arg(long, value_enum)]
        to: Option<ToStage>,

        /// Reuse a specific 7-hex-char task id instead of generating one
        #[arg(long)]
        task_id: Option<String>,
    },
}

// `ToStage` itself lives in `loom::commands::shepherd` (re-exported above) so
// both the CLI parser and the command implementation share one type instead
// of converting between two parallel enums.

#[derive(Subcommand)]
pub enum DaemonCommands {
    /// Start the daemon loop
    Start {
        /// Take over the state file even if an existing session looks alive
        #[arg(short, long)]
        force: bool,

        /// Run in the foreground and block until the daemon stops, instead
        /// of forking into the background
        #[arg(long)]
        wait: bool,

        /// Raise logging to debug level
        #[arg(long)]
        debug: bool,

        /// Exit automatically after N minutes (0 disables the timeout)
        #[arg(long, value_name = "N")]
        timeout_min: Option<u64>,
    },

    /// Print daemon running/stopped status and uptime
    Status,

    /// Request graceful daemon shutdown
    Stop,

    /// Print a health summary (score, alerts, stuck agents)
    Health,

    /// Run read-only diagnostics over daemon state, optionally recovering
    /// stuck issues immediately instead of waiting for the next iteration
    Doctor {
        /// Perform daemon-level recovery actions (label restoration, session
        /// teardown) for anything flagged, rather than only reporting it
        #[arg(long)]
        recover: bool,
    },
}
