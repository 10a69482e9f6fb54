mod cli;

use clap::Parser;
use cli::{dispatch, Cli, ExitError};

fn main() {
    let cli = Cli::parse();
    if let Err(e) = dispatch(cli.command) {
        let code = e.downcast_ref::<ExitError>().map_or(1, |exit| exit.code);
        eprintln!("Error: {e}");
        std::process::exit(code);
    }
}
