//! `nebula`: the command-line surface for starting a Skitter node in
//! `deploy | local | worker | master` mode, per §6 of the design
//! document. Exit codes: `0` success, `1` argument error, `2` missing
//! release files (including commands this binary intentionally does not
//! implement, such as the daemon-control and ssh-spawning concerns a
//! release's shell launcher owns).

use std::process::ExitCode;

use clap::Parser;

mod cli;
mod run;

use cli::Cli;
use run::{EXIT_ARGUMENT_ERROR, dispatch};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            eprint!("{err}");
            return ExitCode::from(EXIT_ARGUMENT_ERROR);
        }
    };

    let (mode, command, flags) = cli.into_parts();
    let _log_guard = if flags.no_log { None } else { Some(nebula_log::init_from_env_or_ignore()) };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("nebula: failed to start async runtime: {err}");
            return ExitCode::from(run::EXIT_MISSING_RELEASE_FILES);
        }
    };
    runtime.block_on(dispatch(mode, command, flags))
}
