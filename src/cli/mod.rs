pub mod args;
pub mod commands;

use clap::error::ErrorKind;
use clap::Parser;

use crate::cli::args::Cli;

/// Parses the command line and runs the requested mode. Startup
/// failures (bad args, bad config, unknown host, empty selection, lock
/// held) all map to exit code 1.
pub fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err)
            if err.kind() == ErrorKind::DisplayHelp
                || err.kind() == ErrorKind::DisplayVersion =>
        {
            print!("{}", err);
            return 0;
        }
        Err(err) => {
            eprint!("{}", err);
            return 1;
        }
    };
    init_tracing(cli.debug);

    let result = if cli.progress {
        commands::progress::run_progress_command(&cli)
    } else {
        commands::backup::run_backup_command(&cli)
    };
    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("rsnap: {}", err);
            1
        }
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
