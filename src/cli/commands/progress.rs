use crate::cli::args::Cli;
use crate::config::load::{apply_override, load_config, resolve_settings};
use crate::error::Result;
use crate::progress::ipc;

/// Queries a running instance over its fifo and prints the reply.
pub fn run_progress_command(cli: &Cli) -> Result<()> {
    let mut config = load_config(&cli.config)?;
    for expr in &cli.overrides {
        apply_override(&mut config, expr)?;
    }
    let settings = resolve_settings(&config);
    let reply = ipc::query(&settings.fifo, &settings.temp_dir)?;
    print!("{}", reply);
    Ok(())
}
