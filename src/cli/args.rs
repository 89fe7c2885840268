use std::path::PathBuf;

use clap::Parser;

const DEFAULT_CONFIG: &str = "/etc/rsnap.conf";

#[derive(Parser, Debug)]
#[command(name = "rsnap")]
pub struct Cli {
    pub hostnames: Vec<String>,

    #[arg(long)]
    pub all: bool,
    #[arg(long = "group", value_name = "NAME")]
    pub groups: Vec<String>,
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
    #[arg(long)]
    pub force: bool,
    #[arg(long)]
    pub simulate: bool,
    #[arg(long = "no-cleanup")]
    pub no_cleanup: bool,
    #[arg(long)]
    pub debug: bool,
    #[arg(long)]
    pub progress: bool,
    #[arg(short = 'o', value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,
}
