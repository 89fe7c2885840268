use std::io::BufRead;
use std::path::Path;
use std::process::Command;

use crate::config::model::{Host, Settings};
use crate::sched::JobStats;

const BYTES_PER_MB: u64 = 1_048_576;

/// Builds the sync command line for one job. The host's option and
/// exclude strings are opaque passthroughs, split on whitespace.
pub fn build_sync_command(
    settings: &Settings,
    host: &Host,
    filter_file: Option<&Path>,
) -> Command {
    let mut cmd = Command::new(&settings.rsync_program);
    for word in host.rsync_options.split_whitespace() {
        cmd.arg(word);
    }
    cmd.arg("--archive")
        .arg("--delete")
        .arg("--numeric-ids")
        .arg("--stats")
        .arg("--itemize-changes")
        .arg(format!("--rsh={}", settings.rsh_program));
    for word in host.exclude.split_whitespace() {
        cmd.arg(word);
    }
    if let Some(filter) = filter_file {
        cmd.arg(format!("--filter=. {}", filter.display()));
    }
    let latest = host.latest_link();
    if latest.exists() {
        cmd.arg(format!("--link-dest={}/", latest.display()));
    }
    cmd.arg(format!("{}:/", host.hostname));
    cmd.arg(format!("{}/", host.working_dir().display()));
    cmd
}

/// Extracts the transfer totals from the sync program's `--stats` output.
/// Commas and dots are stripped before matching; sizes land as whole
/// megabytes.
pub fn parse_stats<R: BufRead>(reader: R) -> JobStats {
    let mut stats = JobStats::default();
    for line in reader.lines() {
        let Ok(line) = line else { break };
        let line: String = line.chars().filter(|c| *c != ',' && *c != '.').collect();
        if let Some(v) = stat_field(&line, "Number of files:") {
            stats.files_total = v;
        } else if let Some(v) = stat_field(&line, "Number of files transferred:")
            .or_else(|| stat_field(&line, "Number of regular files transferred:"))
        {
            stats.files_sent = v;
        } else if let Some(v) = stat_field(&line, "Total file size:") {
            stats.mb_total = v / BYTES_PER_MB;
        } else if let Some(v) = stat_field(&line, "Total transferred file size:") {
            stats.mb_sent = v / BYTES_PER_MB;
        }
    }
    stats
}

fn stat_field(line: &str, prefix: &str) -> Option<u64> {
    let rest = line.strip_prefix(prefix)?;
    rest.split_whitespace().next()?.parse().ok()
}
