pub mod mail;

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::config::model::Host;
use crate::progress::format_duration;
use crate::sched::HostState;

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    files_total: u64,
    files_sent: u64,
    mb_total: u64,
    mb_sent: u64,
    duration: u64,
}

impl Totals {
    fn add(&mut self, state: &HostState) {
        self.files_total += state.files_total;
        self.files_sent += state.files_sent;
        self.mb_total += state.mb_total;
        self.mb_sent += state.mb_sent;
        self.duration += state.duration;
    }
}

/// Builds the end-of-run text report: error blocks first, then the
/// per-host table with a subtotal per group and a grand total. Hosts
/// must arrive ordered by (group, hostname).
pub fn build_report(hosts: &[&Host], states: &HashMap<String, HostState>) -> String {
    let mut out = String::new();

    let failed: Vec<&&Host> = hosts
        .iter()
        .filter(|h| states.get(&h.hostname).map_or(0, |s| s.errors) > 0)
        .collect();
    if !failed.is_empty() {
        out.push_str("rsnap errors:\n\n");
        for host in failed {
            let Some(state) = states.get(&host.hostname) else {
                continue;
            };
            if state.jobs > 1 {
                let _ = writeln!(
                    out,
                    "{}: {} of {} jobs failed",
                    host.hostname, state.errors, state.jobs
                );
            } else {
                let _ = writeln!(out, "{}: backup failed", host.hostname);
            }
            for message in &state.error_messages {
                let _ = writeln!(out, "  {}", message);
            }
            out.push('\n');
        }
    }

    let _ = writeln!(
        out,
        "{:<24} {:>12} {:>12} {:>10} {:>10} {:>10}",
        "Host", "Files Total", "Files Sent", "GB Total", "GB Sent", "Time"
    );

    let mut current_group: Option<&str> = None;
    let mut group_totals = Totals::default();
    let mut grand_totals = Totals::default();
    for host in hosts {
        if let Some(group) = current_group {
            if group != host.group {
                write_totals(&mut out, &subtotal_label(group), &group_totals);
                out.push('\n');
                group_totals = Totals::default();
            }
        }
        current_group = Some(&host.group);
        let state = states.get(&host.hostname).cloned().unwrap_or_default();
        write_row(&mut out, &host.hostname, &state_totals(&state));
        group_totals.add(&state);
        grand_totals.add(&state);
    }
    if let Some(group) = current_group {
        write_totals(&mut out, &subtotal_label(group), &group_totals);
        out.push('\n');
    }
    write_totals(&mut out, "TOTAL", &grand_totals);
    out
}

fn subtotal_label(group: &str) -> String {
    if group.is_empty() {
        "total".to_string()
    } else {
        format!("{} total", group)
    }
}

fn state_totals(state: &HostState) -> Totals {
    Totals {
        files_total: state.files_total,
        files_sent: state.files_sent,
        mb_total: state.mb_total,
        mb_sent: state.mb_sent,
        duration: state.duration,
    }
}

fn write_row(out: &mut String, label: &str, totals: &Totals) {
    let _ = writeln!(
        out,
        "{:<24} {:>12} {:>12} {:>10.2} {:>10.2} {:>10}",
        label,
        totals.files_total,
        totals.files_sent,
        gb(totals.mb_total),
        gb(totals.mb_sent),
        format_duration(totals.duration)
    );
}

fn write_totals(out: &mut String, label: &str, totals: &Totals) {
    write_row(out, label, totals);
}

fn gb(mb: u64) -> f64 {
    mb as f64 / 1024.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn host(name: &str, group: &str) -> Host {
        Host {
            hostname: name.to_string(),
            group: group.to_string(),
            snapshot_root: PathBuf::from("/backup"),
            archive_name: "snapshot".to_string(),
            exclude: String::new(),
            rotate: 3,
            host_parallel: 1,
            parallel_paths: Vec::new(),
            weekdays: None,
            after_backup_hook: None,
            rsync_options: String::new(),
        }
    }

    fn state(files: u64, sent: u64, mb: u64, mb_sent: u64, secs: u64) -> HostState {
        HostState {
            jobs: 1,
            jobs_done: 1,
            files_total: files,
            files_sent: sent,
            mb_total: mb,
            mb_sent,
            duration: secs,
            ..HostState::default()
        }
    }

    #[test]
    fn clean_run_has_no_error_header() {
        let alpha = host("alpha", "web");
        let hosts = vec![&alpha];
        let mut states = HashMap::new();
        states.insert("alpha".to_string(), state(100, 10, 2048, 512, 62));
        let report = build_report(&hosts, &states);
        assert!(!report.contains("rsnap errors:"));
        assert!(report.contains("Host"));
        assert!(report.contains("alpha"));
        // 2048 MB renders as 2.00 GB, 512 MB as 0.50 GB
        assert!(report.contains("2.00"));
        assert!(report.contains("0.50"));
        assert!(report.contains("0:01:02"));
        assert!(report.contains("web total"));
        assert!(report.contains("TOTAL"));
    }

    #[test]
    fn failed_hosts_lead_the_report() {
        let alpha = host("alpha", "");
        let hosts = vec![&alpha];
        let mut states = HashMap::new();
        states.insert(
            "alpha".to_string(),
            HostState {
                jobs: 4,
                jobs_done: 4,
                errors: 2,
                error_messages: vec![
                    "part-data_a: sync exited with status 12".to_string(),
                    "rest: sync exited with status 12".to_string(),
                ],
                ..HostState::default()
            },
        );
        let report = build_report(&hosts, &states);
        assert!(report.starts_with("rsnap errors:"));
        assert!(report.contains("alpha: 2 of 4 jobs failed"));
        assert!(report.contains("part-data_a: sync exited with status 12"));
    }

    #[test]
    fn group_boundaries_emit_subtotals() {
        let a = host("a1", "db");
        let b = host("b1", "web");
        let c = host("b2", "web");
        let hosts = vec![&a, &b, &c];
        let mut states = HashMap::new();
        states.insert("a1".to_string(), state(1, 1, 1024, 0, 1));
        states.insert("b1".to_string(), state(2, 2, 1024, 0, 2));
        states.insert("b2".to_string(), state(3, 3, 1024, 0, 3));
        let report = build_report(&hosts, &states);

        let db_pos = report.find("db total").expect("db subtotal");
        let web_pos = report.find("web total").expect("web subtotal");
        let grand_pos = report.find("TOTAL").expect("grand total");
        assert!(db_pos < web_pos && web_pos < grand_pos);
        // web subtotal folds both web hosts together
        let web_line = report[web_pos..].lines().next().expect("line");
        assert!(web_line.contains('5'));
        assert!(web_line.contains("2.00"));
    }
}
