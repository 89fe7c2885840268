pub mod ipc;
pub mod syslog;

use std::fmt::Write as _;
use std::time::Instant;

use chrono::{DateTime, Local};

/// Process-wide progress record; mutated only under the scheduler lock.
/// The `phase` template carries `%a %b %c %d` placeholders for
/// hosts_done, hosts_total, jobs_done and jobs_total.
#[derive(Debug, Clone)]
pub struct Progress {
    pub phase: String,
    pub hosts_total: usize,
    pub hosts_done: usize,
    pub jobs_total: usize,
    pub jobs_done: usize,
    pub workers: Vec<WorkerProgress>,
}

#[derive(Debug, Clone)]
pub struct WorkerProgress {
    pub state: String,
    pub started: Option<Instant>,
    pub last: u64,
}

impl Progress {
    pub fn new(hosts_total: usize, jobs_total: usize, workers: usize) -> Self {
        Progress {
            phase: String::new(),
            hosts_total,
            hosts_done: 0,
            jobs_total,
            jobs_done: 0,
            workers: vec![
                WorkerProgress {
                    state: "idle".to_string(),
                    started: None,
                    last: 0,
                };
                workers
            ],
        }
    }

    pub fn render_phase(&self) -> String {
        self.phase
            .replace("%a", &self.hosts_done.to_string())
            .replace("%b", &self.hosts_total.to_string())
            .replace("%c", &self.jobs_done.to_string())
            .replace("%d", &self.jobs_total.to_string())
    }
}

pub fn format_duration(secs: u64) -> String {
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// The free-form report served over the fifo.
pub fn format_report(progress: &Progress, started_at: DateTime<Local>, started: Instant) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "rsnap running since {}",
        started_at.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(
        out,
        "Elapsed: {}",
        format_duration(started.elapsed().as_secs())
    );
    let _ = writeln!(out, "Phase: {}", progress.render_phase());
    for (i, worker) in progress.workers.iter().enumerate() {
        match worker.started {
            Some(t) => {
                let _ = writeln!(
                    out,
                    "worker {}: {} ({}, last {})",
                    i,
                    worker.state,
                    format_duration(t.elapsed().as_secs()),
                    format_duration(worker.last)
                );
            }
            None => {
                let _ = writeln!(
                    out,
                    "worker {}: {} (last {})",
                    i,
                    worker.state,
                    format_duration(worker.last)
                );
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_placeholders_interpolate() {
        let mut progress = Progress::new(4, 10, 2);
        progress.phase = "Backing up (%a/%b hosts, %c/%d jobs done)".to_string();
        progress.hosts_done = 1;
        progress.jobs_done = 3;
        assert_eq!(
            progress.render_phase(),
            "Backing up (1/4 hosts, 3/10 jobs done)"
        );
    }

    #[test]
    fn durations_render_h_mm_ss() {
        assert_eq!(format_duration(0), "0:00:00");
        assert_eq!(format_duration(62), "0:01:02");
        assert_eq!(format_duration(3723), "1:02:03");
        assert_eq!(format_duration(36_061), "10:01:01");
    }

    #[test]
    fn report_lists_every_worker() {
        let mut progress = Progress::new(1, 1, 2);
        progress.phase = "Backing up (%a/%b hosts, %c/%d jobs done)".to_string();
        progress.workers[0].state = "h1 full".to_string();
        progress.workers[0].started = Some(Instant::now());
        let report = format_report(&progress, Local::now(), Instant::now());
        assert!(report.contains("Phase: Backing up (0/1 hosts, 0/1 jobs done)"));
        assert!(report.contains("worker 0: h1 full"));
        assert!(report.contains("worker 1: idle"));
    }
}
