use std::fs::{self, File, OpenOptions};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::backup::rsync;
use crate::config::model::{Host, Settings};
use crate::sched::job::Job;
use crate::sched::{JobStats, Scheduler};
use crate::types::RunMode;
use crate::util::command::describe;

/// One backup worker: owns a private temp directory, pulls jobs until
/// the dispatcher has nothing admissible, runs the sync subprocess and
/// reports the outcome.
pub fn run(worker_id: usize, sched: Arc<Scheduler>, settings: Arc<Settings>) {
    let temp_dir = settings.temp_dir.join(format!("rsnap.thread.{}", worker_id));
    if !sched.run_mode.simulate {
        // drop any leftover from a crashed run
        if temp_dir.exists() {
            let _ = fs::remove_dir_all(&temp_dir);
        }
        if let Err(err) = fs::create_dir_all(&temp_dir) {
            eprintln!("worker {}: create {}: {}", worker_id, temp_dir.display(), err);
            return;
        }
    }

    while let Some(backup_job) = sched.next_job(worker_id) {
        let Some(host) = sched.hosts.get(&backup_job.hostname) else {
            continue;
        };
        let started = Instant::now();
        let (status, stats) = run_job(&backup_job, host, &temp_dir, &settings, sched.run_mode);
        let duration = started.elapsed().as_secs();
        sched.job_done(&backup_job, duration, status, stats);
        sched.set_worker_idle(worker_id, duration);
    }
    debug!("worker {} done", worker_id);

    if !sched.run_mode.simulate {
        let _ = fs::remove_dir_all(&temp_dir);
    }
}

fn run_job(
    backup_job: &Job,
    host: &Host,
    temp_dir: &Path,
    settings: &Settings,
    run_mode: RunMode,
) -> (i32, JobStats) {
    if run_mode.simulate {
        println!("simulate: sync {} {}", backup_job.hostname, backup_job.part);
        return (0, JobStats::default());
    }

    let filter_file = match &backup_job.filter {
        Some(rules) => {
            let path = temp_dir.join("filter");
            if let Err(err) = fs::write(&path, rules) {
                eprintln!("write {}: {}", path.display(), err);
                return (1, JobStats::default());
            }
            Some(path)
        }
        None => None,
    };

    let items_log = host.items_dir().join(format!("{}.txt", backup_job.part));
    let log = match OpenOptions::new().create(true).append(true).open(&items_log) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("open {}: {}", items_log.display(), err);
            return (1, JobStats::default());
        }
    };
    let log_err = match log.try_clone() {
        Ok(file) => file,
        Err(err) => {
            eprintln!("clone log handle for {}: {}", items_log.display(), err);
            return (1, JobStats::default());
        }
    };

    let mut cmd = rsync::build_sync_command(settings, host, filter_file.as_deref());
    cmd.stdout(Stdio::from(log)).stderr(Stdio::from(log_err));
    if run_mode.debug {
        println!("+ {}", describe(&cmd));
    }
    let status = match cmd.status() {
        Ok(status) => status.code().unwrap_or(1),
        Err(err) => {
            eprintln!("spawn {}: {}", settings.rsync_program, err);
            1
        }
    };
    let stats = read_stats(&items_log);
    (status, stats)
}

fn read_stats(items_log: &PathBuf) -> JobStats {
    match File::open(items_log) {
        Ok(file) => rsync::parse_stats(BufReader::new(file)),
        Err(_) => JobStats::default(),
    }
}
