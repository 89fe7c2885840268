pub mod duration;
pub mod job;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::backup::snapshot;
use crate::config::model::Host;
use crate::progress::Progress;
use crate::sched::job::Job;
use crate::types::RunMode;

/// Sync subprocess statuses that do not count as failures: 23 is a
/// partial transfer, 24 means source files vanished mid-run.
pub const TOLERATED_STATUSES: [i32; 3] = [0, 23, 24];

#[derive(Debug, Clone, Default)]
pub struct HostState {
    pub jobs: usize,
    pub jobs_done: usize,
    pub in_progress: usize,
    pub initialized: bool,
    pub errors: usize,
    pub error_messages: Vec<String>,
    pub files_total: u64,
    pub files_sent: u64,
    pub mb_total: u64,
    pub mb_sent: u64,
    pub duration: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JobStats {
    pub files_total: u64,
    pub files_sent: u64,
    pub mb_total: u64,
    pub mb_sent: u64,
}

struct State {
    queue: Vec<Job>,
    host_states: HashMap<String, HostState>,
    cleanup_dirs: Vec<PathBuf>,
    progress: Progress,
}

/// Shared scheduling state. Everything mutable lives behind one mutex;
/// the host table is immutable after construction and the quit flag is
/// an atomic so helper threads never touch the lock to poll it.
pub struct Scheduler {
    pub hosts: HashMap<String, Host>,
    pub host_order: Vec<String>,
    pub run_mode: RunMode,
    pub quit: AtomicBool,
    pub started_at: DateTime<Local>,
    pub started: Instant,
    state: Mutex<State>,
}

impl Scheduler {
    pub fn new(hosts: Vec<Host>, jobs: Vec<Job>, workers: usize, run_mode: RunMode) -> Self {
        let host_order: Vec<String> = hosts.iter().map(|h| h.hostname.clone()).collect();
        let mut host_states: HashMap<String, HostState> = hosts
            .iter()
            .map(|h| (h.hostname.clone(), HostState::default()))
            .collect();
        for job in &jobs {
            if let Some(hs) = host_states.get_mut(&job.hostname) {
                hs.jobs += 1;
            }
        }
        let progress = Progress::new(hosts.len(), jobs.len(), workers);
        Scheduler {
            hosts: hosts.into_iter().map(|h| (h.hostname.clone(), h)).collect(),
            host_order,
            run_mode,
            quit: AtomicBool::new(false),
            started_at: Local::now(),
            started: Instant::now(),
            state: Mutex::new(State {
                queue: jobs,
                host_states,
                cleanup_dirs: Vec::new(),
                progress,
            }),
        }
    }

    /// Hands out the next job whose host is below its parallelism cap, or
    /// None when no queued job is admissible. Even workers scan from the
    /// head (the longest job), odd workers from the tail, so two large
    /// jobs start concurrently instead of two workers piling onto the
    /// same host's capacity. The host's directories are initialized
    /// inline on first admission, still under the lock.
    pub fn next_job(&self, worker_id: usize) -> Option<Job> {
        let mut guard = self.state.lock().unwrap();
        let st = &mut *guard;
        let len = st.queue.len();
        let indices: Box<dyn Iterator<Item = usize>> = if worker_id % 2 == 0 {
            Box::new(0..len)
        } else {
            Box::new((0..len).rev())
        };
        for idx in indices {
            let hostname = st.queue[idx].hostname.clone();
            let Some(host) = self.hosts.get(&hostname) else {
                continue;
            };
            let Some(hs) = st.host_states.get_mut(&hostname) else {
                continue;
            };
            if hs.in_progress >= host.host_parallel {
                continue;
            }
            let backup_job = st.queue.remove(idx);
            hs.in_progress += 1;
            if !hs.initialized {
                if let Err(err) = snapshot::initialize_host(host, self.run_mode) {
                    warn!("initialize {}: {}", hostname, err);
                }
                hs.initialized = true;
            }
            if let Some(worker) = st.progress.workers.get_mut(worker_id) {
                worker.state = format!("{} {}", backup_job.hostname, backup_job.part);
                worker.started = Some(Instant::now());
            }
            debug!(
                "worker {} takes {} {} (est {}s)",
                worker_id, backup_job.hostname, backup_job.part, backup_job.last_duration
            );
            return Some(backup_job);
        }
        None
    }

    /// Folds one finished job back into the host and progress counters.
    /// Tolerated statuses update the duration memo; anything else is
    /// recorded as a host error and the memo is left alone.
    pub fn job_done(&self, backup_job: &Job, duration_secs: u64, status: i32, stats: JobStats) {
        let mut guard = self.state.lock().unwrap();
        let st = &mut *guard;
        if let Some(hs) = st.host_states.get_mut(&backup_job.hostname) {
            hs.in_progress = hs.in_progress.saturating_sub(1);
            hs.files_total += stats.files_total;
            hs.files_sent += stats.files_sent;
            hs.mb_total += stats.mb_total;
            hs.mb_sent += stats.mb_sent;
            hs.duration += duration_secs;
            hs.jobs_done += 1;
            if hs.jobs_done == hs.jobs {
                st.progress.hosts_done += 1;
            }
            if TOLERATED_STATUSES.contains(&status) {
                if !self.run_mode.simulate {
                    if let Some(host) = self.hosts.get(&backup_job.hostname) {
                        if let Err(err) = duration::store_last_duration(
                            &host.dir(),
                            &backup_job.part,
                            duration_secs,
                        ) {
                            warn!("store duration for {} {}: {}", backup_job.hostname, backup_job.part, err);
                        }
                    }
                }
            } else {
                hs.errors += 1;
                hs.error_messages
                    .push(format!("{}: sync exited with status {}", backup_job.part, status));
            }
        }
        st.progress.jobs_done += 1;
    }

    pub fn set_worker_idle(&self, worker_id: usize, last: u64) {
        let mut st = self.state.lock().unwrap();
        if let Some(worker) = st.progress.workers.get_mut(worker_id) {
            worker.state = "idle".to_string();
            worker.started = None;
            worker.last = last;
        }
    }

    pub fn set_phase(&self, template: &str) {
        let mut st = self.state.lock().unwrap();
        st.progress.phase = template.to_string();
    }

    /// Switches the progress record over to the cleanup phase: the host
    /// counters are reused to track cleanup directories.
    pub fn begin_cleanup(&self, dirs: Vec<PathBuf>, phase: &str) {
        let mut st = self.state.lock().unwrap();
        st.progress.phase = phase.to_string();
        st.progress.hosts_total = dirs.len();
        st.progress.hosts_done = 0;
        st.cleanup_dirs = dirs;
    }

    pub fn next_cleanup_dir(&self) -> Option<PathBuf> {
        let mut st = self.state.lock().unwrap();
        if st.cleanup_dirs.is_empty() {
            None
        } else {
            Some(st.cleanup_dirs.remove(0))
        }
    }

    pub fn cleanup_dir_done(&self) {
        let mut st = self.state.lock().unwrap();
        st.progress.hosts_done += 1;
    }

    pub fn host_state(&self, hostname: &str) -> HostState {
        let st = self.state.lock().unwrap();
        st.host_states.get(hostname).cloned().unwrap_or_default()
    }

    pub fn host_states_snapshot(&self) -> HashMap<String, HostState> {
        self.state.lock().unwrap().host_states.clone()
    }

    pub fn progress_snapshot(&self) -> Progress {
        self.state.lock().unwrap().progress.clone()
    }

    pub fn jobs_total(&self) -> usize {
        self.state.lock().unwrap().progress.jobs_total
    }

    /// Hosts in the scheduling order: (group, hostname).
    pub fn hosts_sorted(&self) -> Vec<&Host> {
        self.host_order
            .iter()
            .filter_map(|name| self.hosts.get(name))
            .collect()
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }

    pub fn request_quit(&self) {
        self.quit.store(true, Ordering::SeqCst);
    }
}
