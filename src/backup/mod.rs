pub mod cleanup;
pub mod rsync;
pub mod snapshot;
pub mod worker;

use std::sync::Arc;
use std::thread;

use crate::config::model::Settings;
use crate::hooks::{self, HookContext};
use crate::sched::Scheduler;

pub const BACKUP_PHASE: &str = "Backing up (%a/%b hosts, %c/%d jobs done)";

/// Drains the job queue with a fixed pool of workers, at most one per
/// queued job.
pub fn run_backup_phase(sched: &Arc<Scheduler>, settings: &Arc<Settings>) {
    let workers = settings.threads.min(sched.jobs_total());
    let mut handles = Vec::new();
    for worker_id in 0..workers {
        let sched = Arc::clone(sched);
        let settings = Arc::clone(settings);
        handles.push(thread::spawn(move || worker::run(worker_id, sched, settings)));
    }
    for handle in handles {
        let _ = handle.join();
    }
}

/// Promotes and rotates every host that finished without errors.
/// Runs serially after all backup workers have joined, so per-host
/// counters are final.
pub fn finalize_hosts(sched: &Arc<Scheduler>, settings: &Settings) {
    for host in sched.hosts_sorted() {
        let state = sched.host_state(&host.hostname);
        if state.errors > 0 {
            println!(
                "skip finalize for {} ({} job(s) failed); working directory kept",
                host.hostname, state.errors
            );
            continue;
        }
        match snapshot::finalize(host, sched.run_mode) {
            Ok(snapshot_path) => {
                if let Some(hook) = &host.after_backup_hook {
                    let ctx = HookContext {
                        hostname: Some(&host.hostname),
                        snapshot_path: Some(&snapshot_path),
                    };
                    if let Some(template) = &hook.progress {
                        sched.set_phase(&hooks::substitute(template, &ctx));
                    }
                    hooks::run_hook(hook, &ctx, settings, sched.run_mode);
                    sched.set_phase(BACKUP_PHASE);
                }
                if let Err(err) = snapshot::rotate(host, sched.run_mode) {
                    eprintln!("rotate {}: {}", host.hostname, err);
                }
            }
            Err(err) => eprintln!("finalize {}: {}", host.hostname, err),
        }
    }
}
