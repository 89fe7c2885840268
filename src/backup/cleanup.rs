use std::process::Command;
use std::sync::Arc;
use std::thread;

use crate::config::model::Settings;
use crate::hooks::{self, HookContext};
use crate::sched::Scheduler;
use crate::util::command::run_command;

pub const CLEANUP_PHASE: &str = "Cleaning up (done %a/%b hosts)";

/// Removes every host's delete-staging directory with a second, smaller
/// worker pool. Runs strictly after finalize and the report.
pub fn run_cleanup_phase(sched: &Arc<Scheduler>, settings: &Arc<Settings>) {
    let dirs: Vec<_> = sched.hosts_sorted().iter().map(|h| h.delete_dir()).collect();
    if dirs.is_empty() {
        return;
    }
    let workers = settings.cleanup_threads.min(dirs.len());
    sched.begin_cleanup(dirs, CLEANUP_PHASE);

    let mut handles = Vec::new();
    for _ in 0..workers {
        let sched = Arc::clone(sched);
        let settings = Arc::clone(settings);
        handles.push(thread::spawn(move || {
            while let Some(dir) = sched.next_cleanup_dir() {
                let mut cmd = Command::new(&settings.rm_program);
                cmd.arg("-rf").arg(&dir);
                if let Err(err) = run_command(&mut cmd, sched.run_mode) {
                    eprintln!("cleanup {}: {}", dir.display(), err);
                }
                sched.cleanup_dir_done();
            }
        }));
    }

    if let Some(hook) = &settings.during_all_cleanup_hook {
        hooks::run_hook(hook, &HookContext::default(), settings, sched.run_mode);
    }

    for handle in handles {
        let _ = handle.join();
    }
}
