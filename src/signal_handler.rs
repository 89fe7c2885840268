use std::path::PathBuf;
use std::sync::Arc;
use std::{fs, thread};
use std::time::Duration;

use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};

use crate::sched::Scheduler;

/// Teardown on interrupt: flag the helpers to quit, give them one poll
/// interval to notice, drop the lockfile and fifo, exit non-zero.
/// In-flight sync subprocesses are left to the terminal group.
pub fn install(sched: &Arc<Scheduler>, lockfile: Option<PathBuf>, fifo: Option<PathBuf>) {
    let sched = Arc::clone(sched);
    thread::spawn(move || {
        let mut signals = match Signals::new([SIGINT, SIGTERM]) {
            Ok(signals) => signals,
            Err(err) => {
                eprintln!("signal handler setup failed: {}", err);
                return;
            }
        };
        if signals.forever().next().is_some() {
            sched.request_quit();
            thread::sleep(Duration::from_millis(600));
            if let Some(path) = lockfile {
                let _ = fs::remove_file(path);
            }
            if let Some(path) = fifo {
                let _ = fs::remove_file(path);
            }
            std::process::exit(1);
        }
    });
}
