use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use syslog::{Facility, Formatter3164};

use crate::sched::Scheduler;

const QUIT_POLL: Duration = Duration::from_millis(250);

/// Emits the interpolated phase string to the system log every
/// `interval_secs` seconds. Zero disables the emitter entirely.
pub fn run(interval_secs: u64, sched: &Arc<Scheduler>) {
    if interval_secs == 0 {
        return;
    }
    let formatter = Formatter3164 {
        facility: Facility::LOG_DAEMON,
        hostname: None,
        process: "rsnap".to_string(),
        pid: std::process::id(),
    };
    let mut logger = match syslog::unix(formatter) {
        Ok(logger) => logger,
        Err(err) => {
            eprintln!("syslog unavailable: {}", err);
            return;
        }
    };
    let interval = Duration::from_secs(interval_secs);
    let mut next = Instant::now() + interval;
    while !sched.quit_requested() {
        thread::sleep(QUIT_POLL);
        if Instant::now() >= next {
            let phase = sched.progress_snapshot().render_phase();
            if !phase.is_empty() {
                let _ = logger.info(phase);
            }
            next += interval;
        }
    }
}
