use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::AsFd;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tracing::debug;

use crate::error::{Result, RsnapError};
use crate::progress::format_report;
use crate::sched::Scheduler;

const POLL_INTERVAL_MS: u16 = 500;

/// Serves progress queries over the named pipe until quit is flagged.
/// The pipe is held open read+write so writers never see it closed; a
/// 0.5 s poll keeps the quit flag honored. Protocol: newline-delimited
/// `progress <reply-fifo-path>`; anything else is ignored.
pub fn serve(fifo: &Path, sched: &Arc<Scheduler>) {
    if let Err(err) = serve_inner(fifo, sched) {
        eprintln!("fifo {}: {}", fifo.display(), err);
    }
}

fn serve_inner(fifo: &Path, sched: &Arc<Scheduler>) -> Result<()> {
    let _ = fs::remove_file(fifo);
    mkfifo(fifo, Mode::from_bits_truncate(0o777))
        .map_err(|e| RsnapError::message(format!("mkfifo {}: {}", fifo.display(), e)))?;
    // umask applies to mkfifo
    let _ = fs::set_permissions(fifo, fs::Permissions::from_mode(0o777));

    let mut pipe = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(fifo)?;
    let mut pending = String::new();
    let mut buf = [0u8; 1024];
    while !sched.quit_requested() {
        let readable = {
            let mut fds = [PollFd::new(pipe.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, PollTimeout::from(POLL_INTERVAL_MS)) {
                Ok(0) => false,
                Ok(_) => true,
                Err(nix::errno::Errno::EINTR) => false,
                Err(err) => return Err(RsnapError::message(format!("poll: {}", err))),
            }
        };
        if !readable {
            continue;
        }
        let n = match pipe.read(&mut buf) {
            Ok(0) => continue,
            Ok(n) => n,
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(err) => return Err(err.into()),
        };
        pending.push_str(&String::from_utf8_lossy(&buf[..n]));
        while let Some(pos) = pending.find('\n') {
            let line = pending[..pos].trim().to_string();
            pending.drain(..=pos);
            handle_command(&line, sched);
        }
    }
    let _ = fs::remove_file(fifo);
    Ok(())
}

fn handle_command(line: &str, sched: &Arc<Scheduler>) {
    let mut words = line.split_whitespace();
    match words.next() {
        Some("progress") => {
            let Some(reply_path) = words.next() else {
                return;
            };
            let report = format_report(&sched.progress_snapshot(), sched.started_at, sched.started);
            let reply_path = PathBuf::from(reply_path);
            // the open blocks until the querier reads; don't stall the
            // command loop on a vanished client
            thread::spawn(move || {
                if let Err(err) = fs::write(&reply_path, report) {
                    eprintln!("progress reply {}: {}", reply_path.display(), err);
                }
            });
        }
        _ => debug!("ignoring fifo command {:?}", line),
    }
}

/// The `--progress` client: asks a running instance for a report over
/// its fifo and returns the reply text.
pub fn query(fifo: &Path, temp_dir: &Path) -> Result<String> {
    if !fifo.exists() {
        return Err(RsnapError::message(format!(
            "no running instance ({} missing)",
            fifo.display()
        )));
    }
    let reply_path = temp_dir.join(format!("rsnap.progress.{}", std::process::id()));
    let _ = fs::remove_file(&reply_path);
    mkfifo(&reply_path, Mode::from_bits_truncate(0o600))
        .map_err(|e| RsnapError::message(format!("mkfifo {}: {}", reply_path.display(), e)))?;

    let result = (|| {
        let mut request = OpenOptions::new().write(true).open(fifo)?;
        writeln!(request, "progress {}", reply_path.display())?;
        drop(request);
        let mut reply = String::new();
        File::open(&reply_path)?.read_to_string(&mut reply)?;
        Ok(reply)
    })();
    let _ = fs::remove_file(&reply_path);
    result
}
