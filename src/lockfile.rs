use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Removes the lockfile on drop when this process still owns it.
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    pub fn new(path: PathBuf) -> Self {
        LockGuard { path }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = release(&self.path);
    }
}

/// Single-instance guard: creates the pidfile atomically. A lockfile
/// whose owner is gone is taken over; a live owner returns Ok(false).
pub fn acquire(path: &Path) -> io::Result<bool> {
    for _ in 0..3 {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                return Ok(true);
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                let pid = match fs::read_to_string(path) {
                    Ok(text) => text.trim().parse::<u32>().ok(),
                    Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                    Err(err) => return Err(err),
                };
                if let Some(pid) = pid {
                    if Path::new("/proc").join(pid.to_string()).exists() {
                        return Ok(false);
                    }
                }
                match fs::remove_file(path) {
                    Ok(()) => continue,
                    Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                    Err(err) => return Err(err),
                }
            }
            Err(err) => return Err(err),
        }
    }
    Ok(false)
}

pub fn release(path: &Path) -> io::Result<()> {
    if let Ok(text) = fs::read_to_string(path) {
        if text.trim() == std::process::id().to_string() {
            let _ = fs::remove_file(path);
        }
    }
    Ok(())
}
