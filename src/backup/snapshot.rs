use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::warn;

use crate::config::model::Host;
use crate::error::{Result, RsnapError};
use crate::types::RunMode;
use crate::util::paths::list_entries;

/// Creates the working and items directories for a host. Called under
/// the scheduler lock when the host's first job is admitted. A partial
/// tree left by an interrupted run is reused; the next sync resumes
/// into it.
pub fn initialize_host(host: &Host, run_mode: RunMode) -> io::Result<()> {
    if run_mode.simulate {
        return Ok(());
    }
    fs::create_dir_all(host.working_dir())?;
    fs::create_dir_all(host.items_dir())?;
    Ok(())
}

/// Promotes the working directory to a dated snapshot and repoints the
/// `latest` symlinks. Returns the new snapshot path for the per-host
/// hook.
pub fn finalize(host: &Host, run_mode: RunMode) -> Result<PathBuf> {
    if run_mode.simulate {
        println!("simulate: finalize {}", host.hostname);
        return Ok(host.working_dir());
    }
    let date = Local::now().format("%Y%m%d").to_string();
    finalize_with_date(host, &date)
}

pub(crate) fn finalize_with_date(host: &Host, date: &str) -> Result<PathBuf> {
    let dir = host.dir();
    let next = next_suffix_number(host, &dir, date)?;
    let snap_name = format!("{}.{}.{:03}", host.archive_name, date, next);
    let items_name = format!("{}.items", snap_name);

    fs::rename(host.working_dir(), dir.join(&snap_name)).map_err(|e| {
        RsnapError::message(format!("rename {} -> {}: {}", host.archive_name, snap_name, e))
    })?;
    fs::rename(host.items_dir(), dir.join(&items_name)).map_err(|e| {
        RsnapError::message(format!("rename items for {}: {}", host.hostname, e))
    })?;
    replace_symlink(&host.latest_link(), &snap_name)?;
    replace_symlink(&host.items_latest_link(), &items_name)?;
    Ok(dir.join(snap_name))
}

/// Moves everything but the newest `rotate` snapshots into the
/// delete-staging directory; the cleanup pool removes them later.
pub fn rotate(host: &Host, run_mode: RunMode) -> Result<()> {
    if run_mode.simulate {
        return Ok(());
    }
    let dir = host.dir();
    let delete_dir = host.delete_dir();
    fs::create_dir_all(&delete_dir)?;

    let mut snaps: Vec<String> = list_entries(&dir)?
        .into_iter()
        .filter(|name| snapshot_suffix(name, &host.archive_name).is_some())
        .collect();
    snaps.sort();
    let keep = host.rotate.min(snaps.len());
    for name in &snaps[..snaps.len() - keep] {
        if let Err(err) = fs::rename(dir.join(name), delete_dir.join(name)) {
            warn!("rotate {} out for {}: {}", name, host.hostname, err);
            continue;
        }
        let items = format!("{}.items", name);
        if dir.join(&items).exists() {
            if let Err(err) = fs::rename(dir.join(&items), delete_dir.join(&items)) {
                warn!("rotate {} out for {}: {}", items, host.hostname, err);
            }
        }
    }
    Ok(())
}

/// Next NNN for today: one past the highest found for this date stamp,
/// so several runs on the same day stack up as .000, .001, ...
fn next_suffix_number(host: &Host, dir: &Path, date: &str) -> Result<u32> {
    let mut max: i64 = -1;
    for name in list_entries(dir)? {
        if let Some((entry_date, num)) = snapshot_suffix(&name, &host.archive_name) {
            if entry_date == date && i64::from(num) > max {
                max = i64::from(num);
            }
        }
    }
    Ok((max + 1) as u32)
}

/// Parses `<archive>.YYYYMMDD.NNN`; anything else (working dirs, items
/// trees, symlinks by name) is None.
fn snapshot_suffix<'a>(name: &'a str, archive_name: &str) -> Option<(&'a str, u32)> {
    let rest = name.strip_prefix(archive_name)?.strip_prefix('.')?;
    let (date, num) = rest.split_once('.')?;
    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if num.len() != 3 || !num.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((date, num.parse().ok()?))
}

fn replace_symlink(link: &Path, target: &str) -> Result<()> {
    match fs::symlink_metadata(link) {
        Ok(_) => fs::remove_file(link)?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    symlink(target, link)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn host_at(root: &Path) -> Host {
        Host {
            hostname: "h1".to_string(),
            group: String::new(),
            snapshot_root: root.to_path_buf(),
            archive_name: "snapshot".to_string(),
            exclude: String::new(),
            rotate: 2,
            host_parallel: 1,
            parallel_paths: Vec::new(),
            weekdays: None,
            after_backup_hook: None,
            rsync_options: String::new(),
        }
    }

    fn live() -> RunMode {
        RunMode {
            simulate: false,
            debug: false,
        }
    }

    fn prepare_working_dirs(host: &Host) {
        initialize_host(host, live()).expect("initialize");
        fs::write(host.working_dir().join("file"), "data").expect("write");
    }

    #[test]
    fn finalize_creates_dated_snapshot_and_latest_links() {
        let root = tempdir().expect("tempdir");
        let host = host_at(root.path());
        prepare_working_dirs(&host);

        let snap = finalize_with_date(&host, "20240610").expect("finalize");
        assert_eq!(snap, host.dir().join("snapshot.20240610.000"));
        assert!(snap.join("file").exists());
        assert!(!host.working_dir().exists());
        assert!(!host.items_dir().exists());
        assert_eq!(
            fs::read_link(host.latest_link()).expect("latest"),
            PathBuf::from("snapshot.20240610.000")
        );
        assert_eq!(
            fs::read_link(host.items_latest_link()).expect("items latest"),
            PathBuf::from("snapshot.20240610.000.items")
        );
    }

    #[test]
    fn same_day_runs_count_up_from_000() {
        let root = tempdir().expect("tempdir");
        let host = host_at(root.path());

        prepare_working_dirs(&host);
        finalize_with_date(&host, "20240610").expect("finalize");
        prepare_working_dirs(&host);
        let snap = finalize_with_date(&host, "20240610").expect("finalize");
        assert_eq!(snap, host.dir().join("snapshot.20240610.001"));
        assert_eq!(
            fs::read_link(host.latest_link()).expect("latest"),
            PathBuf::from("snapshot.20240610.001")
        );
    }

    #[test]
    fn a_new_day_restarts_at_000() {
        let root = tempdir().expect("tempdir");
        let host = host_at(root.path());

        prepare_working_dirs(&host);
        finalize_with_date(&host, "20240610").expect("finalize");
        prepare_working_dirs(&host);
        let snap = finalize_with_date(&host, "20240611").expect("finalize");
        assert_eq!(snap, host.dir().join("snapshot.20240611.000"));
    }

    #[test]
    fn rotation_stages_old_snapshots_for_deletion() {
        let root = tempdir().expect("tempdir");
        let host = host_at(root.path());
        let dir = host.dir();
        for name in [
            "snapshot.20240101.000",
            "snapshot.20240102.000",
            "snapshot.20240103.000",
        ] {
            fs::create_dir_all(dir.join(name)).expect("mkdir");
            fs::create_dir_all(dir.join(format!("{}.items", name))).expect("mkdir");
        }

        prepare_working_dirs(&host);
        finalize_with_date(&host, "20240604").expect("finalize");
        rotate(&host, live()).expect("rotate");

        // rotate = 2 keeps the two newest; older ones move to staging
        assert!(dir.join("snapshot.20240604.000").exists());
        assert!(dir.join("snapshot.20240103.000").exists());
        assert!(!dir.join("snapshot.20240102.000").exists());
        assert!(!dir.join("snapshot.20240101.000").exists());
        let staged = host.delete_dir();
        assert!(staged.join("snapshot.20240102.000").exists());
        assert!(staged.join("snapshot.20240101.000").exists());
        assert!(staged.join("snapshot.20240101.000.items").exists());
        assert!(dir.join("snapshot.20240103.000.items").exists());
    }

    #[test]
    fn rotate_zero_stages_everything() {
        let root = tempdir().expect("tempdir");
        let mut host = host_at(root.path());
        host.rotate = 0;
        let dir = host.dir();

        prepare_working_dirs(&host);
        finalize_with_date(&host, "20240604").expect("finalize");
        rotate(&host, live()).expect("rotate");
        assert!(!dir.join("snapshot.20240604.000").exists());
        assert!(host.delete_dir().join("snapshot.20240604.000").exists());
    }

    #[test]
    fn suffix_parser_rejects_non_snapshot_names() {
        assert_eq!(
            snapshot_suffix("snapshot.20240610.007", "snapshot"),
            Some(("20240610", 7))
        );
        assert_eq!(snapshot_suffix("snapshot", "snapshot"), None);
        assert_eq!(snapshot_suffix("snapshot.latest", "snapshot"), None);
        assert_eq!(snapshot_suffix("snapshot.20240610.000.items", "snapshot"), None);
        assert_eq!(snapshot_suffix("snapshot.2024.000", "snapshot"), None);
        assert_eq!(snapshot_suffix("other.20240610.000", "snapshot"), None);
    }

    #[test]
    fn simulate_touches_nothing() {
        let root = tempdir().expect("tempdir");
        let host = host_at(root.path());
        let run_mode = RunMode {
            simulate: true,
            debug: false,
        };
        initialize_host(&host, run_mode).expect("initialize");
        finalize(&host, run_mode).expect("finalize");
        rotate(&host, run_mode).expect("rotate");
        assert!(fs::read_dir(root.path()).expect("read").next().is_none());
    }
}
