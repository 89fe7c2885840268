use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(flatten)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub hosts: BTreeMap<String, HostConfig>,
}

/// Global keys; every field optional so per-host overrides and `-o` can
/// layer on top of the built-in defaults.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SettingsConfig {
    pub threads: Option<usize>,
    pub cleanup_threads: Option<usize>,
    pub host_parallel: Option<usize>,
    pub rotate: Option<usize>,
    pub log_interval: Option<u64>,
    pub snapshot_root: Option<PathBuf>,
    pub archive_name: Option<String>,
    pub temp_dir: Option<PathBuf>,
    pub reports_dir: Option<PathBuf>,
    pub lockfile: Option<PathBuf>,
    pub fifo: Option<PathBuf>,
    pub okfile: Option<PathBuf>,
    pub rsh_program: Option<String>,
    pub rsync_program: Option<String>,
    pub rsync_options: Option<String>,
    pub rm_program: Option<String>,
    pub sendmail_program: Option<String>,
    pub exclude: Option<String>,
    pub email_from: Option<String>,
    pub email_to: Option<String>,
    pub email_subject: Option<String>,
    pub after_host_backup_hook: Option<HookConfig>,
    pub after_all_backup_hook: Option<HookConfig>,
    pub during_all_cleanup_hook: Option<HookConfig>,
    pub after_all_cleanup_hook: Option<HookConfig>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct HostConfig {
    pub group: Option<String>,
    pub weekdays: Option<Vec<u8>>,
    pub parallel_paths: Option<Vec<String>>,
    pub snapshot_root: Option<PathBuf>,
    pub archive_name: Option<String>,
    pub exclude: Option<String>,
    pub rotate: Option<usize>,
    pub host_parallel: Option<usize>,
    pub rsync_options: Option<String>,
    pub after_host_backup_hook: Option<HookConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HookConfig {
    pub command: String,
    #[serde(default)]
    pub progress: Option<String>,
    #[serde(default)]
    pub email_from: Option<String>,
    #[serde(default)]
    pub email_to: Option<String>,
    #[serde(default)]
    pub email_subject: Option<String>,
}

/// Resolved global settings, after defaults and `-o` overrides.
#[derive(Debug, Clone)]
pub struct Settings {
    pub threads: usize,
    pub cleanup_threads: usize,
    pub log_interval: u64,
    pub temp_dir: PathBuf,
    pub reports_dir: Option<PathBuf>,
    pub lockfile: PathBuf,
    pub fifo: PathBuf,
    pub okfile: Option<PathBuf>,
    pub rsh_program: String,
    pub rsync_program: String,
    pub rm_program: String,
    pub sendmail_program: String,
    pub email_from: Option<String>,
    pub email_to: Option<String>,
    pub email_subject: Option<String>,
    pub after_all_backup_hook: Option<HookConfig>,
    pub during_all_cleanup_hook: Option<HookConfig>,
    pub after_all_cleanup_hook: Option<HookConfig>,
}

/// One backup target with its effective per-host settings.
#[derive(Debug, Clone)]
pub struct Host {
    pub hostname: String,
    pub group: String,
    pub snapshot_root: PathBuf,
    pub archive_name: String,
    pub exclude: String,
    pub rotate: usize,
    pub host_parallel: usize,
    pub parallel_paths: Vec<String>,
    pub weekdays: Option<HashSet<u8>>,
    pub after_backup_hook: Option<HookConfig>,
    pub rsync_options: String,
}

impl Host {
    pub fn dir(&self) -> PathBuf {
        let mut dir = self.snapshot_root.clone();
        if !self.group.is_empty() {
            dir.push(&self.group);
        }
        dir.push(&self.hostname);
        dir
    }

    /// The in-progress working directory; exists only while a backup runs.
    pub fn working_dir(&self) -> PathBuf {
        self.dir().join(&self.archive_name)
    }

    pub fn items_dir(&self) -> PathBuf {
        self.dir().join(format!("{}.items", self.archive_name))
    }

    pub fn latest_link(&self) -> PathBuf {
        self.dir().join(format!("{}.latest", self.archive_name))
    }

    pub fn items_latest_link(&self) -> PathBuf {
        self.dir().join(format!("{}.items.latest", self.archive_name))
    }

    pub fn delete_dir(&self) -> PathBuf {
        self.dir().join(format!("{}.delete", self.archive_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(group: &str) -> Host {
        Host {
            hostname: "h1".to_string(),
            group: group.to_string(),
            snapshot_root: PathBuf::from("/backup"),
            archive_name: "snapshot".to_string(),
            exclude: String::new(),
            rotate: 3,
            host_parallel: 1,
            parallel_paths: Vec::new(),
            weekdays: None,
            after_backup_hook: None,
            rsync_options: String::new(),
        }
    }

    #[test]
    fn dir_includes_group_when_set() {
        assert_eq!(host("web").dir(), PathBuf::from("/backup/web/h1"));
        assert_eq!(host("").dir(), PathBuf::from("/backup/h1"));
    }

    #[test]
    fn derived_paths_use_archive_name() {
        let h = host("");
        assert_eq!(h.working_dir(), PathBuf::from("/backup/h1/snapshot"));
        assert_eq!(h.latest_link(), PathBuf::from("/backup/h1/snapshot.latest"));
        assert_eq!(h.items_dir(), PathBuf::from("/backup/h1/snapshot.items"));
        assert_eq!(h.delete_dir(), PathBuf::from("/backup/h1/snapshot.delete"));
    }
}
