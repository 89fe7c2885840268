use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::model::{Config, Host, HostConfig, Settings, SettingsConfig};
use crate::error::{ConfigError, Result, RsnapError};
use crate::util::paths::is_safe_name;

const DEFAULT_THREADS: usize = 4;
const DEFAULT_CLEANUP_THREADS: usize = 2;
const DEFAULT_HOST_PARALLEL: usize = 1;
const DEFAULT_ROTATE: usize = 7;
const DEFAULT_LOG_INTERVAL: u64 = 300;
const DEFAULT_SNAPSHOT_ROOT: &str = "/backup";
const DEFAULT_ARCHIVE_NAME: &str = "snapshot";
const DEFAULT_TEMP_DIR: &str = "/tmp";
const DEFAULT_LOCKFILE: &str = "/var/run/rsnap.lock";
const DEFAULT_FIFO: &str = "/var/run/rsnap.fifo";
const DEFAULT_RSH_PROGRAM: &str = "ssh";
const DEFAULT_RSYNC_PROGRAM: &str = "rsync";
const DEFAULT_RM_PROGRAM: &str = "rm";
const DEFAULT_SENDMAIL_PROGRAM: &str = "/usr/sbin/sendmail";

pub fn load_config(path: &Path) -> Result<Config> {
    let mut contents = String::new();
    File::open(path)
        .map_err(|e| RsnapError::message(format!("open {}: {}", path.display(), e)))?
        .read_to_string(&mut contents)
        .map_err(RsnapError::Io)?;
    let cfg: Config =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
    for name in cfg.hosts.keys() {
        if !is_safe_name(name) {
            return Err(ConfigError::Invalid(format!(
                "host {} must use only letters, digits, '.', '-', '_'",
                name
            ))
            .into());
        }
    }
    Ok(cfg)
}

/// Applies one `-o key=value` override on top of the parsed config.
pub fn apply_override(cfg: &mut Config, expr: &str) -> Result<()> {
    let Some((key, value)) = expr.split_once('=') else {
        return Err(ConfigError::Invalid(format!("override {} is not KEY=VALUE", expr)).into());
    };
    let s = &mut cfg.settings;
    match key {
        "threads" => s.threads = Some(parse_value(key, value)?),
        "cleanup_threads" => s.cleanup_threads = Some(parse_value(key, value)?),
        "host_parallel" => s.host_parallel = Some(parse_value(key, value)?),
        "rotate" => s.rotate = Some(parse_value(key, value)?),
        "log_interval" => s.log_interval = Some(parse_value(key, value)?),
        "snapshot_root" => s.snapshot_root = Some(PathBuf::from(value)),
        "archive_name" => s.archive_name = Some(value.to_string()),
        "temp_dir" => s.temp_dir = Some(PathBuf::from(value)),
        "reports_dir" => s.reports_dir = Some(PathBuf::from(value)),
        "lockfile" => s.lockfile = Some(PathBuf::from(value)),
        "fifo" => s.fifo = Some(PathBuf::from(value)),
        "okfile" => s.okfile = Some(PathBuf::from(value)),
        "rsh_program" => s.rsh_program = Some(value.to_string()),
        "rsync_program" => s.rsync_program = Some(value.to_string()),
        "rsync_options" => s.rsync_options = Some(value.to_string()),
        "rm_program" => s.rm_program = Some(value.to_string()),
        "sendmail_program" => s.sendmail_program = Some(value.to_string()),
        "exclude" => s.exclude = Some(value.to_string()),
        "email_from" => s.email_from = Some(value.to_string()),
        "email_to" => s.email_to = Some(value.to_string()),
        "email_subject" => s.email_subject = Some(value.to_string()),
        _ => {
            return Err(ConfigError::Invalid(format!("unknown config key {}", key)).into());
        }
    }
    Ok(())
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("invalid value for {}: {}", key, value)).into())
}

pub fn resolve_settings(cfg: &Config) -> Settings {
    let s = &cfg.settings;
    Settings {
        threads: s.threads.unwrap_or(DEFAULT_THREADS).max(1),
        cleanup_threads: s.cleanup_threads.unwrap_or(DEFAULT_CLEANUP_THREADS).max(1),
        log_interval: s.log_interval.unwrap_or(DEFAULT_LOG_INTERVAL),
        temp_dir: s
            .temp_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMP_DIR)),
        reports_dir: s.reports_dir.clone(),
        lockfile: s
            .lockfile
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCKFILE)),
        fifo: s.fifo.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_FIFO)),
        okfile: s.okfile.clone(),
        rsh_program: s
            .rsh_program
            .clone()
            .unwrap_or_else(|| DEFAULT_RSH_PROGRAM.to_string()),
        rsync_program: s
            .rsync_program
            .clone()
            .unwrap_or_else(|| DEFAULT_RSYNC_PROGRAM.to_string()),
        rm_program: s
            .rm_program
            .clone()
            .unwrap_or_else(|| DEFAULT_RM_PROGRAM.to_string()),
        sendmail_program: s
            .sendmail_program
            .clone()
            .unwrap_or_else(|| DEFAULT_SENDMAIL_PROGRAM.to_string()),
        email_from: s.email_from.clone(),
        email_to: s.email_to.clone(),
        email_subject: s.email_subject.clone(),
        after_all_backup_hook: s.after_all_backup_hook.clone(),
        during_all_cleanup_hook: s.during_all_cleanup_hook.clone(),
        after_all_cleanup_hook: s.after_all_cleanup_hook.clone(),
    }
}

fn resolve_host(name: &str, hc: &HostConfig, s: &SettingsConfig) -> Result<Host> {
    let weekdays = match &hc.weekdays {
        Some(days) => {
            let mut set = HashSet::new();
            for day in days {
                if *day > 6 {
                    return Err(ConfigError::Invalid(format!(
                        "host {}: weekday {} out of range 0-6",
                        name, day
                    ))
                    .into());
                }
                set.insert(*day);
            }
            Some(set)
        }
        None => None,
    };
    Ok(Host {
        hostname: name.to_string(),
        group: hc.group.clone().unwrap_or_default(),
        snapshot_root: hc
            .snapshot_root
            .clone()
            .or_else(|| s.snapshot_root.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_ROOT)),
        archive_name: hc
            .archive_name
            .clone()
            .or_else(|| s.archive_name.clone())
            .unwrap_or_else(|| DEFAULT_ARCHIVE_NAME.to_string()),
        exclude: hc
            .exclude
            .clone()
            .or_else(|| s.exclude.clone())
            .unwrap_or_default(),
        rotate: hc.rotate.or(s.rotate).unwrap_or(DEFAULT_ROTATE),
        host_parallel: hc
            .host_parallel
            .or(s.host_parallel)
            .unwrap_or(DEFAULT_HOST_PARALLEL)
            .max(1),
        parallel_paths: hc.parallel_paths.clone().unwrap_or_default(),
        weekdays,
        after_backup_hook: hc
            .after_host_backup_hook
            .clone()
            .or_else(|| s.after_host_backup_hook.clone()),
        rsync_options: hc
            .rsync_options
            .clone()
            .or_else(|| s.rsync_options.clone())
            .unwrap_or_default(),
    })
}

/// Applies the CLI selector and weekday filters, then merges defaults into
/// one resolved record per selected host, ordered by (group, hostname).
pub fn select_hosts(
    cfg: &Config,
    hostnames: &[String],
    groups: &[String],
    all: bool,
    today: u8,
) -> Result<Vec<Host>> {
    let mut all = all;
    if all && (!hostnames.is_empty() || !groups.is_empty()) {
        println!("--all ignored; explicit host or group selection wins");
        all = false;
    }
    for name in hostnames {
        if !cfg.hosts.contains_key(name) {
            return Err(ConfigError::Invalid(format!("unknown host {}", name)).into());
        }
    }
    let explicit: HashSet<&str> = hostnames.iter().map(String::as_str).collect();
    let wanted_groups: HashSet<&str> = groups.iter().map(String::as_str).collect();

    let mut selected = Vec::new();
    for (name, hc) in &cfg.hosts {
        let in_group = hc
            .group
            .as_deref()
            .is_some_and(|g| wanted_groups.contains(g));
        if !(all || explicit.contains(name.as_str()) || in_group) {
            continue;
        }
        let host = resolve_host(name, hc, &cfg.settings)?;
        if let Some(days) = &host.weekdays {
            if !days.contains(&today) {
                continue;
            }
        }
        selected.push(host);
    }
    if selected.is_empty() {
        return Err(ConfigError::Invalid("no hosts selected".to_string()).into());
    }
    selected.sort_by(|a, b| (&a.group, &a.hostname).cmp(&(&b.group, &b.hostname)));
    Ok(selected)
}
