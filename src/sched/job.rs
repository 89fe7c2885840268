use std::fs;
use std::path::Path;

use crate::config::model::Host;
use crate::sched::duration;
use crate::util::paths::encode_part_path;

pub const PART_FULL: &str = "full";
pub const PART_REST: &str = "rest";

#[derive(Debug, Clone)]
pub struct Job {
    pub hostname: String,
    pub part: String,
    pub filter: Option<String>,
    pub last_duration: u64,
}

/// Expands every selected host into jobs and orders the combined list
/// longest-first so the biggest transfers start as early as possible.
pub fn schedule(hosts: &[Host]) -> Vec<Job> {
    let mut jobs = Vec::new();
    for host in hosts {
        jobs.extend(expand_host_jobs(host));
    }
    jobs.sort_by(|a, b| b.last_duration.cmp(&a.last_duration));
    jobs
}

/// One `full` job unless the host has parallel-path roots and a previous
/// snapshot to enumerate them from; then one job per first-level
/// subdirectory plus a `rest` job covering everything else.
pub fn expand_host_jobs(host: &Host) -> Vec<Job> {
    let dir = host.dir();
    let latest = host.latest_link();
    if host.parallel_paths.is_empty() || !latest.exists() {
        return vec![make_job(host, &dir, PART_FULL.to_string(), None)];
    }

    let mut subpaths = Vec::new();
    for root in &host.parallel_paths {
        let rel = root.trim_matches('/');
        let root_dir = if rel.is_empty() {
            latest.clone()
        } else {
            latest.join(rel)
        };
        let Ok(entries) = fs::read_dir(&root_dir) else {
            continue;
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        for name in names {
            if rel.is_empty() {
                subpaths.push(name);
            } else {
                subpaths.push(format!("{}/{}", rel, name));
            }
        }
    }

    let mut jobs = Vec::new();
    for sub in &subpaths {
        let part = format!("part-{}", encode_part_path(sub));
        jobs.push(make_job(host, &dir, part, Some(part_filter(sub))));
    }
    let rest_filter = if subpaths.is_empty() {
        None
    } else {
        Some(rest_filter(&subpaths))
    };
    jobs.push(make_job(host, &dir, PART_REST.to_string(), rest_filter));
    jobs
}

fn make_job(host: &Host, dir: &Path, part: String, filter: Option<String>) -> Job {
    let last_duration = duration::last_duration(dir, &part);
    Job {
        hostname: host.hostname.clone(),
        part,
        filter,
        last_duration,
    }
}

/// Filter rules selecting exactly one subtree: ancestors included, the
/// subtree included recursively, siblings and the root excluded.
fn part_filter(subpath: &str) -> String {
    let comps: Vec<&str> = subpath.split('/').collect();
    let mut ancestors = Vec::new();
    let mut prefix = String::new();
    for comp in &comps[..comps.len() - 1] {
        prefix.push('/');
        prefix.push_str(comp);
        ancestors.push(prefix.clone());
    }

    let mut rules = Vec::new();
    for ancestor in &ancestors {
        rules.push(format!("+ {}/", ancestor));
    }
    rules.push(format!("+ /{}/***", subpath));
    for ancestor in ancestors.iter().rev() {
        rules.push(format!("- {}/*", ancestor));
    }
    rules.push("- /*".to_string());
    rules.join("\n") + "\n"
}

/// Filter for the `rest` job: everything except the enumerated subtrees.
fn rest_filter(subpaths: &[String]) -> String {
    let mut rules = String::new();
    for sub in subpaths {
        rules.push_str(&format!("- /{}\n", sub));
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn host_at(root: &Path, parallel_paths: Vec<String>) -> Host {
        Host {
            hostname: "h1".to_string(),
            group: String::new(),
            snapshot_root: root.to_path_buf(),
            archive_name: "snapshot".to_string(),
            exclude: String::new(),
            rotate: 3,
            host_parallel: 2,
            parallel_paths,
            weekdays: None,
            after_backup_hook: None,
            rsync_options: String::new(),
        }
    }

    #[test]
    fn host_without_parallel_paths_gets_one_full_job() {
        let dir = tempdir().expect("tempdir");
        let host = host_at(dir.path(), vec![]);
        let jobs = expand_host_jobs(&host);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].part, "full");
        assert!(jobs[0].filter.is_none());
    }

    #[test]
    fn missing_prior_snapshot_falls_back_to_full() {
        let dir = tempdir().expect("tempdir");
        let host = host_at(dir.path(), vec!["/data/".to_string()]);
        let jobs = expand_host_jobs(&host);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].part, "full");
    }

    #[test]
    fn parallel_paths_expand_to_parts_and_rest() {
        let dir = tempdir().expect("tempdir");
        let host = host_at(dir.path(), vec!["/data/".to_string()]);
        let latest = host.latest_link();
        fs::create_dir_all(latest.join("data/a")).expect("mkdir");
        fs::create_dir_all(latest.join("data/b")).expect("mkdir");
        fs::create_dir_all(latest.join("data/c")).expect("mkdir");
        // files under the root must not become jobs
        fs::write(latest.join("data/readme.txt"), "x").expect("write");

        let jobs = expand_host_jobs(&host);
        let parts: Vec<&str> = jobs.iter().map(|j| j.part.as_str()).collect();
        assert_eq!(parts, ["part-data_a", "part-data_b", "part-data_c", "rest"]);

        let filter = jobs[0].filter.as_deref().expect("filter");
        assert_eq!(filter, "+ /data/\n+ /data/a/***\n- /data/*\n- /*\n");
        let rest = jobs[3].filter.as_deref().expect("filter");
        assert_eq!(rest, "- /data/a\n- /data/b\n- /data/c\n");
    }

    #[test]
    fn missing_root_contributes_only_rest() {
        let dir = tempdir().expect("tempdir");
        let host = host_at(dir.path(), vec!["/data/".to_string(), "/srv/".to_string()]);
        let latest = host.latest_link();
        fs::create_dir_all(latest.join("data/a")).expect("mkdir");

        let jobs = expand_host_jobs(&host);
        let parts: Vec<&str> = jobs.iter().map(|j| j.part.as_str()).collect();
        assert_eq!(parts, ["part-data_a", "rest"]);
    }

    #[test]
    fn nested_root_filters_exclude_every_level() {
        assert_eq!(
            part_filter("srv/www/site1"),
            "+ /srv/\n+ /srv/www/\n+ /srv/www/site1/***\n- /srv/www/*\n- /srv/*\n- /*\n"
        );
    }

    #[test]
    fn schedule_orders_longest_first() {
        let dir = tempdir().expect("tempdir");
        let host = host_at(dir.path(), vec![]);
        duration::store_last_duration(&host.dir(), "full", 100).expect("store");
        let other = Host {
            hostname: "h2".to_string(),
            snapshot_root: PathBuf::from(dir.path()),
            ..host_at(dir.path(), vec![])
        };
        let jobs = schedule(&[other, host.clone()]);
        assert_eq!(jobs[0].hostname, "h1");
        assert_eq!(jobs[0].last_duration, 100);
        assert_eq!(jobs[1].last_duration, 0);
    }
}
