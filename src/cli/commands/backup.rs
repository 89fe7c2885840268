use std::fs::{self, File};
use std::sync::Arc;
use std::thread;

use chrono::{Datelike, Local};

use crate::backup::{self, cleanup};
use crate::cli::args::Cli;
use crate::config::load::{apply_override, load_config, resolve_settings, select_hosts};
use crate::config::model::Settings;
use crate::error::{Result, RsnapError};
use crate::hooks::{self, HookContext};
use crate::lockfile::{self, LockGuard};
use crate::progress::{ipc, syslog};
use crate::report::{self, mail};
use crate::sched::job::schedule;
use crate::sched::Scheduler;
use crate::signal_handler;
use crate::types::RunMode;

/// The whole run: lock, schedule, helpers, backup pool, finalize,
/// report, cleanup pool, teardown.
pub fn run_backup_command(cli: &Cli) -> Result<()> {
    let run_mode = RunMode {
        simulate: cli.simulate,
        debug: cli.debug,
    };
    let mut config = load_config(&cli.config)?;
    for expr in &cli.overrides {
        apply_override(&mut config, expr)?;
    }
    let settings = Arc::new(resolve_settings(&config));

    let today = Local::now().weekday().num_days_from_sunday() as u8;
    let hosts = select_hosts(&config, &cli.hostnames, &cli.groups, cli.all, today)?;
    let jobs = schedule(&hosts);
    println!(
        "{}  backing up {} host(s), {} job(s)",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        hosts.len(),
        jobs.len()
    );

    let mut lock_guard = None;
    if !run_mode.simulate && !cli.force {
        match lockfile::acquire(&settings.lockfile) {
            Ok(true) => lock_guard = Some(LockGuard::new(settings.lockfile.clone())),
            Ok(false) => {
                if cli.all {
                    send_lock_alert(&settings);
                }
                return Err(RsnapError::message(format!(
                    "{} is held by a running instance",
                    settings.lockfile.display()
                )));
            }
            Err(err) => {
                return Err(RsnapError::message(format!(
                    "failed to lock {}: {}",
                    settings.lockfile.display(),
                    err
                )));
            }
        }
    }

    let workers = settings.threads.min(jobs.len());
    let sched = Arc::new(Scheduler::new(hosts, jobs, workers, run_mode));
    let fifo_enabled = !cli.force && !run_mode.simulate;

    signal_handler::install(
        &sched,
        lock_guard.as_ref().map(|_| settings.lockfile.clone()),
        fifo_enabled.then(|| settings.fifo.clone()),
    );

    let mut helpers = Vec::new();
    if fifo_enabled {
        let sched = Arc::clone(&sched);
        let fifo = settings.fifo.clone();
        helpers.push(thread::spawn(move || ipc::serve(&fifo, &sched)));
    }
    {
        let sched = Arc::clone(&sched);
        let interval = settings.log_interval;
        helpers.push(thread::spawn(move || syslog::run(interval, &sched)));
    }

    sched.set_phase(backup::BACKUP_PHASE);
    backup::run_backup_phase(&sched, &settings);
    backup::finalize_hosts(&sched, &settings);

    deliver_report(&sched, &settings, run_mode);

    if let Some(hook) = &settings.after_all_backup_hook {
        hooks::run_hook(hook, &HookContext::default(), &settings, run_mode);
    }

    if !cli.no_cleanup {
        cleanup::run_cleanup_phase(&sched, &settings);
        if let Some(hook) = &settings.after_all_cleanup_hook {
            hooks::run_hook(hook, &HookContext::default(), &settings, run_mode);
        }
    }

    if !run_mode.simulate {
        if let Some(okfile) = &settings.okfile {
            if let Err(err) = File::create(okfile) {
                eprintln!("okfile {}: {}", okfile.display(), err);
            }
        }
    }

    sched.request_quit();
    for helper in helpers {
        let _ = helper.join();
    }
    if fifo_enabled {
        let _ = fs::remove_file(&settings.fifo);
    }
    drop(lock_guard);
    println!("{}  done", Local::now().format("%Y-%m-%d %H:%M:%S"));
    Ok(())
}

fn deliver_report(sched: &Arc<Scheduler>, settings: &Settings, run_mode: RunMode) {
    let hosts = sched.hosts_sorted();
    let states = sched.host_states_snapshot();
    let report_text = report::build_report(&hosts, &states);

    if run_mode.simulate {
        print!("{}", report_text);
        return;
    }
    if let Some(dir) = &settings.reports_dir {
        if dir.is_dir() {
            let path = dir.join(format!(
                "rsnap.{}.txt",
                Local::now().format("%Y%m%d-%H%M%S")
            ));
            if let Err(err) = fs::write(&path, &report_text) {
                eprintln!("report {}: {}", path.display(), err);
            }
        }
    }
    if let Some(to) = &settings.email_to {
        let subject = settings
            .email_subject
            .clone()
            .unwrap_or_else(|| "rsnap report".to_string());
        if let Err(err) = mail::send(
            settings,
            settings.email_from.as_deref(),
            to,
            &subject,
            &report_text,
        ) {
            eprintln!("report mail to {}: {}", to, err);
        }
    }
}


fn send_lock_alert(settings: &Settings) {
    let Some(to) = &settings.email_to else {
        return;
    };
    let body = format!(
        "rsnap --all was requested but {} is held by a running instance;\nno backups were started.\n",
        settings.lockfile.display()
    );
    if let Err(err) = mail::send(
        settings,
        settings.email_from.as_deref(),
        to,
        "rsnap: skipped, already running",
        &body,
    ) {
        eprintln!("alert mail to {}: {}", to, err);
    }
}
