use std::path::Path;
use std::process::Command;

use crate::config::model::{HookConfig, Settings};
use crate::report::mail;
use crate::types::RunMode;

#[derive(Debug, Clone, Copy, Default)]
pub struct HookContext<'a> {
    pub hostname: Option<&'a str>,
    pub snapshot_path: Option<&'a Path>,
}

/// Expands `%h` (hostname) and `%p` (snapshot path) where applicable.
pub fn substitute(template: &str, ctx: &HookContext) -> String {
    let mut out = template.to_string();
    if let Some(hostname) = ctx.hostname {
        out = out.replace("%h", hostname);
    }
    if let Some(path) = ctx.snapshot_path {
        out = out.replace("%p", &path.to_string_lossy());
    }
    out
}

/// Runs one configured hook through the shell. Failures are reported on
/// stderr and never propagate; when the hook carries an email target its
/// output is mailed there.
pub fn run_hook(hook: &HookConfig, ctx: &HookContext, settings: &Settings, run_mode: RunMode) {
    let command = substitute(&hook.command, ctx);
    if run_mode.simulate {
        println!("simulate: hook {}", command);
        return;
    }
    if run_mode.debug {
        println!("+ {}", command);
    }
    let output = match Command::new("/bin/sh").arg("-c").arg(&command).output() {
        Ok(output) => output,
        Err(err) => {
            eprintln!("hook `{}`: {}", command, err);
            return;
        }
    };
    if !output.status.success() {
        eprintln!(
            "hook `{}` exited with status {}",
            command,
            output.status.code().unwrap_or(1)
        );
    }
    if let Some(to) = &hook.email_to {
        let subject = hook
            .email_subject
            .as_deref()
            .map(|s| substitute(s, ctx))
            .unwrap_or_else(|| format!("rsnap hook: {}", command));
        let from = hook.email_from.as_deref().or(settings.email_from.as_deref());
        let mut body = String::from_utf8_lossy(&output.stdout).to_string();
        body.push_str(&String::from_utf8_lossy(&output.stderr));
        if let Err(err) = mail::send(settings, from, to, &subject, &body) {
            eprintln!("hook mail to {}: {}", to, err);
        }
    }
}
