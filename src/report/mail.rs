use std::io::Write;
use std::process::{Command, Stdio};

use crate::config::model::Settings;
use crate::error::{Result, RsnapError};

/// Pipes a message through the configured sendmail program.
pub fn send(
    settings: &Settings,
    from: Option<&str>,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<()> {
    let mut child = Command::new(&settings.sendmail_program)
        .arg("-t")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| {
            RsnapError::message(format!("{}: {}", settings.sendmail_program, e))
        })?;
    {
        let stdin = child
            .stdin
            .as_mut()
            .ok_or_else(|| RsnapError::message("sendmail stdin unavailable"))?;
        if let Some(from) = from {
            writeln!(stdin, "From: {}", from)?;
        }
        writeln!(stdin, "To: {}", to)?;
        writeln!(stdin, "Subject: {}", subject)?;
        writeln!(stdin)?;
        stdin.write_all(body.as_bytes())?;
    }
    let status = child.wait()?;
    if !status.success() {
        return Err(RsnapError::message(format!(
            "{} exited with status {}",
            settings.sendmail_program,
            status.code().unwrap_or(1)
        )));
    }
    Ok(())
}
