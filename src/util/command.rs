use std::process::Command;

use crate::error::{Result, RsnapError};
use crate::types::RunMode;

pub fn describe(cmd: &Command) -> String {
    let program = cmd.get_program().to_string_lossy();
    let args: Vec<String> = cmd
        .get_args()
        .map(|a| a.to_string_lossy().to_string())
        .collect();
    format!("{} {}", program, args.join(" "))
}

pub fn run_command(cmd: &mut Command, run_mode: RunMode) -> Result<i32> {
    if run_mode.debug || run_mode.simulate {
        println!("+ {}", describe(cmd));
    }
    if run_mode.simulate {
        return Ok(0);
    }
    let status = cmd.status().map_err(|e| {
        RsnapError::message(format!("{}: {}", cmd.get_program().to_string_lossy(), e))
    })?;
    Ok(status.code().unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_includes_args() {
        let mut cmd = Command::new("rm");
        cmd.arg("-rf").arg("/tmp/x");
        assert_eq!(describe(&cmd), "rm -rf /tmp/x");
    }

    #[test]
    fn simulate_skips_execution() {
        let mut cmd = Command::new("/nonexistent/program");
        let run_mode = RunMode {
            simulate: true,
            debug: false,
        };
        assert_eq!(run_command(&mut cmd, run_mode).unwrap(), 0);
    }
}
