use hostkit::{CommandOutput, CommandSpec};
use std::process::{Command, Stdio};

use crate::sudo::SudoContext;

/// Build the process for a command spec
///
/// Privileged commands go through `sudo` unless `sudo` is `None`, which
/// means the process already runs as root.
pub fn build(spec: &CommandSpec, sudo: Option<&SudoContext>) -> Command {
    let mut cmd = match sudo {
        Some(ctx) if spec.privileged => ctx.command(&spec.program),
        _ => Command::new(&spec.program),
    };
    cmd.args(&spec.args);
    if let Some(dir) = &spec.cwd {
        cmd.current_dir(dir);
    }
    cmd
}

/// Run a command spec to completion
///
/// Streamed commands inherit stdio (shows output in real-time, and lets
/// interactive tools prompt the operator); captured ones collect it.
pub fn run(spec: &CommandSpec, sudo: Option<&SudoContext>) -> hostkit::Result<CommandOutput> {
    let mut cmd = build(spec, sudo);
    let spawn_error = |source| hostkit::Error::Spawn {
        program: spec.program.clone(),
        source,
    };

    if spec.capture {
        let output = cmd.output().map_err(spawn_error)?;
        return Ok(output.into());
    }

    let status = cmd
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(spawn_error)?;

    Ok(CommandOutput {
        code: status.code(),
        stdout: Vec::new(),
        stderr: Vec::new(),
    })
}

/// Check if a command exists
pub fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
