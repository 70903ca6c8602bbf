//! Scoped sudo context
//!
//! Sudo is validated once, right before the first privileged step, and the
//! cached credential is invalidated again when the context is dropped. When
//! benchforge itself runs as root no context is needed at all.

use anyhow::{Context, Result, bail};
use std::process::Command;

/// Whether the current process runs as root
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

/// Scoped sudo context - automatically invalidates on drop
#[derive(Debug)]
pub struct SudoContext {
    validated: bool,
}

impl SudoContext {
    /// Acquire sudo privileges with a reason shown to user
    pub fn acquire(reason: &str) -> Result<Self> {
        eprintln!();
        eprintln!("  Sudo required: {}", reason);
        eprintln!();

        // Validate sudo (will prompt for password)
        let status = Command::new("sudo")
            .args(["-v"])
            .status()
            .context("Failed to execute sudo")?;

        if !status.success() {
            bail!("Failed to acquire sudo privileges");
        }

        Ok(Self { validated: true })
    }

    /// Check if sudo is currently valid (without prompting)
    pub fn is_valid() -> bool {
        Command::new("sudo")
            .args(["-n", "true"])
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// A `sudo <program>` command
    pub fn command(&self, program: &str) -> Command {
        let mut cmd = Command::new("sudo");
        cmd.arg(program);
        cmd
    }
}

impl Drop for SudoContext {
    fn drop(&mut self) {
        if self.validated {
            // Invalidate sudo timestamp to release privileges
            let _ = Command::new("sudo").args(["-k"]).status();
        }
    }
}
