//! Host implementations for the local machine
//!
//! - [`SystemHost`] runs commands and edits files for real
//! - [`DryRunHost`] reads the real filesystem but only reports what it
//!   would change

use hostkit::{CommandOutput, CommandSpec, Error, Host};
use std::cell::OnceCell;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::process::Stdio;

use crate::sudo::{self, SudoContext};
use crate::{runner, ui};

/// Maximum download size (100 MB)
const MAX_DOWNLOAD_SIZE: u64 = 100 * 1024 * 1024;

/// The machine benchforge runs on
///
/// Sudo is acquired on the first privileged command, not up front, and
/// never when the process already runs as root.
pub struct SystemHost {
    reason: String,
    root: bool,
    sudo: OnceCell<SudoContext>,
    agent: ureq::Agent,
}

impl SystemHost {
    /// `reason` is shown when sudo asks for a password
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
            root: sudo::is_root(),
            sudo: OnceCell::new(),
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    fn sudo(&self) -> hostkit::Result<Option<&SudoContext>> {
        if self.root {
            return Ok(None);
        }
        if let Some(ctx) = self.sudo.get() {
            return Ok(Some(ctx));
        }
        let ctx =
            SudoContext::acquire(&self.reason).map_err(|e| Error::Privilege(format!("{:#}", e)))?;
        Ok(Some(self.sudo.get_or_init(|| ctx)))
    }

    /// Write `text` to `path` through `sudo tee`
    fn sudo_tee(&self, path: &Path, text: &str, append: bool) -> hostkit::Result<()> {
        let Some(ctx) = self.sudo()? else {
            return Err(Error::PermissionDenied(path.to_path_buf()));
        };

        let mut cmd = ctx.command("tee");
        if append {
            cmd.arg("-a");
        }
        cmd.arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let spawn_error = |source| Error::Spawn {
            program: "sudo tee".to_string(),
            source,
        };
        let mut child = cmd.spawn().map_err(spawn_error)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|e| Error::from_io(path, e))?;
        }
        let output = child.wait_with_output().map_err(spawn_error)?;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::PermissionDenied(path.to_path_buf()))
        }
    }

    fn sudo_cat(&self, path: &Path) -> hostkit::Result<String> {
        let Some(ctx) = self.sudo()? else {
            return Err(Error::PermissionDenied(path.to_path_buf()));
        };
        let output = ctx
            .command("cat")
            .arg(path)
            .output()
            .map_err(|source| Error::Spawn {
                program: "sudo cat".to_string(),
                source,
            })?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(Error::PermissionDenied(path.to_path_buf()))
        }
    }
}

impl Host for SystemHost {
    fn run(&self, cmd: &CommandSpec) -> hostkit::Result<CommandOutput> {
        let sudo = if cmd.privileged { self.sudo()? } else { None };
        runner::run(cmd, sudo)
    }

    fn read_to_string(&self, path: &Path) -> hostkit::Result<String> {
        match fs::read_to_string(path).map_err(|e| Error::from_io(path, e)) {
            Err(Error::PermissionDenied(_)) => self.sudo_cat(path),
            other => other,
        }
    }

    fn append(&self, path: &Path, text: &str) -> hostkit::Result<()> {
        let result = OpenOptions::new()
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(text.as_bytes()))
            .map_err(|e| Error::from_io(path, e));

        match result {
            Err(Error::PermissionDenied(_)) => {
                log::debug!("Appending to {} with sudo", path.display());
                self.sudo_tee(path, text, true)
            }
            other => other,
        }
    }

    fn write(&self, path: &Path, contents: &str) -> hostkit::Result<()> {
        let result = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(path)
            .and_then(|mut file| file.write_all(contents.as_bytes()))
            .map_err(|e| Error::from_io(path, e));

        match result {
            Err(Error::PermissionDenied(_)) => {
                log::debug!("Writing {} with sudo", path.display());
                self.sudo_tee(path, contents, false)
            }
            other => other,
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn download(&self, url: &str, dest: &Path) -> hostkit::Result<()> {
        let download_error = |message: String| Error::Download {
            url: url.to_string(),
            message,
        };

        let mut response = self
            .agent
            .get(url)
            .header("User-Agent", "benchforge")
            .call()
            .map_err(|e| download_error(e.to_string()))?;

        let bytes = response
            .body_mut()
            .with_config()
            .limit(MAX_DOWNLOAD_SIZE)
            .read_to_vec()
            .map_err(|e| download_error(e.to_string()))?;

        fs::write(dest, bytes).map_err(|e| Error::from_io(dest, e))?;
        log::debug!("Downloaded {} to {}", url, dest.display());
        Ok(())
    }
}

/// Reports changes instead of making them
#[derive(Debug, Default)]
pub struct DryRunHost;

impl Host for DryRunHost {
    fn run(&self, cmd: &CommandSpec) -> hostkit::Result<CommandOutput> {
        ui::dim(&format!("would run: {}", cmd));
        Ok(CommandOutput::ok())
    }

    fn read_to_string(&self, path: &Path) -> hostkit::Result<String> {
        match fs::read_to_string(path).map_err(|e| Error::from_io(path, e)) {
            Err(Error::NotFound(_) | Error::PermissionDenied(_)) => {
                log::debug!("{} not readable, treating as empty", path.display());
                Ok(String::new())
            }
            other => other,
        }
    }

    fn append(&self, path: &Path, text: &str) -> hostkit::Result<()> {
        for line in text.lines() {
            ui::dim(&format!("would append to {}: {}", path.display(), line));
        }
        Ok(())
    }

    fn write(&self, path: &Path, contents: &str) -> hostkit::Result<()> {
        ui::dim(&format!(
            "would rewrite {} ({} lines)",
            path.display(),
            contents.lines().count()
        ));
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn download(&self, url: &str, dest: &Path) -> hostkit::Result<()> {
        ui::dim(&format!("would download {} to {}", url, dest.display()));
        Ok(())
    }

    fn is_preview(&self) -> bool {
        true
    }
}
