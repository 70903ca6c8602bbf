//! Pipeline steps
//!
//! Every unit of provisioning work is a [`Step`] with:
//! - Identity (id, progress label, menu task group)
//! - An applicability predicate over the config
//! - A run function that drives the host through a [`StepContext`]
//!
//! [`pipeline`] returns the steps in the only order they may run in.

use anyhow::{Context, Result, bail};
use hostkit::{CommandOutput, CommandSpec, Host, LineChange};
use std::fmt;
use std::path::Path;

use crate::config::ProvisioningConfig;
use crate::engine::ErrorPolicy;
use crate::prompt::Prompter;

pub mod bench;
pub mod dependencies;
pub mod production;
pub mod ssh;
pub mod swap;
pub mod system;

pub use bench::{BenchInit, BenchInstall, SiteCreate};
pub use dependencies::Dependencies;
pub use production::{Production, Tls};
pub use ssh::{AuthorizedKeys, SshHardening};
pub use swap::Swap;
pub use system::{KernelTuning, SystemRefresh};

/// Task groups offered by the interactive menu, in menu order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskGroup {
    ServerConfig,
    DatabaseSystem,
    InstallBench,
    InitBench,
    CreateSite,
    Ssl,
    Production,
}

impl TaskGroup {
    pub const ALL: [TaskGroup; 7] = [
        Self::ServerConfig,
        Self::DatabaseSystem,
        Self::InstallBench,
        Self::InitBench,
        Self::CreateSite,
        Self::Ssl,
        Self::Production,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::ServerConfig => "Update Server Config",
            Self::DatabaseSystem => "Update System for MariaDB",
            Self::InstallBench => "Install Bench",
            Self::InitBench => "Initialize Bench with Apps",
            Self::CreateSite => "Create Site with App",
            Self::Ssl => "Setup SSL",
            Self::Production => "Setup Production",
        }
    }
}

/// Whether a step can run for a given config
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applicability {
    Ready,
    /// Runs only when explicitly selected
    OptIn(String),
    /// Required config is absent
    Missing(String),
}

/// A command that exited non-zero
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    /// Display form, secrets masked
    pub command: String,
    pub code: Option<i32>,
    pub stderr: String,
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "`{}` exited with status {}", self.command, code)?,
            None => write!(f, "`{}` was terminated by a signal", self.command)?,
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            write!(f, ": {}", stderr)?;
        }
        Ok(())
    }
}

/// Everything a step needs while it runs
pub struct StepContext<'a> {
    pub config: &'a ProvisioningConfig,
    pub host: &'a dyn Host,
    pub prompter: &'a mut dyn Prompter,
    policy: ErrorPolicy,
    failures: Vec<CommandFailure>,
    skipped: Option<String>,
}

impl<'a> StepContext<'a> {
    pub fn new(
        config: &'a ProvisioningConfig,
        host: &'a dyn Host,
        prompter: &'a mut dyn Prompter,
        policy: ErrorPolicy,
    ) -> Self {
        Self {
            config,
            host,
            prompter,
            policy,
            failures: Vec::new(),
            skipped: None,
        }
    }

    /// Run a command; a non-zero exit is handled per the error policy
    ///
    /// Returns whether the command succeeded.
    pub fn run(&mut self, cmd: CommandSpec) -> Result<bool> {
        log::debug!("$ {}", cmd);
        let output = self
            .host
            .run(&cmd)
            .with_context(|| format!("Failed to execute: {}", cmd))?;

        if output.success() {
            return Ok(true);
        }

        self.record(CommandFailure {
            command: cmd.to_string(),
            code: output.code,
            stderr: output.stderr_str(),
        })?;
        Ok(false)
    }

    /// Run a command whose exit status is an answer, not a failure
    pub fn probe(&mut self, cmd: CommandSpec) -> Result<CommandOutput> {
        log::debug!("? {}", cmd);
        self.host.run(&cmd.captured()).map_err(anyhow::Error::from)
    }

    /// Download a file; a failed download is handled like a failed command
    pub fn download(&mut self, url: &str, dest: &Path) -> Result<bool> {
        log::debug!("GET {} -> {}", url, dest.display());
        match self.host.download(url, dest) {
            Ok(()) => Ok(true),
            Err(e) => {
                self.record(CommandFailure {
                    command: format!("download {}", url),
                    code: None,
                    stderr: e.to_string(),
                })?;
                Ok(false)
            }
        }
    }

    fn record(&mut self, failure: CommandFailure) -> Result<()> {
        match self.policy {
            ErrorPolicy::FailFast => bail!("{}", failure),
            ErrorPolicy::Continue => {
                log::warn!("{}", failure);
                self.failures.push(failure);
                Ok(())
            }
        }
    }

    /// Append a config line unless a line starting with it exists
    pub fn ensure_line(&self, line: &str, path: impl AsRef<Path>) -> Result<LineChange> {
        let path = path.as_ref();
        let change = hostkit::ensure_line_present(self.host, line, path)
            .with_context(|| format!("Failed to update {}", path.display()))?;
        log_change(change, line, path);
        Ok(change)
    }

    /// Append a config block anchored on its first line
    pub fn ensure_block(&self, block: &str, path: impl AsRef<Path>) -> Result<LineChange> {
        let path = path.as_ref();
        let change = hostkit::ensure_block_present(self.host, block, path)
            .with_context(|| format!("Failed to update {}", path.display()))?;
        log_change(change, block.lines().next().unwrap_or_default(), path);
        Ok(change)
    }

    /// Add a config line inside an INI section
    pub fn ensure_in_section(
        &self,
        section: &str,
        line: &str,
        path: impl AsRef<Path>,
    ) -> Result<LineChange> {
        let path = path.as_ref();
        let change = match hostkit::ensure_line_in_section(self.host, section, line, path) {
            // The file may only appear once earlier commands have really run
            Err(hostkit::Error::AnchorNotFound { .. }) if self.host.is_preview() => {
                crate::ui::dim(&format!(
                    "would insert into {} of {}: {}",
                    section,
                    path.display(),
                    line
                ));
                LineChange::Inserted
            }
            result => {
                result.with_context(|| format!("Failed to update {}", path.display()))?
            }
        };
        log_change(change, line, path);
        Ok(change)
    }

    /// Mark the step as having nothing to do on this host
    pub fn skip(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        crate::ui::info(&format!("Skipped: {}", reason));
        self.skipped = Some(reason);
    }

    /// Why the step skipped itself, if it did
    pub fn skip_reason(&self) -> Option<&str> {
        self.skipped.as_deref()
    }

    /// Command failures recorded so far
    pub fn into_failures(self) -> Vec<CommandFailure> {
        self.failures
    }
}

fn log_change(change: LineChange, line: &str, path: &Path) {
    if change.is_change() {
        log::info!("{}: added '{}'", path.display(), line);
    } else {
        log::debug!("{}: '{}' already present", path.display(), line);
    }
}

/// Core trait for all pipeline steps
pub trait Step: fmt::Debug {
    /// Stable identifier, used by `--only` and `--skip`
    fn id(&self) -> &'static str;

    /// Progress label printed before the step runs
    fn description(&self) -> &'static str;

    /// Menu task group this step belongs to
    fn group(&self) -> TaskGroup;

    /// Whether the config enables this step
    fn applicability(&self, _config: &ProvisioningConfig) -> Applicability {
        Applicability::Ready
    }

    /// Drive the host
    ///
    /// `Err` aborts the whole run; failed commands under
    /// [`ErrorPolicy::Continue`] are recorded on the context instead.
    fn run(&self, ctx: &mut StepContext) -> Result<()>;
}

/// The full provisioning pipeline, in execution order
pub fn pipeline() -> Vec<Box<dyn Step>> {
    vec![
        Box::new(SystemRefresh),
        Box::new(AuthorizedKeys),
        Box::new(SshHardening),
        Box::new(KernelTuning),
        Box::new(Swap),
        Box::new(Dependencies),
        Box::new(BenchInstall),
        Box::new(BenchInit),
        Box::new(SiteCreate),
        Box::new(Production),
        Box::new(Tls),
    ]
}
