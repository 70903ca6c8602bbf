//! OS package refresh and kernel tuning

use anyhow::Result;
use hostkit::CommandSpec;

use super::{Step, StepContext, TaskGroup};

pub const SYSCTL_CONF: &str = "/etc/sysctl.conf";

/// Kernel parameters for a database host
///
/// Minimal swappiness and a lower vfs cache pressure, as recommended for
/// MariaDB.
pub const SYSCTL_SETTINGS: [&str; 2] = ["vm.swappiness=1", "vm.vfs_cache_pressure=50"];

#[derive(Debug)]
pub struct SystemRefresh;

impl Step for SystemRefresh {
    fn id(&self) -> &'static str {
        "system-refresh"
    }

    fn description(&self) -> &'static str {
        "Updating and upgrading apt packages"
    }

    fn group(&self) -> TaskGroup {
        TaskGroup::ServerConfig
    }

    fn run(&self, ctx: &mut StepContext) -> Result<()> {
        ctx.run(CommandSpec::sudo("apt-get", ["update"]))?;
        ctx.run(CommandSpec::sudo("apt-get", ["upgrade", "-y"]))?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct KernelTuning;

impl Step for KernelTuning {
    fn id(&self) -> &'static str {
        "kernel-tuning"
    }

    fn description(&self) -> &'static str {
        "Updating sysctl config"
    }

    fn group(&self) -> TaskGroup {
        TaskGroup::ServerConfig
    }

    fn run(&self, ctx: &mut StepContext) -> Result<()> {
        for setting in SYSCTL_SETTINGS {
            ctx.ensure_line(setting, SYSCTL_CONF)?;
        }
        ctx.run(CommandSpec::sudo("sysctl", ["-p"]))?;
        Ok(())
    }
}
