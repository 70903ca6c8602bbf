use anyhow::Result;

use crate::Context;
use crate::config::ProvisioningConfig;
use crate::paths;

pub mod check;
pub mod menu;
pub mod plan;
pub mod run;

/// Locate and load the provisioning config
///
/// Any failure here is fatal: nothing has touched the host yet.
pub fn load_config(ctx: &Context) -> Result<ProvisioningConfig> {
    let path = paths::find_config(ctx.config.as_deref())?;
    log::info!("Using config {}", path.display());
    ProvisioningConfig::load(&path)
}
