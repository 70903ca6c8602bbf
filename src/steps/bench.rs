//! Frappe bench: CLI install, workspace init and site creation
//!
//! Bench commands run as the invoking user, who should be the configured
//! bench user.

use anyhow::{Context, Result};
use hostkit::CommandSpec;

use super::{Applicability, Step, StepContext, TaskGroup};
use crate::config::{FRAPPE_APP, ProvisioningConfig};

#[derive(Debug)]
pub struct BenchInstall;

impl Step for BenchInstall {
    fn id(&self) -> &'static str {
        "bench-install"
    }

    fn description(&self) -> &'static str {
        "Installing latest frappe-bench"
    }

    fn group(&self) -> TaskGroup {
        TaskGroup::InstallBench
    }

    fn run(&self, ctx: &mut StepContext) -> Result<()> {
        ctx.run(CommandSpec::sudo("pip3", ["install", "frappe-bench"]))?;
        ctx.run(CommandSpec::new("bench", ["--version"]))?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct BenchInit;

impl Step for BenchInit {
    fn id(&self) -> &'static str {
        "bench-init"
    }

    fn description(&self) -> &'static str {
        "Initializing frappe-bench"
    }

    fn group(&self) -> TaskGroup {
        TaskGroup::InitBench
    }

    fn applicability(&self, config: &ProvisioningConfig) -> Applicability {
        if config.apps.is_empty() {
            Applicability::Missing("no apps configured".to_string())
        } else {
            Applicability::Ready
        }
    }

    fn run(&self, ctx: &mut StepContext) -> Result<()> {
        let config = ctx.config;
        let frappe = config
            .frappe()
            .with_context(|| format!("No '{}' entry in apps", FRAPPE_APP))?;
        let bench_dir = config.bench_dir();
        let python = format!("python{}", config.dependencies.python);

        if ctx.host.exists(&bench_dir) {
            log::info!("{} already exists, skipping bench init", bench_dir.display());
        } else {
            let init = CommandSpec::new(
                "bench",
                [
                    "init",
                    "--frappe-path",
                    frappe.url.as_str(),
                    "--frappe-branch",
                    frappe.branch.as_str(),
                    "--python",
                    python.as_str(),
                    config.bench_name.as_str(),
                ],
            )
            .current_dir(config.home_dir());
            ctx.run(init)?;
        }

        crate::ui::section("Getting apps");
        for (name, app) in config.extra_apps() {
            if ctx.host.exists(&bench_dir.join("apps").join(name)) {
                log::info!("App {} already fetched", name);
                continue;
            }
            let get_app = CommandSpec::new(
                "bench",
                ["get-app", "--branch", app.branch.as_str(), app.url.as_str()],
            )
            .current_dir(&bench_dir);
            ctx.run(get_app)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct SiteCreate;

impl Step for SiteCreate {
    fn id(&self) -> &'static str {
        "site"
    }

    fn description(&self) -> &'static str {
        "Setting up site"
    }

    fn group(&self) -> TaskGroup {
        TaskGroup::CreateSite
    }

    fn applicability(&self, config: &ProvisioningConfig) -> Applicability {
        if config.apps.is_empty() {
            Applicability::Missing("no apps configured".to_string())
        } else if config.site_name.is_none() {
            Applicability::Missing("site_name not set".to_string())
        } else if config.mariadb_root_password.is_none() || config.admin_password.is_none() {
            Applicability::Missing(
                "mariadb_root_password and admin_password are required".to_string(),
            )
        } else {
            Applicability::Ready
        }
    }

    fn run(&self, ctx: &mut StepContext) -> Result<()> {
        let config = ctx.config;
        let site = config.site_name.as_deref().context("site_name not set")?;
        let root_password = config
            .mariadb_root_password
            .as_deref()
            .context("mariadb_root_password not set")?;
        let admin_password = config
            .admin_password
            .as_deref()
            .context("admin_password not set")?;
        let bench_dir = config.bench_dir();

        crate::ui::info(&format!("Site {}", site));

        if ctx.host.exists(&bench_dir.join("sites").join(site)) {
            log::info!("Site {} already exists, skipping new-site", site);
        } else {
            let new_site = CommandSpec::new(
                "bench",
                [
                    "new-site",
                    site,
                    "--mariadb-root-password",
                    root_password,
                    "--admin-password",
                    admin_password,
                ],
            )
            .secret(root_password)
            .secret(admin_password)
            .current_dir(&bench_dir);
            ctx.run(new_site)?;
        }

        for (name, _) in config.extra_apps() {
            let install = CommandSpec::new("bench", ["--site", site, "install-app", name])
                .current_dir(&bench_dir);
            ctx.run(install)?;
        }

        let multitenant = if config.dns_multitenant { "on" } else { "off" };
        ctx.run(
            CommandSpec::new("bench", ["config", "dns_multitenant", multitenant])
                .current_dir(&bench_dir),
        )?;
        Ok(())
    }
}
