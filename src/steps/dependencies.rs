//! System dependencies: Python, MariaDB, Node.js, wkhtmltopdf and tooling
//!
//! Installed in that order. The MariaDB part also writes the server
//! tuning file and a systemd override, both anchored on their first line.

use anyhow::{Context, Result};
use hostkit::CommandSpec;
use std::path::Path;

use super::{Step, StepContext, TaskGroup};
use crate::config::Wkhtmltopdf;
use crate::ui;

pub const MEMINFO: &str = "/proc/meminfo";
pub const MARIADB_CONF_DIR: &str = "/etc/mysql/mariadb.conf.d";
pub const MARIADB_CONF: &str = "/etc/mysql/mariadb.conf.d/erpnext.cnf";
pub const MARIADB_OVERRIDE_DIR: &str = "/etc/systemd/system/mariadb.service.d";
pub const MARIADB_OVERRIDE: &str = "/etc/systemd/system/mariadb.service.d/override.conf";

const MARIADB_REPO_SETUP: &str = "https://r.mariadb.com/downloads/mariadb_repo_setup";
const WKHTMLTOPDF_RELEASES: &str = "https://github.com/wkhtmltopdf/packaging/releases/download";

const SERVICE_OVERRIDE: &str = "[Service]\nLimitNOFILE=infinity\nLimitCORE=infinity\n";

#[derive(Debug)]
pub struct Dependencies;

impl Step for Dependencies {
    fn id(&self) -> &'static str {
        "dependencies"
    }

    fn description(&self) -> &'static str {
        "Installing dependencies"
    }

    fn group(&self) -> TaskGroup {
        TaskGroup::DatabaseSystem
    }

    fn run(&self, ctx: &mut StepContext) -> Result<()> {
        install_python(ctx)?;
        install_mariadb(ctx)?;
        install_nodejs(ctx)?;
        install_wkhtmltopdf(ctx)?;
        install_tools(ctx)?;
        Ok(())
    }
}

fn apt_install(ctx: &mut StepContext, packages: &[&str]) -> Result<bool> {
    let mut args = vec!["install", "-y"];
    args.extend_from_slice(packages);
    ctx.run(CommandSpec::sudo("apt-get", args))
}

fn install_python(ctx: &mut StepContext) -> Result<()> {
    let config = ctx.config;
    let version = &config.dependencies.python;
    ui::section(&format!("Installing python {}", version));

    let python = format!("python{}", version);
    let dev = format!("{}-dev", python);
    let venv = format!("{}-venv", python);

    apt_install(ctx, &["software-properties-common"])?;
    ctx.run(CommandSpec::sudo(
        "add-apt-repository",
        ["ppa:deadsnakes/ppa", "-y"],
    ))?;
    ctx.run(CommandSpec::sudo("apt-get", ["update"]))?;
    apt_install(
        ctx,
        &[
            python.as_str(),
            dev.as_str(),
            venv.as_str(),
            "python3-pip",
            "python3-setuptools",
        ],
    )?;
    Ok(())
}

fn install_mariadb(ctx: &mut StepContext) -> Result<()> {
    let config = ctx.config;
    let version = &config.dependencies.mariadb;
    ui::section(&format!("Installing mariadb {}", version));

    ctx.run(CommandSpec::shell(&format!(
        "curl -LsS {} | sudo bash -s -- --mariadb-server-version=mariadb-{}",
        MARIADB_REPO_SETUP, version
    )))?;
    ctx.run(CommandSpec::sudo("apt-get", ["update"]))?;
    apt_install(
        ctx,
        &["mariadb-server", "mariadb-client", "libmysqlclient-dev"],
    )?;

    // Interactive: the operator answers the prompts on the terminal
    ctx.run(CommandSpec::sudo(
        "mysql_secure_installation",
        Vec::<String>::new(),
    ))?;

    update_mariadb_config(ctx)
}

fn update_mariadb_config(ctx: &mut StepContext) -> Result<()> {
    ui::section("Updating mariadb config");

    let meminfo = ctx
        .host
        .read_to_string(Path::new(MEMINFO))
        .with_context(|| format!("Failed to read {}", MEMINFO))?;
    let pool_mb =
        buffer_pool_size_mb(ctx.config.dependencies.innodb_buffer_pool_size, &meminfo)?;
    log::info!("innodb buffer pool size: {}M", pool_mb);

    ctx.run(CommandSpec::sudo("mkdir", ["-p", MARIADB_CONF_DIR]))?;
    ctx.run(CommandSpec::sudo("touch", [MARIADB_CONF]))?;
    ctx.ensure_block(&mariadb_conf(pool_mb), MARIADB_CONF)?;

    ctx.run(CommandSpec::sudo("mkdir", ["-p", MARIADB_OVERRIDE_DIR]))?;
    ctx.run(CommandSpec::sudo("touch", [MARIADB_OVERRIDE]))?;
    ctx.ensure_block(SERVICE_OVERRIDE, MARIADB_OVERRIDE)?;

    ctx.run(CommandSpec::sudo("systemctl", ["daemon-reload"]))?;
    ctx.run(CommandSpec::sudo("systemctl", ["restart", "mariadb"]))?;
    Ok(())
}

/// Server tuning for Frappe sites
pub fn mariadb_conf(buffer_pool_mb: u64) -> String {
    format!(
        "[mysqld]
innodb-file-per-table=1
innodb-buffer-pool-size={}M
character-set-client-handshake = FALSE
character-set-server = utf8mb4
collation-server = utf8mb4_unicode_ci
max_allowed_packet = 256M

[mysql]
default-character-set = utf8mb4
",
        buffer_pool_mb
    )
}

/// `MemFree` from `/proc/meminfo`, in whole megabytes
pub fn parse_free_mb(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find_map(|line| line.strip_prefix("MemFree:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb / 1024)
}

/// The configured buffer pool size, or 60% of free memory when unset or zero
pub fn buffer_pool_size_mb(configured: Option<u64>, meminfo: &str) -> Result<u64> {
    if let Some(size) = configured.filter(|size| *size > 0) {
        return Ok(size);
    }
    let free_mb = parse_free_mb(meminfo).context("No MemFree entry in /proc/meminfo")?;
    Ok(free_mb * 6 / 10)
}

fn install_nodejs(ctx: &mut StepContext) -> Result<()> {
    let config = ctx.config;
    let version = &config.dependencies.node;
    ui::section(&format!("Installing nodejs {}", version));

    apt_install(ctx, &["curl"])?;
    ctx.run(CommandSpec::shell(&format!(
        "curl -fsSL https://deb.nodesource.com/setup_{}.x | sudo -E bash -",
        version
    )))?;
    apt_install(ctx, &["nodejs"])?;
    Ok(())
}

/// Release download URL for a wkhtmltopdf package
pub fn wkhtmltopdf_url(package: &Wkhtmltopdf) -> String {
    format!(
        "{}/{}/{}",
        WKHTMLTOPDF_RELEASES, package.version, package.filename
    )
}

fn install_wkhtmltopdf(ctx: &mut StepContext) -> Result<()> {
    let config = ctx.config;
    let package = &config.dependencies.wkhtmltopdf;
    ui::section(&format!("Installing wkhtmltopdf {}", package.version));

    apt_install(ctx, &["xvfb", "libfontconfig"])?;

    let dest = Path::new("/tmp").join(&package.filename);
    if !ctx.download(&wkhtmltopdf_url(package), &dest)? {
        return Ok(());
    }

    let dest_str = dest.display().to_string();
    apt_install(ctx, &[dest_str.as_str()])?;
    ctx.run(CommandSpec::new("rm", ["-f", dest_str.as_str()]))?;
    Ok(())
}

fn install_tools(ctx: &mut StepContext) -> Result<()> {
    ui::section("Installing yarn");
    ctx.run(CommandSpec::sudo("npm", ["install", "-g", "yarn"]))?;

    ui::section("Installing redis-server");
    apt_install(ctx, &["redis-server"])?;

    ui::section("Installing git");
    apt_install(ctx, &["git"])?;
    Ok(())
}
