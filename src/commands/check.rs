use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::config::ProvisioningConfig;
use crate::runner;
use crate::sudo::{self, SudoContext};
use crate::{paths, ui};

/// Tools the pipeline shells out to, and what needs them
const TOOLS: &[(&str, &str)] = &[
    ("sudo", "privileged commands"),
    ("apt-get", "package installs"),
    ("curl", "MariaDB and Node.js repositories"),
    ("systemctl", "service restarts"),
    ("bench", "bench, apps and sites"),
    ("mysql", "site creation"),
    ("node", "asset builds"),
    ("certbot", "TLS certificates"),
];

pub fn run(ctx: &Context) -> Result<()> {
    if !ctx.quiet {
        ui::banner();
    }
    ui::header("Configuration");

    let path = paths::find_config(ctx.config.as_deref())?;
    ui::kv("File", &path.display().to_string());
    let mut problems = 0;
    match ProvisioningConfig::load(&path) {
        Ok(config) => print_config(&config),
        Err(e) => {
            problems += 1;
            ui::error(&format!("{:#}", e));
        }
    }

    ui::section("Tools");
    for (tool, purpose) in TOOLS {
        if runner::command_exists(tool) {
            println!("  {} {:<10} {}", "✓".green(), tool, purpose.dimmed());
        } else {
            println!(
                "  {} {:<10} {}",
                "○".yellow(),
                tool,
                format!("not installed ({})", purpose).dimmed()
            );
        }
    }

    ui::section("Privileges");
    if sudo::is_root() {
        ui::kv("User", "root");
    } else if SudoContext::is_valid() {
        ui::kv("Sudo", "cached credentials");
    } else {
        ui::kv("Sudo", "will prompt for a password");
    }

    println!();
    if problems == 0 {
        ui::success("Configuration is valid");
    } else {
        ui::warn("Fix the configuration before running");
    }
    Ok(())
}

fn print_config(config: &ProvisioningConfig) {
    let deps = &config.dependencies;
    ui::kv("User", &config.username);
    ui::kv("Bench", &config.bench_dir().display().to_string());
    ui::kv("Site", config.site_name.as_deref().unwrap_or("(not set)"));
    ui::kv(
        "SSH port",
        &config
            .custom_ssh_port()
            .map_or_else(|| "22".to_string(), |p| p.to_string()),
    );
    ui::kv("Keys", &config.authorized_keys.len().to_string());
    ui::kv(
        "Stack",
        &format!(
            "python {} / mariadb {} / node {} / wkhtmltopdf {}",
            deps.python, deps.mariadb, deps.node, deps.wkhtmltopdf.version
        ),
    );
    let apps: Vec<&str> = config.apps.iter().map(|(name, _)| name.as_str()).collect();
    ui::kv("Apps", &apps.join(", "));
    ui::kv(
        "Swap",
        &config
            .swap_size
            .as_deref()
            .map_or_else(|| "ask".to_string(), |s| format!("{} GB", s)),
    );
    ui::kv("Production", if config.production { "yes" } else { "no" });
    ui::kv("On error", config.on_error.name());
    ui::kv("MariaDB root", &ui::mask(config.mariadb_root_password.as_deref()));
    ui::kv("Admin", &ui::mask(config.admin_password.as_deref()));
}
