use anyhow::Result;

use super::load_config;
use crate::Context;
use crate::cli::RunArgs;
use crate::engine::{self, ErrorPolicy, ExecuteOptions, Plan, Selection};
use crate::host::{DryRunHost, SystemHost};
use crate::prompt::TerminalPrompter;
use crate::ui;

pub fn run(ctx: &Context, args: RunArgs) -> Result<()> {
    let config = load_config(ctx)?;
    let selection = Selection::from(args.selection);
    let plan = Plan::build(&config, &selection)?;

    let opts = ExecuteOptions {
        policy: args.on_error.map_or(config.on_error, ErrorPolicy::from),
        yes: args.yes || args.dry_run,
    };
    log::info!("Error policy: {}", opts.policy.name());

    if !ctx.quiet {
        ui::banner();
    }
    ui::header(&format!("Provisioning {}", config.username));

    let mut prompter = TerminalPrompter;
    let summary = if args.dry_run {
        ui::info("Dry run - no changes will be made");
        engine::execute(&plan, &config, &DryRunHost, &mut prompter, opts)?
    } else {
        let host = SystemHost::new("Provision this server for Frappe");
        engine::execute(&plan, &config, &host, &mut prompter, opts)?
    };

    if !summary.is_success() {
        log::warn!(
            "{} step(s) finished with failed commands",
            summary.with_errors()
        );
    }
    Ok(())
}
