use anyhow::Result;
use colored::Colorize;

use super::load_config;
use crate::Context;
use crate::cli::SelectionArgs;
use crate::engine::{Decision, Plan, Selection};
use crate::ui;

pub fn run(ctx: &Context, args: SelectionArgs) -> Result<()> {
    let config = load_config(ctx)?;
    let plan = Plan::build(&config, &Selection::from(args))?;

    ui::header("Provisioning Plan");
    for planned in &plan.steps {
        let step = planned.step.as_ref();
        let group = format!("[{}]", step.group().label()).dimmed();
        match &planned.decision {
            Decision::Run => println!(
                "  {} {:<16} {} {}",
                "●".green(),
                step.id().bold(),
                step.description(),
                group
            ),
            Decision::Skip(reason) => println!(
                "  {} {:<16} {} {}",
                "○".dimmed(),
                step.id().dimmed(),
                format!("skip: {}", reason).yellow(),
                group
            ),
        }
    }

    println!();
    let runnable = plan.runnable().count();
    if runnable == 0 {
        ui::info("Nothing to do for this selection");
    } else {
        ui::info(&format!(
            "{} of {} steps will run",
            runnable,
            plan.steps.len()
        ));
    }
    Ok(())
}
