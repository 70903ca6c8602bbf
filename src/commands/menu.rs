//! Interactive task menu

use anyhow::Result;
use colored::Colorize;

use super::load_config;
use crate::Context;
use crate::engine::{self, ExecuteOptions, Plan, Selection};
use crate::host::SystemHost;
use crate::prompt::{Prompter, TerminalPrompter};
use crate::steps::TaskGroup;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let config = load_config(ctx)?;
    if !ctx.quiet {
        ui::banner();
    }

    let host = SystemHost::new("Provision this server for Frappe");
    let mut prompter = TerminalPrompter;

    menu_loop(&mut prompter, |group, prompter| {
        let plan = Plan::build(&config, &Selection::group(group))?;
        // Picking the task is the confirmation
        let opts = ExecuteOptions {
            policy: config.on_error,
            yes: true,
        };
        engine::execute(&plan, &config, &host, prompter, opts)?;
        Ok(())
    })
}

/// Show the task list until the operator quits
///
/// A failed task is reported and the menu comes back; only a broken
/// prompt ends the loop early.
pub fn menu_loop<F>(prompter: &mut dyn Prompter, mut run_task: F) -> Result<()>
where
    F: FnMut(TaskGroup, &mut dyn Prompter) -> Result<()>,
{
    loop {
        ui::header("Select Task");
        for (i, group) in TaskGroup::ALL.iter().enumerate() {
            println!("  {}  {}", format!("{}.", i + 1).bold(), group.label());
        }
        println!();
        println!("  {}", "Enter 'q' to quit".dimmed());

        let answer = prompter.input("Enter the task number")?;
        let answer = answer.trim();
        if answer.eq_ignore_ascii_case("q") {
            break;
        }

        match parse_choice(answer) {
            Some(group) => {
                log::info!("Menu task: {:?}", group);
                if let Err(e) = run_task(group, prompter) {
                    ui::error(&format!("{:#}", e));
                }
            }
            None => ui::warn(&format!(
                "Invalid choice '{}', enter 1-{} or 'q'",
                answer,
                TaskGroup::ALL.len()
            )),
        }
    }

    Ok(())
}

fn parse_choice(answer: &str) -> Option<TaskGroup> {
    let n: usize = answer.parse().ok()?;
    TaskGroup::ALL.get(n.checked_sub(1)?).copied()
}
