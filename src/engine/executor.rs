//! Execution engine - runs planned steps in order with progress output

use anyhow::{Context, Result};
use colored::Colorize;
use hostkit::Host;

use super::ErrorPolicy;
use super::planner::{Decision, Plan};
use crate::config::ProvisioningConfig;
use crate::prompt::Prompter;
use crate::steps::{CommandFailure, StepContext};
use crate::ui;

/// Options for execution
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// What to do when a command fails
    pub policy: ErrorPolicy,
    /// Skip the confirmation prompt
    pub yes: bool,
}

/// How a step ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    CompletedWithErrors { failures: Vec<CommandFailure> },
    Skipped { reason: String },
}

/// Summary of execution results
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<(&'static str, StepOutcome)>,
    /// The user declined the confirmation prompt
    pub aborted: bool,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Completed))
    }

    pub fn with_errors(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::CompletedWithErrors { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Skipped { .. }))
    }

    pub fn is_success(&self) -> bool {
        !self.aborted && self.with_errors() == 0
    }

    /// Outcome of a step by id
    pub fn outcome(&self, id: &str) -> Option<&StepOutcome> {
        self.outcomes
            .iter()
            .find(|(step, _)| *step == id)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, f: impl Fn(&StepOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| f(o)).count()
    }
}

/// Execute the plan against a host
///
/// Returns `Err` when a host effect fails, or on the first failed command
/// under [`ErrorPolicy::FailFast`].
pub fn execute(
    plan: &Plan,
    config: &ProvisioningConfig,
    host: &dyn Host,
    prompter: &mut dyn Prompter,
    opts: ExecuteOptions,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    let total = plan.runnable().count();

    if total == 0 {
        ui::info("Nothing to do for this selection");
        record_skips(plan, &mut summary);
        return Ok(summary);
    }

    if !opts.yes {
        let prompt = format!(
            "Run {} step{} as '{}'?",
            total,
            if total == 1 { "" } else { "s" },
            config.username
        );
        if !prompter.confirm(&prompt)? {
            println!();
            println!("  {} Aborted", "✗".red());
            summary.aborted = true;
            return Ok(summary);
        }
    }

    let mut index = 0;
    for planned in &plan.steps {
        let step = planned.step.as_ref();

        if let Decision::Skip(reason) = &planned.decision {
            log::info!("Skipping {}: {}", step.id(), reason);
            summary.outcomes.push((
                step.id(),
                StepOutcome::Skipped {
                    reason: reason.clone(),
                },
            ));
            continue;
        }

        index += 1;
        println!();
        ui::step(index, total, step.description());
        log::info!("Starting {}", step.id());

        let mut ctx = StepContext::new(config, host, &mut *prompter, opts.policy);
        step.run(&mut ctx)
            .with_context(|| format!("Step '{}' failed", step.id()))?;
        let skipped = ctx.skip_reason().map(str::to_string);
        let failures = ctx.into_failures();

        let outcome = match skipped {
            _ if !failures.is_empty() => StepOutcome::CompletedWithErrors { failures },
            Some(reason) => StepOutcome::Skipped { reason },
            None => StepOutcome::Completed,
        };
        log::info!("Finished {}: {:?}", step.id(), outcome);
        summary.outcomes.push((step.id(), outcome));
    }

    print_summary(&summary);

    Ok(summary)
}

fn record_skips(plan: &Plan, summary: &mut RunSummary) {
    for planned in &plan.steps {
        if let Decision::Skip(reason) = &planned.decision {
            summary.outcomes.push((
                planned.step.id(),
                StepOutcome::Skipped {
                    reason: reason.clone(),
                },
            ));
        }
    }
}

/// Print final summary
fn print_summary(summary: &RunSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Provisioning finished", "✓".green().bold());
    } else {
        println!(
            "  {} Provisioning finished with errors",
            "⚠".yellow().bold()
        );
    }

    if summary.completed() > 0 {
        println!("    • {} steps completed", summary.completed());
    }
    if summary.skipped() > 0 {
        println!("    • {} steps skipped", summary.skipped());
    }
    for (id, outcome) in &summary.outcomes {
        if let StepOutcome::CompletedWithErrors { failures } = outcome {
            println!(
                "    • {} {} failed in {}",
                failures.len(),
                "commands".red(),
                id
            );
            for failure in failures {
                ui::dim(&format!("    {}", failure));
            }
        }
    }
}
