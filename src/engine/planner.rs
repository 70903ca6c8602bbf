//! Execution planner - filters the fixed pipeline by config and selection

use anyhow::{Result, bail};

use crate::config::ProvisioningConfig;
use crate::steps::{self, Applicability, Step, TaskGroup};

/// Which part of the pipeline the user asked for
///
/// With no groups and no `only` ids, every step is selected.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub groups: Vec<TaskGroup>,
    pub only: Vec<String>,
    pub skip: Vec<String>,
}

impl Selection {
    /// Everything, subject to step predicates
    pub fn all() -> Self {
        Self::default()
    }

    /// A single menu task group
    pub fn group(group: TaskGroup) -> Self {
        Self {
            groups: vec![group],
            ..Self::default()
        }
    }

    fn is_full_run(&self) -> bool {
        self.groups.is_empty() && self.only.is_empty()
    }

    /// Whether the step was asked for by name or by group
    fn is_explicit(&self, step: &dyn Step) -> bool {
        self.groups.contains(&step.group()) || self.only.iter().any(|id| id == step.id())
    }

    fn includes(&self, step: &dyn Step) -> bool {
        self.is_full_run() || self.is_explicit(step)
    }
}

/// Whether a planned step will run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Run,
    Skip(String),
}

#[derive(Debug)]
pub struct PlannedStep {
    pub step: Box<dyn Step>,
    pub decision: Decision,
}

/// The ordered steps of one run
#[derive(Debug, Default)]
pub struct Plan {
    pub steps: Vec<PlannedStep>,
}

impl Plan {
    /// Build a plan from the pipeline
    ///
    /// Unknown step ids in `only`/`skip` are rejected before anything runs.
    pub fn build(config: &ProvisioningConfig, selection: &Selection) -> Result<Self> {
        let pipeline = steps::pipeline();

        for id in selection.only.iter().chain(&selection.skip) {
            if !pipeline.iter().any(|s| s.id() == id) {
                let known: Vec<&str> = pipeline.iter().map(|s| s.id()).collect();
                bail!("Unknown step '{}' (known steps: {})", id, known.join(", "));
            }
        }

        let steps = pipeline
            .into_iter()
            .filter(|step| selection.includes(step.as_ref()))
            .map(|step| {
                let decision = decide(step.as_ref(), config, selection);
                log::debug!("plan: {} -> {:?}", step.id(), decision);
                PlannedStep { step, decision }
            })
            .collect();

        Ok(Self { steps })
    }

    /// Steps that will run, in order
    pub fn runnable(&self) -> impl Iterator<Item = &dyn Step> {
        self.steps
            .iter()
            .filter(|p| p.decision == Decision::Run)
            .map(|p| p.step.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.runnable().next().is_none()
    }
}

fn decide(step: &dyn Step, config: &ProvisioningConfig, selection: &Selection) -> Decision {
    if selection.skip.iter().any(|id| id == step.id()) {
        return Decision::Skip("excluded by --skip".to_string());
    }

    match step.applicability(config) {
        Applicability::Ready => Decision::Run,
        Applicability::OptIn(_) if selection.is_explicit(step) => Decision::Run,
        Applicability::OptIn(reason) | Applicability::Missing(reason) => Decision::Skip(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::fixture::sample;

    fn decisions(plan: &Plan) -> Vec<(&'static str, Decision)> {
        plan.steps
            .iter()
            .map(|p| (p.step.id(), p.decision.clone()))
            .collect()
    }

    #[test]
    fn test_full_run_keeps_order_and_skips_opt_in() {
        let plan = Plan::build(&sample(), &Selection::all()).unwrap();
        let ids: Vec<&str> = plan.runnable().map(|s| s.id()).collect();

        assert_eq!(
            ids,
            vec![
                "system-refresh",
                "authorized-keys",
                "ssh-hardening",
                "kernel-tuning",
                "swap",
                "dependencies",
                "bench-install",
                "bench-init",
                "site",
                "tls",
            ]
        );
        assert!(matches!(
            plan.steps.iter().find(|p| p.step.id() == "production").unwrap().decision,
            Decision::Skip(_)
        ));
    }

    #[test]
    fn test_production_flag_enables_production() {
        let mut config = sample();
        config.production = true;
        let plan = Plan::build(&config, &Selection::all()).unwrap();
        assert!(plan.runnable().any(|s| s.id() == "production"));
    }

    #[test]
    fn test_group_selection_opts_in() {
        let plan = Plan::build(&sample(), &Selection::group(TaskGroup::Production)).unwrap();
        let ids: Vec<&str> = plan.runnable().map(|s| s.id()).collect();
        assert_eq!(ids, vec!["production"]);
    }

    #[test]
    fn test_group_selection_respects_missing_data() {
        let mut config = sample();
        config.ssl_email = None;
        let plan = Plan::build(&config, &Selection::group(TaskGroup::Ssl)).unwrap();
        assert!(plan.is_empty());
        assert_eq!(decisions(&plan).len(), 1);
    }

    #[test]
    fn test_missing_keys_skip_key_step() {
        let mut config = sample();
        config.authorized_keys.clear();
        let plan = Plan::build(&config, &Selection::all()).unwrap();
        let (_, decision) = decisions(&plan)
            .into_iter()
            .find(|(id, _)| *id == "authorized-keys")
            .unwrap();
        assert!(matches!(decision, Decision::Skip(_)));
    }

    #[test]
    fn test_only_and_skip() {
        let selection = Selection {
            only: vec!["ssh-hardening".to_string(), "kernel-tuning".to_string()],
            skip: vec!["kernel-tuning".to_string()],
            ..Selection::default()
        };
        let plan = Plan::build(&sample(), &selection).unwrap();

        assert_eq!(
            decisions(&plan),
            vec![
                ("ssh-hardening", Decision::Run),
                (
                    "kernel-tuning",
                    Decision::Skip("excluded by --skip".to_string())
                ),
            ]
        );
    }

    #[test]
    fn test_unknown_step_rejected() {
        let selection = Selection {
            only: vec!["reboot".to_string()],
            ..Selection::default()
        };
        let err = Plan::build(&sample(), &selection).unwrap_err();
        assert!(err.to_string().contains("Unknown step 'reboot'"));
    }
}
