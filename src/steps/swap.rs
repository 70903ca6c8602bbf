//! Swap file creation

use anyhow::Result;
use chrono::Local;
use hostkit::CommandSpec;
use std::path::Path;

use super::{Applicability, Step, StepContext, TaskGroup};
use crate::config::ProvisioningConfig;
use crate::prompt::Prompter;

pub const SWAPFILE: &str = "/swapfile";
pub const FSTAB: &str = "/etc/fstab";
pub const FSTAB_ENTRY: &str = "/swapfile none swap sw 0 0";

#[derive(Debug)]
pub struct Swap;

impl Step for Swap {
    fn id(&self) -> &'static str {
        "swap"
    }

    fn description(&self) -> &'static str {
        "Creating swap file"
    }

    fn group(&self) -> TaskGroup {
        TaskGroup::ServerConfig
    }

    fn applicability(&self, config: &ProvisioningConfig) -> Applicability {
        match config.swap_size {
            Some(_) => Applicability::Ready,
            None => Applicability::OptIn("swap_size not set".to_string()),
        }
    }

    fn run(&self, ctx: &mut StepContext) -> Result<()> {
        if ctx.host.exists(Path::new(SWAPFILE)) {
            ctx.skip(format!("{} already exists", SWAPFILE));
            return Ok(());
        }

        let size = resolve_swap_size(ctx.config.swap_size.as_deref(), &mut *ctx.prompter)?;
        let length = format!("{}G", size);

        ctx.run(CommandSpec::sudo("fallocate", ["-l", length.as_str(), SWAPFILE]))?;
        ctx.run(CommandSpec::sudo("chmod", ["600", SWAPFILE]))?;
        ctx.run(CommandSpec::sudo("mkswap", [SWAPFILE]))?;
        ctx.run(CommandSpec::sudo("swapon", [SWAPFILE]))?;

        let backup = format!("{}.bak.{}", FSTAB, Local::now().format("%Y%m%d%H%M%S"));
        ctx.run(CommandSpec::sudo("cp", [FSTAB, backup.as_str()]))?;
        ctx.ensure_line(FSTAB_ENTRY, FSTAB)?;
        Ok(())
    }
}

/// Swap size in GB from a digit-only string
pub fn parse_swap_size(value: &str) -> Option<u32> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    value.parse().ok().filter(|size| *size > 0)
}

/// Use the configured size, or ask until a valid one is entered
pub fn resolve_swap_size(configured: Option<&str>, prompter: &mut dyn Prompter) -> Result<u32> {
    if let Some(size) = configured.and_then(parse_swap_size) {
        return Ok(size);
    }
    if let Some(value) = configured {
        log::warn!("Ignoring invalid swap_size '{}'", value);
    }

    loop {
        let answer = prompter.input("Swap size in GB")?;
        match parse_swap_size(answer.trim()) {
            Some(size) => return Ok(size),
            None => crate::ui::warn("Enter a whole number of gigabytes, e.g. 2"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::fixture::sample;
    use crate::engine::ErrorPolicy;
    use crate::prompt::ScriptedPrompter;
    use crate::steps::testing::{run_step, server};

    #[test]
    fn test_parse_swap_size() {
        assert_eq!(parse_swap_size("2"), Some(2));
        assert_eq!(parse_swap_size("16"), Some(16));
        assert_eq!(parse_swap_size("0"), None);
        assert_eq!(parse_swap_size(""), None);
        assert_eq!(parse_swap_size("2G"), None);
        assert_eq!(parse_swap_size("-1"), None);
        assert_eq!(parse_swap_size(" 2"), None);
    }

    #[test]
    fn test_configured_size_does_not_prompt() {
        let mut prompter = ScriptedPrompter::default();
        assert_eq!(resolve_swap_size(Some("2"), &mut prompter).unwrap(), 2);
        assert!(prompter.prompts.is_empty());
    }

    #[test]
    fn test_missing_size_prompts_until_digits() {
        let mut prompter = ScriptedPrompter::new(["", "abc", "0", "4"]);
        assert_eq!(resolve_swap_size(None, &mut prompter).unwrap(), 4);
        assert_eq!(prompter.prompts.len(), 4);
    }

    #[test]
    fn test_invalid_configured_size_prompts() {
        let mut prompter = ScriptedPrompter::new(["3"]);
        assert_eq!(resolve_swap_size(Some("two"), &mut prompter).unwrap(), 3);
        assert_eq!(prompter.prompts.len(), 1);
    }

    #[test]
    fn test_swap_step_commands() {
        let host = server();
        let mut prompter = ScriptedPrompter::default();
        run_step(&Swap, &sample(), &host, &mut prompter, ErrorPolicy::Continue).unwrap();

        let lines = host.command_lines();
        assert_eq!(
            lines[..4],
            [
                "sudo fallocate -l 2G /swapfile",
                "sudo chmod 600 /swapfile",
                "sudo mkswap /swapfile",
                "sudo swapon /swapfile",
            ]
        );
        assert!(lines[4].starts_with("sudo cp /etc/fstab /etc/fstab.bak."));
        assert_eq!(
            host.file(FSTAB).unwrap(),
            "UUID=1234 / ext4 errors=remount-ro 0 1\n/swapfile none swap sw 0 0\n"
        );
        assert!(prompter.prompts.is_empty());
    }

    #[test]
    fn test_existing_swapfile_is_left_alone() {
        let host = server();
        host.add_file(SWAPFILE, "");
        run_step(
            &Swap,
            &sample(),
            &host,
            &mut ScriptedPrompter::default(),
            ErrorPolicy::Continue,
        )
        .unwrap();
        assert!(host.commands().is_empty());
    }

    #[test]
    fn test_unset_size_is_opt_in() {
        let mut config = sample();
        config.swap_size = None;
        assert!(matches!(Swap.applicability(&config), Applicability::OptIn(_)));
    }
}
