//! SSH access: authorized keys for the bench user and daemon hardening

use anyhow::Result;
use hostkit::CommandSpec;

use super::{Applicability, Step, StepContext, TaskGroup};
use crate::config::ProvisioningConfig;

pub const SSHD_CONFIG: &str = "/etc/ssh/sshd_config";

/// Separator appended after each key
///
/// A single space rather than an empty line: under prefix matching an empty
/// line would count as present in any non-empty file.
pub const KEY_SEPARATOR: &str = " ";

#[derive(Debug)]
pub struct AuthorizedKeys;

impl Step for AuthorizedKeys {
    fn id(&self) -> &'static str {
        "authorized-keys"
    }

    fn description(&self) -> &'static str {
        "Adding authorized keys"
    }

    fn group(&self) -> TaskGroup {
        TaskGroup::ServerConfig
    }

    fn applicability(&self, config: &ProvisioningConfig) -> Applicability {
        if config.authorized_keys.is_empty() {
            Applicability::Missing("no authorized_keys configured".to_string())
        } else {
            Applicability::Ready
        }
    }

    fn run(&self, ctx: &mut StepContext) -> Result<()> {
        let config = ctx.config;
        let ssh_dir = config.home_dir().join(".ssh");
        let keys_file = ssh_dir.join("authorized_keys");
        let ssh_dir_str = ssh_dir.display().to_string();
        let keys_file_str = keys_file.display().to_string();
        let owner = format!("{0}:{0}", config.username);

        ctx.run(CommandSpec::sudo("mkdir", ["-p", ssh_dir_str.as_str()]))?;
        ctx.run(CommandSpec::sudo("touch", [keys_file_str.as_str()]))?;

        for (label, key) in &config.authorized_keys {
            ctx.ensure_line(&format!("# {}", label), &keys_file)?;
            ctx.ensure_line(key, &keys_file)?;
            ctx.ensure_line(KEY_SEPARATOR, &keys_file)?;
        }

        ctx.run(CommandSpec::sudo("chown", ["-R", owner.as_str(), ssh_dir_str.as_str()]))?;
        ctx.run(CommandSpec::sudo("chmod", ["700", ssh_dir_str.as_str()]))?;
        ctx.run(CommandSpec::sudo("chmod", ["644", keys_file_str.as_str()]))?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SshHardening;

impl Step for SshHardening {
    fn id(&self) -> &'static str {
        "ssh-hardening"
    }

    fn description(&self) -> &'static str {
        "Updating ssh config"
    }

    fn group(&self) -> TaskGroup {
        TaskGroup::ServerConfig
    }

    fn run(&self, ctx: &mut StepContext) -> Result<()> {
        if let Some(port) = ctx.config.custom_ssh_port() {
            ctx.ensure_line(&format!("Port {}", port), SSHD_CONFIG)?;
        }
        ctx.ensure_line("PermitRootLogin no", SSHD_CONFIG)?;
        ctx.run(CommandSpec::sudo("systemctl", ["restart", "ssh"]))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::fixture::sample;
    use crate::engine::ErrorPolicy;
    use crate::prompt::ScriptedPrompter;
    use crate::steps::testing::{run_step, server};
    use hostkit::MemoryHost;

    const KEYS: &str = "/home/frappe/.ssh/authorized_keys";

    fn run(step: &dyn Step, config: &ProvisioningConfig, host: &MemoryHost) {
        run_step(
            step,
            config,
            host,
            &mut ScriptedPrompter::default(),
            ErrorPolicy::Continue,
        )
        .unwrap();
    }

    fn count(host: &MemoryHost, path: &str, prefix: &str) -> usize {
        host.file(path)
            .unwrap()
            .lines()
            .filter(|l| l.starts_with(prefix))
            .count()
    }

    #[test]
    fn test_keys_written_with_label_and_separator() {
        let mut config = sample();
        config.authorized_keys.truncate(1);
        let host = server();

        run(&AuthorizedKeys, &config, &host);

        assert_eq!(
            host.file(KEYS).unwrap(),
            "# laptop\nssh-ed25519 AAAAC3Nza laptop\n \n"
        );
        assert_eq!(
            host.command_lines(),
            vec![
                "sudo mkdir -p /home/frappe/.ssh",
                "sudo touch /home/frappe/.ssh/authorized_keys",
                "sudo chown -R frappe:frappe /home/frappe/.ssh",
                "sudo chmod 700 /home/frappe/.ssh",
                "sudo chmod 644 /home/frappe/.ssh/authorized_keys",
            ]
        );
    }

    #[test]
    fn test_keys_keep_file_order_and_existing_entries() {
        let config = sample();
        let host = server();
        host.add_file(KEYS, "ssh-rsa AAAAB3Nza existing\n");

        run(&AuthorizedKeys, &config, &host);
        run(&AuthorizedKeys, &config, &host);

        // The separator line is shared: once present it is never appended again
        assert_eq!(
            host.file(KEYS).unwrap(),
            "ssh-rsa AAAAB3Nza existing\n# laptop\nssh-ed25519 AAAAC3Nza laptop\n \n# ci\nssh-ed25519 AAAAC3Nzb ci\n"
        );
    }

    #[test]
    fn test_no_keys_is_missing() {
        let mut config = sample();
        config.authorized_keys.clear();
        assert!(matches!(
            AuthorizedKeys.applicability(&config),
            Applicability::Missing(_)
        ));
    }

    #[test]
    fn test_custom_port_and_root_login() {
        let config = sample();
        let host = server();

        run(&SshHardening, &config, &host);
        run(&SshHardening, &config, &host);

        assert_eq!(count(&host, SSHD_CONFIG, "Port 2222"), 1);
        assert_eq!(count(&host, SSHD_CONFIG, "PermitRootLogin no"), 1);
        assert_eq!(
            host.command_lines(),
            vec!["sudo systemctl restart ssh", "sudo systemctl restart ssh"]
        );
    }

    #[test]
    fn test_default_port_appends_no_port_line() {
        let host = server();
        for port in [None, Some(22)] {
            let mut config = sample();
            config.ssh_port = port;
            run(&SshHardening, &config, &host);
            run(&SshHardening, &config, &host);
        }

        assert_eq!(count(&host, SSHD_CONFIG, "Port"), 0);
        assert_eq!(count(&host, SSHD_CONFIG, "PermitRootLogin no"), 1);
    }
}
