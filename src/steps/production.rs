//! Production services (supervisor + nginx) and Let's Encrypt TLS

use anyhow::{Context, Result};
use hostkit::CommandSpec;
use std::path::PathBuf;

use super::{Applicability, Step, StepContext, TaskGroup};
use crate::config::ProvisioningConfig;

pub const SUPERVISOR_CONF: &str = "/etc/supervisor/supervisord.conf";
pub const SUPERVISOR_SOCKET_SECTION: &str = "[unix_http_server]";
pub const LETSENCRYPT_LIVE: &str = "/etc/letsencrypt/live";

#[derive(Debug)]
pub struct Production;

impl Step for Production {
    fn id(&self) -> &'static str {
        "production"
    }

    fn description(&self) -> &'static str {
        "Setting up production"
    }

    fn group(&self) -> TaskGroup {
        TaskGroup::Production
    }

    fn applicability(&self, config: &ProvisioningConfig) -> Applicability {
        if config.site_name.is_none() {
            Applicability::Missing("site_name not set".to_string())
        } else if !config.production {
            Applicability::OptIn("production not enabled".to_string())
        } else {
            Applicability::Ready
        }
    }

    fn run(&self, ctx: &mut StepContext) -> Result<()> {
        let config = ctx.config;
        let user = config.username.as_str();
        let owner = format!("chown={0}:{0}", user);

        ctx.run(
            CommandSpec::sudo("bench", ["setup", "production", user, "--yes"])
                .current_dir(config.bench_dir()),
        )?;
        ctx.run(CommandSpec::sudo("usermod", ["-aG", user, "www-data"]))?;

        // Lets the bench user talk to supervisord without sudo
        ctx.ensure_in_section(SUPERVISOR_SOCKET_SECTION, &owner, SUPERVISOR_CONF)?;
        ctx.ensure_in_section(SUPERVISOR_SOCKET_SECTION, "chmod=0760", SUPERVISOR_CONF)?;

        ctx.run(CommandSpec::sudo("systemctl", ["restart", "supervisor"]))?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct Tls;

impl Tls {
    /// Directory certbot writes the live certificate for `site` to
    pub fn live_dir(site: &str) -> PathBuf {
        PathBuf::from(LETSENCRYPT_LIVE).join(site)
    }
}

impl Step for Tls {
    fn id(&self) -> &'static str {
        "tls"
    }

    fn description(&self) -> &'static str {
        "Setting up SSL"
    }

    fn group(&self) -> TaskGroup {
        TaskGroup::Ssl
    }

    fn applicability(&self, config: &ProvisioningConfig) -> Applicability {
        if config.site_name.is_none() {
            Applicability::Missing("site_name not set".to_string())
        } else if config.ssl_email.is_none() {
            Applicability::Missing("ssl_email not set".to_string())
        } else {
            Applicability::Ready
        }
    }

    fn run(&self, ctx: &mut StepContext) -> Result<()> {
        let config = ctx.config;
        let site = config.site_name.as_deref().context("site_name not set")?;
        let email = config.ssl_email.as_deref().context("ssl_email not set")?;
        let www = format!("www.{}", site);

        ctx.run(CommandSpec::sudo("snap", ["install", "core"]))?;
        ctx.run(CommandSpec::sudo("snap", ["refresh", "core"]))?;
        ctx.run(CommandSpec::sudo("snap", ["install", "--classic", "certbot"]))?;
        ctx.run(CommandSpec::sudo(
            "ln",
            ["-sf", "/snap/bin/certbot", "/usr/bin/certbot"],
        ))?;
        ctx.run(CommandSpec::sudo(
            "certbot",
            [
                "certonly",
                "--nginx",
                "--non-interactive",
                "--agree-tos",
                "-m",
                email,
                "-d",
                site,
                "-d",
                www.as_str(),
            ],
        ))?;

        let live = Self::live_dir(site);
        let certificate = live.join("fullchain.pem").display().to_string();
        let key = live.join("privkey.pem").display().to_string();

        // The live directory is root-only, so test through sudo
        let found = ctx
            .probe(CommandSpec::sudo("test", ["-f", certificate.as_str()]))?
            .success();
        if !found {
            crate::ui::warn(&format!(
                "No certificate at {}, leaving nginx unchanged",
                certificate
            ));
            return Ok(());
        }

        let bench_dir = config.bench_dir();
        ctx.run(
            CommandSpec::new("bench", ["set-ssl-certificate", site, certificate.as_str()])
                .current_dir(&bench_dir),
        )?;
        ctx.run(
            CommandSpec::new("bench", ["set-ssl-key", site, key.as_str()]).current_dir(&bench_dir),
        )?;
        ctx.run(CommandSpec::new("bench", ["setup", "nginx", "--yes"]).current_dir(&bench_dir))?;
        ctx.run(CommandSpec::sudo("systemctl", ["restart", "nginx"]))?;
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

    #[test]
    fn test_production_patches_supervisor_socket() {
        let host = server();
        let mut config = sample();
        config.production = true;

        run(&Production, &config, &host);
        run(&Production, &config, &host);

        assert_eq!(
            host.file(SUPERVISOR_CONF).unwrap(),
            "[unix_http_server]\nfile=/var/run/supervisor.sock\nchmod=0700\nchown=frappe:frappe\nchmod=0760\n\n[supervisord]\nlogfile=/var/log/supervisor/supervisord.log\n"
        );
        assert_eq!(
            host.command_lines()[..3],
            [
                "sudo bench setup production frappe --yes",
                "sudo usermod -aG frappe www-data",
                "sudo systemctl restart supervisor",
            ]
        );
    }

    #[test]
    fn test_production_without_socket_section_aborts() {
        let host = server();
        host.add_file(SUPERVISOR_CONF, "[supervisord]\n");
        let mut config = sample();
        config.production = true;

        let err = run_step(
            &Production,
            &config,
            &host,
            &mut ScriptedPrompter::default(),
            ErrorPolicy::Continue,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("[unix_http_server]"));
    }

    #[test]
    fn test_production_is_opt_in() {
        let config = sample();
        assert!(matches!(
            Production.applicability(&config),
            Applicability::OptIn(_)
        ));
    }

    #[test]
    fn test_tls_with_certificate() {
        let host = server();
        run(&Tls, &sample(), &host);

        let lines = host.command_lines();
        assert!(lines.contains(
            &"sudo certbot certonly --nginx --non-interactive --agree-tos -m ops@example.com -d erp.example.com -d www.erp.example.com"
                .to_string()
        ));
        assert_eq!(
            lines[lines.len() - 4..],
            [
                "bench set-ssl-certificate erp.example.com /etc/letsencrypt/live/erp.example.com/fullchain.pem",
                "bench set-ssl-key erp.example.com /etc/letsencrypt/live/erp.example.com/privkey.pem",
                "bench setup nginx --yes",
                "sudo systemctl restart nginx",
            ]
        );
    }

    #[test]
    fn test_tls_without_certificate_leaves_nginx() {
        let host = server();
        host.fail_when("test -f", 1, "");

        let failures = run_step(
            &Tls,
            &sample(),
            &host,
            &mut ScriptedPrompter::default(),
            ErrorPolicy::FailFast,
        )
        .unwrap();

        assert!(failures.is_empty());
        let lines = host.command_lines();
        assert!(lines.last().unwrap().starts_with("sudo test -f"));
        assert!(!lines.iter().any(|l| l.contains("set-ssl")));
    }

    #[test]
    fn test_tls_requires_email() {
        let mut config = sample();
        config.ssl_email = None;
        assert!(matches!(Tls.applicability(&config), Applicability::Missing(_)));
    }
}
