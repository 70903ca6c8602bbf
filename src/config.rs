//! Provisioning config - the one file read at startup
//!
//! JSON (`config.json`) or TOML, picked by extension. Everything is validated
//! before any step touches the machine.

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::ErrorPolicy;
use crate::paths;

/// The app every bench is initialised from
pub const FRAPPE_APP: &str = "frappe";

fn default_bench_name() -> String {
    "frappe-bench".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvisioningConfig {
    /// Account the bench runs as
    pub username: String,

    pub dependencies: Dependencies,

    /// label -> public key, in file order
    #[serde(default, deserialize_with = "ordered::entries")]
    pub authorized_keys: Vec<(String, String)>,

    #[serde(default)]
    pub ssh_port: Option<u16>,

    /// app name -> source, in file order
    #[serde(default, deserialize_with = "ordered::entries")]
    pub apps: Vec<(String, AppSource)>,

    #[serde(default = "default_bench_name")]
    pub bench_name: String,

    #[serde(default)]
    pub site_name: Option<String>,

    #[serde(default)]
    pub mariadb_root_password: Option<String>,

    #[serde(default)]
    pub admin_password: Option<String>,

    #[serde(default)]
    pub dns_multitenant: bool,

    /// Swap size in GB; present but not a positive integer means "ask"
    #[serde(default, deserialize_with = "text::optional")]
    pub swap_size: Option<String>,

    #[serde(default)]
    pub ssl_email: Option<String>,

    /// Include the supervisor/nginx production setup in a full run
    #[serde(default)]
    pub production: bool,

    #[serde(default)]
    pub on_error: ErrorPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Dependencies {
    /// Interpreter version, e.g. "3.10"
    #[serde(deserialize_with = "text::required")]
    pub python: String,

    /// MariaDB server version, e.g. "10.6"
    #[serde(deserialize_with = "text::required")]
    pub mariadb: String,

    /// Node.js major version, e.g. "18"
    #[serde(deserialize_with = "text::required")]
    pub node: String,

    pub wkhtmltopdf: Wkhtmltopdf,

    /// InnoDB buffer pool in MB; unset or 0 means 60% of free memory
    #[serde(default)]
    pub innodb_buffer_pool_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Wkhtmltopdf {
    /// Release tag on the wkhtmltopdf packaging repo, e.g. "0.12.6.1-2"
    #[serde(deserialize_with = "text::required")]
    pub version: String,
    /// Package file in that release, e.g. "wkhtmltox_0.12.6.1-2.jammy_amd64.deb"
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppSource {
    pub branch: String,
    pub url: String,
}

impl ProvisioningConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_json(&content),
        }
        .with_context(|| format!("Invalid config in {}", path.display()))?;

        config.validate()?;
        log::debug!("Loaded config for user '{}'", config.username);
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reject configs that would fail halfway through a run
    pub fn validate(&self) -> Result<()> {
        let username = Regex::new(r"^[a-z_][a-z0-9_-]*$").context("Invalid username pattern")?;
        if !username.is_match(&self.username) {
            bail!("Invalid username '{}'", self.username);
        }

        if !self.apps.is_empty() && self.frappe().is_none() {
            bail!("'apps' must contain a '{}' entry", FRAPPE_APP);
        }

        if let Some(site) = &self.site_name {
            let hostname = Regex::new(
                r"^[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?)*$",
            )
            .context("Invalid hostname pattern")?;
            if !hostname.is_match(site) {
                bail!("Invalid site_name '{}'", site);
            }
        }

        if self.ssh_port == Some(0) {
            bail!("ssh_port must be between 1 and 65535");
        }

        if self.bench_name.is_empty() || self.bench_name.contains('/') {
            bail!("Invalid bench_name '{}'", self.bench_name);
        }

        Ok(())
    }

    /// Home directory of the bench user
    pub fn home_dir(&self) -> PathBuf {
        paths::user_home(&self.username)
    }

    /// Directory of the bench workspace
    pub fn bench_dir(&self) -> PathBuf {
        self.home_dir().join(&self.bench_name)
    }

    /// The framework app the bench is initialised from
    pub fn frappe(&self) -> Option<&AppSource> {
        self.apps
            .iter()
            .find(|(name, _)| name == FRAPPE_APP)
            .map(|(_, source)| source)
    }

    /// Every app except the framework, in file order
    pub fn extra_apps(&self) -> impl Iterator<Item = (&str, &AppSource)> {
        self.apps
            .iter()
            .filter(|(name, _)| name != FRAPPE_APP)
            .map(|(name, source)| (name.as_str(), source))
    }

    /// `ssh_port` when it differs from the default
    pub fn custom_ssh_port(&self) -> Option<u16> {
        self.ssh_port.filter(|port| *port != 22)
    }
}

/// Map deserialization that keeps file order
mod ordered {
    use serde::de::{Deserialize, Deserializer, Error, MapAccess, Visitor};
    use std::fmt;
    use std::marker::PhantomData;

    struct EntriesVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, value)) = access.next_entry::<String, V>()? {
                entries.push((key, value));
            }
            Ok(entries)
        }

        fn visit_unit<E: Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_none<E: Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    pub fn entries<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        deserializer.deserialize_any(EntriesVisitor(PhantomData))
    }
}

/// Values written either as strings or bare integers (`"18"` or `18`)
mod text {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Integer(u64),
    }

    impl From<Raw> for String {
        fn from(raw: Raw) -> Self {
            match raw {
                Raw::Text(s) => s,
                Raw::Integer(n) => n.to_string(),
            }
        }
    }

    pub fn required<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Raw::deserialize(deserializer).map(String::from)
    }

    pub fn optional<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Option::<Raw>::deserialize(deserializer).map(|raw| raw.map(String::from))
    }
}

#[cfg(test)]
pub(crate) mod fixture {
    use super::ProvisioningConfig;

    pub const SAMPLE: &str = r#"{
        "username": "frappe",
        "authorized_keys": {
            "laptop": "ssh-ed25519 AAAAC3Nza laptop",
            "ci": "ssh-ed25519 AAAAC3Nzb ci"
        },
        "ssh_port": 2222,
        "dependencies": {
            "python": "3.10",
            "mariadb": "10.6",
            "node": 18,
            "wkhtmltopdf": {
                "version": "0.12.6.1-2",
                "filename": "wkhtmltox_0.12.6.1-2.jammy_amd64.deb"
            }
        },
        "apps": {
            "frappe": {"branch": "version-15", "url": "https://github.com/frappe/frappe"},
            "erpnext": {"branch": "version-15", "url": "https://github.com/frappe/erpnext"},
            "hrms": {"branch": "version-15", "url": "https://github.com/frappe/hrms"}
        },
        "bench_name": "frappe-bench",
        "site_name": "erp.example.com",
        "mariadb_root_password": "rootpw",
        "admin_password": "adminpw",
        "dns_multitenant": true,
        "swap_size": "2",
        "ssl_email": "ops@example.com"
    }"#;

    /// A complete, valid config
    pub fn sample() -> ProvisioningConfig {
        ProvisioningConfig::from_json(SAMPLE).unwrap()
    }
}
