//! Config file resolution
//!
//! # Environment Variables
//!
//! - `BENCHFORGE_CONFIG` - Explicit config file (same as `--config`)
//! - `BENCHFORGE_CONFIG_DIR` - Override the config directory
//!
//! # Resolution Priority
//!
//! 1. `--config` / `BENCHFORGE_CONFIG`
//! 2. `./config.json` (the file sits next to the checkout on a fresh server)
//! 3. `<config_dir>/config.json`, then `<config_dir>/config.toml`

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "BENCHFORGE_CONFIG_DIR";

/// Get the benchforge config directory path
///
/// Priority:
/// 1. `BENCHFORGE_CONFIG_DIR` env var
/// 2. `XDG_CONFIG_HOME/benchforge`
/// 3. `~/.config/benchforge`
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("benchforge");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("benchforge");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Locate the provisioning config file
pub fn find_config(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        let path = expand(path);
        if !path.is_file() {
            bail!("Config file not found: {}", path.display());
        }
        return Ok(path);
    }

    let mut candidates = vec![PathBuf::from("config.json")];
    let dir = config_dir()?;
    candidates.push(dir.join("config.json"));
    candidates.push(dir.join("config.toml"));

    first_existing(&candidates).with_context(|| {
        format!(
            "No config found (looked in {})",
            candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    })
}

fn first_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.is_file()).cloned()
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Home directory of a local account on the target server
pub fn user_home(username: &str) -> PathBuf {
    if username == "root" {
        PathBuf::from("/root")
    } else {
        Path::new("/home").join(username)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Helper to run a test with temporary env var
    ///
    /// # Safety
    /// This function uses unsafe env::set_var/remove_var which can cause issues
    /// if other threads read environment variables concurrently.
    /// Only use in single-threaded test contexts.
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: Tests run in isolation and don't read env vars concurrently
        unsafe { env::set_var(key, value) };
        let result = f();
        match original {
            // SAFETY: Tests run in isolation
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    #[test]
    fn test_config_dir_env_override() {
        with_env_var(ENV_CONFIG_DIR, "/custom/benchforge", || {
            let result = config_dir().unwrap();
            assert_eq!(result, PathBuf::from("/custom/benchforge"));
        });
    }

    #[test]
    fn test_find_config_explicit_missing() {
        let err = find_config(Some("/definitely/not/here/config.json")).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_find_config_explicit_existing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("server.toml");
        std::fs::write(&file, "username = \"frappe\"\n").unwrap();

        let found = find_config(Some(file.to_str().unwrap())).unwrap();
        assert_eq!(found, file);
    }

    #[test]
    fn test_first_existing_prefers_order() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("config.json");
        let toml = dir.path().join("config.toml");
        std::fs::write(&toml, "").unwrap();

        assert_eq!(
            first_existing(&[json.clone(), toml.clone()]),
            Some(toml.clone())
        );

        std::fs::write(&json, "{}").unwrap();
        assert_eq!(first_existing(&[json.clone(), toml]), Some(json));
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(expand("/etc/benchforge"), PathBuf::from("/etc/benchforge"));
    }

    #[test]
    fn test_expand_with_tilde() {
        let result = expand("~/server.json");
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join("server.json"));
    }

    #[test]
    fn test_user_home() {
        assert_eq!(user_home("frappe"), PathBuf::from("/home/frappe"));
        assert_eq!(user_home("root"), PathBuf::from("/root"));
    }
}
