//! Command types shared by every host

use std::fmt;
use std::path::PathBuf;

/// A command to run on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,
    /// Arguments, passed verbatim (no shell parsing)
    pub args: Vec<String>,
    /// Run through sudo
    pub privileged: bool,
    /// Working directory
    pub cwd: Option<PathBuf>,
    /// Capture stdout/stderr instead of streaming them to the terminal
    pub capture: bool,
    /// Values masked when the command is displayed or logged
    pub secrets: Vec<String>,
}

impl CommandSpec {
    /// Create an unprivileged command
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            privileged: false,
            cwd: None,
            capture: false,
            secrets: Vec::new(),
        }
    }

    /// Create a command that runs with elevated privileges
    pub fn sudo<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(program, args).privileged()
    }

    /// Create a `/bin/bash -c` command, for pipelines like `curl ... | bash`
    pub fn shell(script: &str) -> Self {
        Self::new("/bin/bash", ["-c", script])
    }

    /// Mark the command as privileged
    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    /// Set the working directory
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Capture output, for probes whose stdout is parsed
    pub fn captured(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Mask `value` wherever it appears in the displayed command line
    pub fn secret(mut self, value: &str) -> Self {
        if !value.is_empty() {
            self.secrets.push(value.to_string());
        }
        self
    }

    /// Whether any argument (or the program) contains `needle`
    pub fn mentions(&self, needle: &str) -> bool {
        self.program.contains(needle) || self.args.iter().any(|a| a.contains(needle))
    }

    fn mask(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), "****"))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.privileged {
            write!(f, "sudo ")?;
        }
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            let arg = self.mask(arg);
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Output from a finished command
///
/// Streamed commands leave `stdout` and `stderr` empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// A successful run with no output
    pub fn ok() -> Self {
        Self {
            code: Some(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    /// A failed run with the given exit code and stderr
    pub fn failed(code: i32, stderr: &str) -> Self {
        Self {
            code: Some(code),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    /// Whether the command exited with status 0
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Get stdout as a string
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_plain_and_sudo() {
        let cmd = CommandSpec::new("apt-get", ["update"]);
        assert_eq!(cmd.to_string(), "apt-get update");

        let cmd = CommandSpec::sudo("systemctl", ["restart", "ssh"]);
        assert_eq!(cmd.to_string(), "sudo systemctl restart ssh");
    }

    #[test]
    fn test_display_quotes_whitespace() {
        let cmd = CommandSpec::shell("curl -fsSL x | bash");
        assert_eq!(cmd.to_string(), "/bin/bash -c 'curl -fsSL x | bash'");
    }

    #[test]
    fn test_display_masks_secrets() {
        let cmd = CommandSpec::new(
            "bench",
            ["new-site", "erp.example.com", "--admin-password", "hunter2"],
        )
        .secret("hunter2");
        assert_eq!(
            cmd.to_string(),
            "bench new-site erp.example.com --admin-password ****"
        );
        assert!(cmd.mentions("hunter2"));
    }

    #[test]
    fn test_empty_secret_is_ignored() {
        let cmd = CommandSpec::new("echo", ["hi"]).secret("");
        assert!(cmd.secrets.is_empty());
        assert_eq!(cmd.to_string(), "echo hi");
    }

    #[test]
    fn test_output_success() {
        assert!(CommandOutput::ok().success());
        let failed = CommandOutput::failed(100, "E: Unable to locate package");
        assert!(!failed.success());
        assert_eq!(failed.stderr_str(), "E: Unable to locate package");

        let killed = CommandOutput {
            code: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
        };
        assert!(!killed.success());
    }
}
