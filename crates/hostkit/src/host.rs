//! The host effects trait
//!
//! Everything a provisioning step does to the machine goes through [`Host`].
//! The binary supplies a real implementation; tests use [`crate::MemoryHost`].

use crate::error::Result;
use crate::types::{CommandOutput, CommandSpec};
use std::path::Path;

/// Capability to observe and mutate the target machine
///
/// Implementations decide how privilege is obtained. File writes on paths the
/// current user cannot write are expected to escalate transparently, and to
/// fail with [`crate::Error::PermissionDenied`] only when escalation is
/// impossible.
pub trait Host {
    /// Run a command to completion and return its result
    ///
    /// A non-zero exit is *not* an error here; it is reported through
    /// [`CommandOutput::success`]. `Err` means the command never ran.
    fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput>;

    /// Read a whole file
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Append text to an existing file
    fn append(&self, path: &Path, text: &str) -> Result<()>;

    /// Replace the contents of an existing file
    fn write(&self, path: &Path, contents: &str) -> Result<()>;

    /// Whether a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Download `url` into `dest`
    fn download(&self, url: &str, dest: &Path) -> Result<()>;

    /// Whether changes are only reported, never made
    ///
    /// Files created by earlier commands do not exist on a preview host.
    fn is_preview(&self) -> bool {
        false
    }
}
