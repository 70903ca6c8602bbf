//! # hostkit
//!
//! Host effects for provisioning scripts.
//!
//! A provisioning run mutates the machine it runs on: it edits files under
//! `/etc`, runs package managers and restarts daemons. This crate puts all of
//! that behind the [`Host`] trait so the steps that drive it can be exercised
//! against an in-memory machine.
//!
//! ## Core Concepts
//!
//! - **Host**: runs commands and reads/appends/writes files on the target machine
//! - **CommandSpec**: a command line plus how to run it (sudo, cwd, captured or streamed)
//! - **CommandOutput**: exit code and captured output of a finished command
//! - **Line appender**: [`ensure_line_present`] and friends, the idempotent
//!   config-file edit primitive
//!
//! ## Example
//!
//! ```
//! use hostkit::{ensure_line_present, LineChange, MemoryHost};
//!
//! let host = MemoryHost::new();
//! host.add_file("/etc/ssh/sshd_config", "#Port 22\n");
//!
//! let first = ensure_line_present(&host, "PermitRootLogin no", "/etc/ssh/sshd_config").unwrap();
//! let second = ensure_line_present(&host, "PermitRootLogin no", "/etc/ssh/sshd_config").unwrap();
//!
//! assert_eq!(first, LineChange::Appended);
//! assert_eq!(second, LineChange::AlreadyPresent);
//! ```
//!
//! ## Prefix semantics
//!
//! A line counts as present when any existing line *starts with* it. A file
//! holding `Port 2222` therefore already "contains" `Port 22`, and changing a
//! value that was set before means removing the old line by hand first.

pub mod error;
pub mod host;
pub mod lines;
pub mod memory;
pub mod types;

// Re-export main types at crate root
pub use error::{Error, Result};
pub use host::Host;
pub use lines::{LineChange, ensure_block_present, ensure_line_in_section, ensure_line_present};
pub use memory::MemoryHost;
pub use types::{CommandOutput, CommandSpec};
