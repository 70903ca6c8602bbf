//! Idempotent config-file edits
//!
//! All three functions share one uniqueness test: a line is present when some
//! existing line of the file starts with it. A directive that is already set
//! keeps its first value until it is removed by hand.

use crate::error::{Error, Result};
use crate::host::Host;
use std::path::Path;

/// What an idempotent edit did to the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineChange {
    /// The file was left untouched
    AlreadyPresent,
    /// The line was appended at the end of the file
    Appended,
    /// The line was inserted inside an existing section
    Inserted,
}

impl LineChange {
    /// Whether the file was modified
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::AlreadyPresent)
    }
}

fn is_present(contents: &str, line: &str) -> bool {
    contents.lines().any(|existing| existing.starts_with(line))
}

/// Append `line` to `path` unless a line starting with it already exists
///
/// The file must exist. A missing trailing newline is repaired before the
/// append so the new text always lands on its own line.
pub fn ensure_line_present(
    host: &dyn Host,
    line: &str,
    path: impl AsRef<Path>,
) -> Result<LineChange> {
    let path = path.as_ref();
    let contents = host.read_to_string(path)?;

    if is_present(&contents, line) {
        return Ok(LineChange::AlreadyPresent);
    }

    let mut text = String::with_capacity(line.len() + 2);
    if !contents.is_empty() && !contents.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(line);
    text.push('\n');

    host.append(path, &text)?;
    Ok(LineChange::Appended)
}

/// Append a multi-line `block` unless its first line is already present
///
/// Only the first line is checked, so the block is appended whole or not at
/// all.
pub fn ensure_block_present(
    host: &dyn Host,
    block: &str,
    path: impl AsRef<Path>,
) -> Result<LineChange> {
    let path = path.as_ref();
    let anchor = block.lines().next().unwrap_or_default();
    let contents = host.read_to_string(path)?;

    if is_present(&contents, anchor) {
        return Ok(LineChange::AlreadyPresent);
    }

    let mut text = String::with_capacity(block.len() + 2);
    if !contents.is_empty() && !contents.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(block);
    if !block.ends_with('\n') {
        text.push('\n');
    }

    host.append(path, &text)?;
    Ok(LineChange::Appended)
}

/// Add `line` to the INI section whose header starts with `section`
///
/// The line goes after the last non-blank line of the section, before the
/// next `[header]`. Presence is checked against the whole file.
pub fn ensure_line_in_section(
    host: &dyn Host,
    section: &str,
    line: &str,
    path: impl AsRef<Path>,
) -> Result<LineChange> {
    let path = path.as_ref();
    let contents = host.read_to_string(path)?;

    if is_present(&contents, line) {
        return Ok(LineChange::AlreadyPresent);
    }

    let mut lines: Vec<&str> = contents.lines().collect();
    let header = lines
        .iter()
        .position(|l| l.starts_with(section))
        .ok_or_else(|| Error::AnchorNotFound {
            anchor: section.to_string(),
            path: path.to_path_buf(),
        })?;

    let section_end = lines[header + 1..]
        .iter()
        .position(|l| l.trim_start().starts_with('['))
        .map_or(lines.len(), |offset| header + 1 + offset);

    let mut insert_at = section_end;
    while insert_at > header + 1 && lines[insert_at - 1].trim().is_empty() {
        insert_at -= 1;
    }

    lines.insert(insert_at, line);
    let mut updated = lines.join("\n");
    updated.push('\n');

    host.write(path, &updated)?;
    Ok(LineChange::Inserted)
}
