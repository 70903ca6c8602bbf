//! In-memory host
//!
//! Files live in a map, commands are recorded instead of executed. A handful
//! of file-shaping commands (`touch`, `mkdir`, `cp`) are simulated so steps
//! that create a file and then edit it behave as they would on a machine.

use crate::error::{Error, Result};
use crate::host::Host;
use crate::types::{CommandOutput, CommandSpec};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<PathBuf, String>,
    dirs: BTreeSet<PathBuf>,
    read_only: BTreeSet<PathBuf>,
    commands: Vec<CommandSpec>,
    failures: Vec<(String, CommandOutput)>,
    stdout: Vec<(String, String)>,
    downloads: Vec<(String, PathBuf)>,
}

/// A fake machine for tests and previews
#[derive(Debug, Default)]
pub struct MemoryHost {
    state: RefCell<State>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a file
    pub fn add_file(&self, path: impl Into<PathBuf>, contents: &str) {
        self.state
            .borrow_mut()
            .files
            .insert(path.into(), contents.to_string());
    }

    /// Current contents of a file
    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        self.state.borrow().files.get(path.as_ref()).cloned()
    }

    /// Make appends and writes to `path` fail with permission denied
    pub fn deny_writes(&self, path: impl Into<PathBuf>) {
        self.state.borrow_mut().read_only.insert(path.into());
    }

    /// Any command whose display form contains `needle` exits with `code`
    pub fn fail_when(&self, needle: &str, code: i32, stderr: &str) {
        self.state
            .borrow_mut()
            .failures
            .push((needle.to_string(), CommandOutput::failed(code, stderr)));
    }

    /// Any command whose display form contains `needle` prints `stdout`
    pub fn respond_with(&self, needle: &str, stdout: &str) {
        self.state
            .borrow_mut()
            .stdout
            .push((needle.to_string(), stdout.to_string()));
    }

    /// Every command run so far, in order
    pub fn commands(&self) -> Vec<CommandSpec> {
        self.state.borrow().commands.clone()
    }

    /// Display form of every command run so far
    pub fn command_lines(&self) -> Vec<String> {
        self.state
            .borrow()
            .commands
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Downloads requested so far as `(url, dest)`
    pub fn downloads(&self) -> Vec<(String, PathBuf)> {
        self.state.borrow().downloads.clone()
    }

    fn simulate(state: &mut State, cmd: &CommandSpec) {
        let paths = cmd.args.iter().filter(|a| !a.starts_with('-'));
        match cmd.program.as_str() {
            "touch" => {
                for path in paths {
                    state.files.entry(PathBuf::from(path)).or_default();
                }
            }
            "mkdir" => {
                for path in paths {
                    state.dirs.insert(PathBuf::from(path));
                }
            }
            "cp" => {
                let paths: Vec<&String> = paths.collect();
                if let [from, to] = paths.as_slice()
                    && let Some(contents) = state.files.get(Path::new(from.as_str())).cloned()
                {
                    state.files.insert(PathBuf::from(to.as_str()), contents);
                }
            }
            _ => {}
        }
    }
}

impl Host for MemoryHost {
    fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        let mut state = self.state.borrow_mut();
        state.commands.push(cmd.clone());

        let line = cmd.to_string();
        if let Some((_, output)) = state
            .failures
            .iter()
            .find(|(needle, _)| line.contains(needle.as_str()))
        {
            return Ok(output.clone());
        }

        Self::simulate(&mut state, cmd);

        let mut output = CommandOutput::ok();
        if let Some((_, stdout)) = state
            .stdout
            .iter()
            .find(|(needle, _)| line.contains(needle.as_str()))
        {
            output.stdout = stdout.as_bytes().to_vec();
        }
        Ok(output)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.file(path)
            .ok_or_else(|| Error::NotFound(path.to_path_buf()))
    }

    fn append(&self, path: &Path, text: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.read_only.contains(path) {
            return Err(Error::PermissionDenied(path.to_path_buf()));
        }
        let contents = state
            .files
            .get_mut(path)
            .ok_or_else(|| Error::NotFound(path.to_path_buf()))?;
        contents.push_str(text);
        Ok(())
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.read_only.contains(path) {
            return Err(Error::PermissionDenied(path.to_path_buf()));
        }
        let existing = state
            .files
            .get_mut(path)
            .ok_or_else(|| Error::NotFound(path.to_path_buf()))?;
        *existing = contents.to_string();
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.state.borrow();
        state.files.contains_key(path) || state.dirs.contains(path)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.downloads.push((url.to_string(), dest.to_path_buf()));
        state.files.insert(dest.to_path_buf(), String::new());
        Ok(())
    }
}
