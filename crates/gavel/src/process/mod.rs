//! Process execution boundary
//!
//! Judged programs run behind the [`ProcessRunner`] trait. [`LocalRunner`]
//! spawns plain child processes; a sandboxing runner can be swapped in
//! without touching the judge.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use crate::process::local::LocalRunner;
#[cfg(test)]
pub(crate) use crate::process::scripted::{ScriptedRun, ScriptedRunner};

mod group;
mod local;
#[cfg(test)]
mod scripted;

/// Errors that occur while launching or supervising a process
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("command failed: {0}")]
    CommandFailed(String),

    /// Feeding, draining or waiting on a running child failed
    #[error("failed to supervise process: {0}")]
    Supervise(#[from] std::io::Error),
}

/// A fully resolved command line plus the environment it runs in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub command: Vec<String>,
    pub working_dir: PathBuf,
    pub env: HashMap<String, String>,
}

impl Invocation {
    pub fn new(command: Vec<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command,
            working_dir: working_dir.into(),
            env: HashMap::new(),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs<'a>(mut self, vars: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        for (key, value) in vars {
            self.env.insert(key.clone(), value.clone());
        }
        self
    }
}

/// What a finished (or abandoned) run produced
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    /// Exit code if the program exited normally
    pub exit_code: Option<i32>,

    pub stdout: Vec<u8>,

    pub stderr: Vec<u8>,

    /// Peak resident memory growth of the child and its descendants, in
    /// kilobytes
    pub memory_kb: u64,

    pub wall_time: Duration,

    /// The time budget elapsed and the child was killed
    pub timed_out: bool,
}

impl RunOutput {
    /// Check if the program ran to completion with exit code 0
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Runs one program to completion with the given stdin
#[async_trait]
pub trait ProcessRunner: Send + Sync + std::fmt::Debug {
    async fn run(
        &self,
        invocation: &Invocation,
        stdin: &[u8],
        time_budget: Duration,
    ) -> Result<RunOutput, ProcessError>;
}

/// Resolve the program in a command to a path the child can execute.
///
/// Bare command names (like `g++`) are looked up in the host's PATH and
/// canonicalized. Relative paths (like `./main`) are anchored at
/// `working_dir`, since the child does not inherit our working directory.
/// Absolute paths are left unchanged.
pub fn resolve_command(command: &mut [String], working_dir: &Path) -> Result<(), ProcessError> {
    let first = match command.first_mut() {
        Some(first) => first,
        None => return Ok(()),
    };

    if first.contains('/') {
        let path = Path::new(first.as_str());
        if path.is_relative() {
            *first = working_dir.join(path).to_string_lossy().into_owned();
        }
        return Ok(());
    }

    let path_var = std::env::var("PATH").unwrap_or_default();
    for dir in path_var.split(':') {
        let candidate = Path::new(dir).join(&*first);
        if candidate.is_file() {
            *first = std::fs::canonicalize(&candidate)
                .unwrap_or(candidate)
                .to_string_lossy()
                .into_owned();
            return Ok(());
        }
    }

    Err(ProcessError::CommandFailed(format!(
        "command '{first}' not found in PATH",
    )))
}
