use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::config::language::{
    CompileConfig, DEFAULT_RUN_PATH, FileExtension, Language, RunConfig,
};
pub use crate::config::problem::{ProblemFile, TestCaseEntry};
use crate::types::ResourceLimits;

pub mod language;
mod loader;
mod problem;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../gavel.example.toml");

/// Prefix for environment variable overrides, e.g. `GAVEL__JUDGE__MAX_PARALLEL=8`
pub const ENV_PREFIX: &str = "GAVEL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid characters in file extension")]
    InvalidFileExtChars,

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("language '{0}' not found in configuration")]
    LanguageNotFound(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How captured stdout is compared with the expected output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputComparison {
    /// Byte-for-byte equality
    #[default]
    Exact,
    /// Equality after stripping trailing whitespace from every line and
    /// trailing blank lines
    TrimTrailing,
}

/// Settings for the judging engine itself
#[derive(Debug, Clone, Deserialize)]
pub struct JudgeSettings {
    /// Maximum number of test cases executing at once
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Root directory of the file-backed code store
    #[serde(default = "default_code_dir")]
    pub code_dir: PathBuf,

    #[serde(default)]
    pub comparison: OutputComparison,

    /// Language used when a request names none
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Extra runner budget past the deadline before a child is killed
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,

    /// Period of child memory sampling
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
}

impl JudgeSettings {
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(1))
    }
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            code_dir: default_code_dir(),
            comparison: OutputComparison::default(),
            default_language: default_language(),
            kill_grace_ms: default_kill_grace_ms(),
            sample_interval_ms: default_sample_interval_ms(),
        }
    }
}

fn default_max_parallel() -> usize {
    4
}

fn default_code_dir() -> PathBuf {
    PathBuf::from("code-user")
}

fn default_language() -> String {
    "go".to_owned()
}

fn default_kill_grace_ms() -> u64 {
    100
}

fn default_sample_interval_ms() -> u64 {
    10
}

/// Config for gavel
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub judge: JudgeSettings,

    /// Limits used where a problem file omits its own: `time_limit_ms` for
    /// `max_runtime`, `memory_limit_kb` for `max_mem`. `max_output_kb` caps
    /// captured output of every run.
    #[serde(default)]
    pub default_limits: ResourceLimits,

    /// Language configurations keyed by language ID
    #[serde(default)]
    pub languages: HashMap<String, Language>,
}

impl Config {
    /// Get a language by ID
    pub fn get_language(&self, id: &str) -> Result<&Language, ConfigError> {
        self.languages
            .get(id)
            .ok_or_else(|| ConfigError::LanguageNotFound(id.to_string()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}
