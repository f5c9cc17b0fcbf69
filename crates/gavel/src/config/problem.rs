//! Problem definition files, used to seed a problem store

use serde::Deserialize;

use crate::config::ConfigError;
use crate::types::{Problem, ResourceLimits, TestCase};

/// A problem and its test cases as written in a TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct ProblemFile {
    pub identity: String,

    #[serde(default)]
    pub title: String,

    /// Milliseconds; `default_limits.time_limit_ms` when omitted
    #[serde(default)]
    pub max_runtime: Option<u64>,

    /// Kilobytes; `default_limits.memory_limit_kb` when omitted
    #[serde(default)]
    pub max_mem: Option<u64>,

    #[serde(default)]
    pub test_cases: Vec<TestCaseEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestCaseEntry {
    /// Defaults to `<problem>-<n>`, counting from 1
    #[serde(default)]
    pub identity: Option<String>,
    pub input: String,
    pub output: String,
}

impl ProblemFile {
    /// Split into a problem and its test cases, filling omitted limits from
    /// `defaults`
    pub fn into_parts(
        self,
        defaults: &ResourceLimits,
    ) -> Result<(Problem, Vec<TestCase>), ConfigError> {
        let max_runtime = self
            .max_runtime
            .or(defaults.time_limit_ms)
            .filter(|&ms| ms > 0)
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "problem '{}' has no positive max_runtime",
                    self.identity
                ))
            })?;
        let max_mem = self.max_mem.or(defaults.memory_limit_kb).ok_or_else(|| {
            ConfigError::Invalid(format!("problem '{}' has no max_mem", self.identity))
        })?;

        let cases = self
            .test_cases
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| TestCase {
                identity: entry
                    .identity
                    .unwrap_or_else(|| format!("{}-{}", self.identity, idx + 1)),
                problem_identity: self.identity.clone(),
                input: entry.input,
                output: entry.output,
            })
            .collect();

        let problem = Problem {
            identity: self.identity,
            title: self.title,
            max_runtime,
            max_mem,
        };

        Ok((problem, cases))
    }
}
