use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Wall clock limit in milliseconds
    #[serde(default)]
    pub time_limit_ms: Option<u64>,

    /// Memory limit in kilobytes
    #[serde(default)]
    pub memory_limit_kb: Option<u64>,

    /// Maximum captured output per stream in kilobytes
    #[serde(default)]
    pub max_output_kb: Option<u64>,
}

impl ResourceLimits {
    /// Limits with every field unset
    pub fn unset() -> Self {
        Self {
            time_limit_ms: None,
            memory_limit_kb: None,
            max_output_kb: None,
        }
    }

    /// Set the wall clock limit in milliseconds
    pub fn with_time_limit_ms(mut self, millis: u64) -> Self {
        self.time_limit_ms = Some(millis);
        self
    }

    /// Apply overrides from another ResourceLimits, preferring values from `overrides`
    pub fn with_overrides(&self, overrides: &ResourceLimits) -> ResourceLimits {
        ResourceLimits {
            time_limit_ms: overrides.time_limit_ms.or(self.time_limit_ms),
            memory_limit_kb: overrides.memory_limit_kb.or(self.memory_limit_kb),
            max_output_kb: overrides.max_output_kb.or(self.max_output_kb),
        }
    }

    /// The time limit as a duration, if set
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            time_limit_ms: Some(1000),
            memory_limit_kb: Some(262144), // 256 MB
            max_output_kb: Some(65536),    // 64 MB
        }
    }
}

/// A problem definition, read-only while it is being judged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub identity: String,

    #[serde(default)]
    pub title: String,

    /// Global judging deadline in milliseconds
    pub max_runtime: u64,

    /// Memory budget per test case in kilobytes
    pub max_mem: u64,
}

impl Problem {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.max_runtime)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub identity: String,
    pub problem_identity: String,
    pub input: String,
    pub output: String,
}

impl TestCase {
    /// Check that this test case can be judged as part of `problem_identity`.
    ///
    /// Returns a human-readable reason when it cannot.
    pub fn validate(&self, problem_identity: &str) -> Result<(), String> {
        if self.identity.trim().is_empty() {
            return Err("test case has an empty identity".to_owned());
        }
        if self.problem_identity != problem_identity {
            return Err(format!(
                "test case belongs to problem '{}', not '{problem_identity}'",
                self.problem_identity
            ));
        }
        if self.input.contains('\0') || self.output.contains('\0') {
            return Err("test case data contains NUL bytes".to_owned());
        }
        Ok(())
    }
}

/// Result of running one test case
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Passed,
    WrongAnswer { expected: String, actual: String },
    CompileError(String),
    MemoryExceeded { used_kb: u64, limit_kb: u64 },
}

impl ExecutionOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionOutcome::Passed => "passed",
            ExecutionOutcome::WrongAnswer { .. } => "wrong_answer",
            ExecutionOutcome::CompileError(_) => "compile_error",
            ExecutionOutcome::MemoryExceeded { .. } => "memory_exceeded",
        }
    }
}

/// Terminal classification of a judged submission.
///
/// Status codes match the `status` column of the submission table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    Timeout,
    MemoryExceeded,
    CompileError,
    IllegalCode,
}

impl Verdict {
    pub fn status_code(self) -> i8 {
        match self {
            Verdict::Accepted => 1,
            Verdict::WrongAnswer => 2,
            Verdict::Timeout => 3,
            Verdict::MemoryExceeded => 4,
            Verdict::CompileError => 5,
            Verdict::IllegalCode => 6,
        }
    }

    /// Parse a stored status code. `-1` (pending) and unknown codes yield `None`.
    pub fn from_status_code(code: i8) -> Option<Self> {
        match code {
            1 => Some(Verdict::Accepted),
            2 => Some(Verdict::WrongAnswer),
            3 => Some(Verdict::Timeout),
            4 => Some(Verdict::MemoryExceeded),
            5 => Some(Verdict::CompileError),
            6 => Some(Verdict::IllegalCode),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_accepted(self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verdict::Accepted => "Accepted",
            Verdict::WrongAnswer => "Wrong Answer",
            Verdict::Timeout => "Time Limit Exceeded",
            Verdict::MemoryExceeded => "Memory Limit Exceeded",
            Verdict::CompileError => "Compile Error",
            Verdict::IllegalCode => "Illegal Code",
        };
        f.write_str(name)
    }
}

/// A verdict together with the message shown to the submitter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Judgment {
    pub verdict: Verdict,
    pub message: String,
}

impl Judgment {
    pub fn accepted() -> Self {
        Self {
            verdict: Verdict::Accepted,
            message: "accepted".to_owned(),
        }
    }

    pub fn wrong_answer(expected: &str, actual: &str) -> Self {
        Self {
            verdict: Verdict::WrongAnswer,
            message: format!("wrong answer: expected {expected:?}, got {actual:?}"),
        }
    }

    pub fn timeout() -> Self {
        Self {
            verdict: Verdict::Timeout,
            message: "time limit exceeded".to_owned(),
        }
    }

    pub fn memory_exceeded(used_kb: u64, limit_kb: u64) -> Self {
        Self {
            verdict: Verdict::MemoryExceeded,
            message: format!("memory limit exceeded: used {used_kb} KB of {limit_kb} KB"),
        }
    }

    pub fn compile_error(diagnostic: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::CompileError,
            message: diagnostic.into(),
        }
    }

    pub fn illegal_code(pattern: &str) -> Self {
        Self {
            verdict: Verdict::IllegalCode,
            message: format!("illegal code: use of '{pattern}' is not allowed"),
        }
    }

    /// The judgment a disqualifying outcome resolves to, `None` for `Passed`
    pub fn from_disqualifier(outcome: &ExecutionOutcome) -> Option<Self> {
        match outcome {
            ExecutionOutcome::Passed => None,
            ExecutionOutcome::WrongAnswer { expected, actual } => {
                Some(Self::wrong_answer(expected, actual))
            }
            ExecutionOutcome::CompileError(diagnostic) => {
                Some(Self::compile_error(diagnostic.clone()))
            }
            ExecutionOutcome::MemoryExceeded { used_kb, limit_kb } => {
                Some(Self::memory_exceeded(*used_kb, *limit_kb))
            }
        }
    }
}

/// A judged submission as it is recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub identity: String,
    pub problem_identity: String,
    pub user_identity: String,
    /// Where the code store put the source
    pub path: PathBuf,
    pub verdict: Verdict,
}

/// Increments applied to user and problem counters for one judgment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterDelta {
    pub submit: u64,
    pub pass: u64,
}

impl CounterDelta {
    pub fn for_verdict(verdict: Verdict) -> Self {
        Self {
            submit: 1,
            pass: u64::from(verdict.is_accepted()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Counters {
    pub pass_num: u64,
    pub submit_num: u64,
}

impl Counters {
    pub fn apply(&mut self, delta: CounterDelta) {
        self.submit_num += delta.submit;
        self.pass_num += delta.pass;
    }
}
