//! Running one program against one test case

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::config::OutputComparison;
use crate::process::{Invocation, ProcessRunner};
use crate::types::{ExecutionOutcome, TestCase};

/// Everything needed to run the prepared program against any test case
#[derive(Debug, Clone)]
pub struct TestCaseExecutor {
    runner: Arc<dyn ProcessRunner>,
    invocation: Invocation,
    comparison: OutputComparison,
    time_budget: Duration,
    memory_limit_kb: Option<u64>,
}

impl TestCaseExecutor {
    pub fn new(runner: Arc<dyn ProcessRunner>, invocation: Invocation) -> Self {
        Self {
            runner,
            invocation,
            comparison: OutputComparison::default(),
            time_budget: Duration::from_secs(1),
            memory_limit_kb: None,
        }
    }

    pub fn with_comparison(mut self, comparison: OutputComparison) -> Self {
        self.comparison = comparison;
        self
    }

    /// How long a single run may go on before the runner abandons it
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn with_memory_limit(mut self, kb: Option<u64>) -> Self {
        self.memory_limit_kb = kb;
        self
    }

    /// Run the program on `case`.
    ///
    /// Returns `None` when the run was still going at the end of its budget;
    /// such a case never reports, and the resolver's deadline decides.
    #[instrument(skip(self, case), fields(case = %case.identity))]
    pub async fn execute(&self, case: &TestCase) -> Option<ExecutionOutcome> {
        let output = match self
            .runner
            .run(&self.invocation, case.input.as_bytes(), self.time_budget)
            .await
        {
            Ok(output) => output,
            Err(e) => {
                debug!(error = %e, "program could not be launched");
                return Some(ExecutionOutcome::CompileError(e.to_string()));
            }
        };

        if output.timed_out {
            debug!(wall_time = ?output.wall_time, "run abandoned at budget");
            return None;
        }

        let outcome = if output.exit_code != Some(0) {
            let mut diagnostic = output.stderr_lossy();
            if diagnostic.is_empty() {
                diagnostic = match output.exit_code {
                    Some(code) => format!("program exited with status {code}"),
                    None => "program was terminated by a signal".to_owned(),
                };
            }
            ExecutionOutcome::CompileError(diagnostic)
        } else if !compare_output(&case.output, &output.stdout, self.comparison) {
            ExecutionOutcome::WrongAnswer {
                expected: case.output.clone(),
                actual: output.stdout_lossy(),
            }
        } else if let Some(limit_kb) = self.memory_limit_kb
            && output.memory_kb > limit_kb
        {
            ExecutionOutcome::MemoryExceeded {
                used_kb: output.memory_kb,
                limit_kb,
            }
        } else {
            ExecutionOutcome::Passed
        };

        debug!(
            outcome = outcome.kind(),
            memory_kb = output.memory_kb,
            wall_time = ?output.wall_time,
            "test case finished"
        );
        Some(outcome)
    }
}

/// Compare captured stdout with the expected output
pub fn compare_output(expected: &str, actual: &[u8], comparison: OutputComparison) -> bool {
    match comparison {
        OutputComparison::Exact => expected.as_bytes() == actual,
        OutputComparison::TrimTrailing => {
            let actual = String::from_utf8_lossy(actual);
            trimmed_lines(expected).eq(trimmed_lines(&actual))
        }
    }
}

/// Lines with trailing whitespace removed, ignoring trailing blank lines
fn trimmed_lines(text: &str) -> impl Iterator<Item = &str> {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let len = lines
        .iter()
        .rposition(|line| !line.is_empty())
        .map_or(0, |last| last + 1);
    lines.into_iter().take(len)
}
