//! A runner that replays canned results
//!
//! Responses are chosen by the program name first, then by the exact stdin,
//! then by a fallback. Delays go through tokio's clock, so tests can drive
//! deadlines with paused time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::process::{Invocation, ProcessError, ProcessRunner, RunOutput};

/// One canned response
#[derive(Debug, Clone)]
pub enum ScriptedRun {
    /// Finish after `delay` with `output`
    Exit { delay: Duration, output: RunOutput },
    /// Never finish on its own
    Hang,
    /// Fail to launch with the given message
    LaunchFailure(String),
}

impl ScriptedRun {
    /// Exit 0 immediately, printing `stdout`
    pub fn prints(stdout: &str) -> Self {
        ScriptedRun::Exit {
            delay: Duration::ZERO,
            output: RunOutput {
                exit_code: Some(0),
                stdout: stdout.as_bytes().to_vec(),
                ..Default::default()
            },
        }
    }

    /// Exit with `code` immediately, writing `stderr`
    pub fn fails(code: i32, stderr: &str) -> Self {
        ScriptedRun::Exit {
            delay: Duration::ZERO,
            output: RunOutput {
                exit_code: Some(code),
                stderr: stderr.as_bytes().to_vec(),
                ..Default::default()
            },
        }
    }

    /// Report `memory_kb` of resident growth
    pub fn with_memory(mut self, memory_kb: u64) -> Self {
        if let ScriptedRun::Exit { ref mut output, .. } = self {
            output.memory_kb = memory_kb;
        }
        self
    }

    /// Finish only after `delay`
    pub fn after(mut self, delay: Duration) -> Self {
        if let ScriptedRun::Exit {
            delay: ref mut current,
            ..
        } = self
        {
            *current = delay;
        }
        self
    }
}

#[derive(Debug, Default)]
pub struct ScriptedRunner {
    by_program: HashMap<String, ScriptedRun>,
    by_input: HashMap<Vec<u8>, ScriptedRun>,
    fallback: Option<ScriptedRun>,
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to any invocation whose program is `program`
    pub fn on_program(mut self, program: &str, run: ScriptedRun) -> Self {
        self.by_program.insert(program.to_owned(), run);
        self
    }

    /// Respond to runs fed exactly `input`
    pub fn on_input(mut self, input: &str, run: ScriptedRun) -> Self {
        self.by_input.insert(input.as_bytes().to_vec(), run);
        self
    }

    pub fn otherwise(mut self, run: ScriptedRun) -> Self {
        self.fallback = Some(run);
        self
    }

    /// Number of runs started
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of runs that returned a result
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    fn lookup(&self, invocation: &Invocation, stdin: &[u8]) -> Option<&ScriptedRun> {
        invocation
            .command
            .first()
            .and_then(|program| self.by_program.get(program))
            .or_else(|| self.by_input.get(stdin))
            .or(self.fallback.as_ref())
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        stdin: &[u8],
        time_budget: Duration,
    ) -> Result<RunOutput, ProcessError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let script = self.lookup(invocation, stdin).cloned().ok_or_else(|| {
            ProcessError::CommandFailed(format!(
                "no scripted response for {:?}",
                invocation.command
            ))
        })?;

        let result = match script {
            ScriptedRun::Exit { delay, output } if delay < time_budget => {
                tokio::time::sleep(delay).await;
                Ok(RunOutput {
                    wall_time: delay,
                    ..output
                })
            }
            ScriptedRun::Exit { .. } | ScriptedRun::Hang => {
                tokio::time::sleep(time_budget).await;
                Ok(RunOutput {
                    wall_time: time_budget,
                    timed_out: true,
                    ..Default::default()
                })
            }
            ScriptedRun::LaunchFailure(message) => Err(ProcessError::SpawnFailed(
                std::io::Error::new(std::io::ErrorKind::NotFound, message),
            )),
        };

        self.finished.fetch_add(1, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(program: &str) -> Invocation {
        Invocation::new(vec![program.to_owned()], "/tmp")
    }

    #[tokio::test(start_paused = true)]
    async fn program_match_wins_over_input() {
        let runner = ScriptedRunner::new()
            .on_program("g++", ScriptedRun::fails(1, "error"))
            .on_input("", ScriptedRun::prints("x"));

        let output = runner
            .run(&invocation("g++"), b"", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(output.exit_code, Some(1));
        assert_eq!(output.stderr_lossy(), "error");
    }

    #[tokio::test(start_paused = true)]
    async fn input_match_then_fallback() {
        let runner = ScriptedRunner::new()
            .on_input("1\n", ScriptedRun::prints("1\n"))
            .otherwise(ScriptedRun::prints("?"));

        let hit = runner
            .run(&invocation("./main"), b"1\n", Duration::from_secs(1))
            .await
            .unwrap();
        let miss = runner
            .run(&invocation("./main"), b"2\n", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(hit.stdout_lossy(), "1\n");
        assert_eq!(miss.stdout_lossy(), "?");
        assert_eq!(runner.started(), 2);
        assert_eq!(runner.finished(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_exit_past_budget_times_out() {
        let runner = ScriptedRunner::new()
            .otherwise(ScriptedRun::prints("late").after(Duration::from_secs(10)));

        let output = runner
            .run(&invocation("./main"), b"", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(output.timed_out);
        assert!(output.stdout.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn launch_failure_is_an_error() {
        let runner = ScriptedRunner::new().otherwise(ScriptedRun::LaunchFailure("gone".into()));
        let err = runner
            .run(&invocation("./main"), b"", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::SpawnFailed(_)));
    }

    #[tokio::test]
    async fn unscripted_run_is_an_error() {
        let runner = ScriptedRunner::new();
        let err = runner
            .run(&invocation("./main"), b"", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::CommandFailed(_)));
    }

    #[test]
    fn with_memory_sets_growth() {
        match ScriptedRun::prints("").with_memory(2048) {
            ScriptedRun::Exit { output, .. } => assert_eq!(output.memory_kb, 2048),
            other => panic!("unexpected {other:?}"),
        }
    }
}
