//! Child process supervision
//!
//! Spawns the judged program in its own process group, feeds its stdin,
//! drains stdout/stderr and samples the group's memory until it exits or its
//! time budget elapses.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument};

use crate::process::group::{MemoryPeak, ProcessGroup};
use crate::process::{Invocation, ProcessError, ProcessRunner, RunOutput};

const READ_CHUNK: usize = 8192;

/// Runs programs as plain child processes of the judge
#[derive(Debug, Clone)]
pub struct LocalRunner {
    sample_interval: Duration,
    /// Per stream, in kilobytes
    max_output_kb: Option<u64>,
}

impl LocalRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how often the program's memory is sampled
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Cap the captured size of stdout and stderr. Excess output is read and
    /// discarded so the child never blocks on a full pipe.
    pub fn with_max_output(mut self, kb: Option<u64>) -> Self {
        self.max_output_kb = kb;
        self
    }
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(10),
            max_output_kb: Some(65536),
        }
    }
}

#[async_trait]
impl ProcessRunner for LocalRunner {
    #[instrument(skip(self, invocation, stdin), fields(command = ?invocation.command))]
    async fn run(
        &self,
        invocation: &Invocation,
        stdin: &[u8],
        time_budget: Duration,
    ) -> Result<RunOutput, ProcessError> {
        let (program, args) = invocation
            .command
            .split_first()
            .ok_or_else(|| ProcessError::CommandFailed("empty command arguments".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .current_dir(&invocation.working_dir)
            .envs(&invocation.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(ProcessError::SpawnFailed)?;

        let started = Instant::now();
        // Killed on every exit path, including cancellation of this future.
        let group = child.id().and_then(ProcessGroup::new);
        debug!(pgid = ?group.as_ref().map(ProcessGroup::id), "process spawned");

        // Resident size right after exec; growth past it is what the program used.
        let mut peak = MemoryPeak::default();
        let baseline_kb: u64 = match &group {
            Some(group) => {
                let members = group.sample().await;
                peak.observe(&members);
                members.iter().map(|member| member.resident_kb).sum()
            }
            None => 0,
        };

        let limit = self.max_output_kb.map(|kb| kb.saturating_mul(1024));
        let feed = feed_stdin(child.stdin.take(), stdin);
        let stdout = drain(child.stdout.take(), limit);
        let stderr = drain(child.stderr.take(), limit);

        let interval = self.sample_interval;
        let supervise = async {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    status = child.wait() => return status,
                    _ = ticker.tick() => {
                        if let Some(group) = &group {
                            peak.observe(&group.sample().await);
                        }
                    }
                }
            }
        };

        let joined = tokio::time::timeout(time_budget, async {
            tokio::join!(feed, stdout, stderr, supervise)
        })
        .await;

        match joined {
            Ok(((), stdout, stderr, status)) => {
                let status = status?;
                let output = RunOutput {
                    exit_code: status.code(),
                    stdout: stdout?,
                    stderr: stderr?,
                    memory_kb: peak.kb().saturating_sub(baseline_kb),
                    wall_time: started.elapsed(),
                    timed_out: false,
                };

                debug!(
                    exit_code = ?output.exit_code,
                    memory_kb = output.memory_kb,
                    wall_time = ?output.wall_time,
                    "process exited"
                );

                Ok(output)
            }
            Err(_) => {
                debug!(?time_budget, "time budget elapsed, killing process group");
                if let Some(group) = &group {
                    group.kill();
                }
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "failed to kill process");
                }
                Ok(RunOutput {
                    wall_time: started.elapsed(),
                    timed_out: true,
                    ..Default::default()
                })
            }
        }
    }
}

/// Write the input and close the pipe so the program sees EOF
async fn feed_stdin(pipe: Option<ChildStdin>, data: &[u8]) {
    let Some(mut pipe) = pipe else {
        return;
    };
    // Programs may exit without reading their input.
    if let Err(e) = pipe.write_all(data).await {
        debug!(error = %e, "stdin not fully consumed");
    }
}

async fn drain<R>(stream: Option<R>, limit: Option<u64>) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Vec::new();
    let Some(mut stream) = stream else {
        return Ok(captured);
    };
    let limit = limit.map(|bytes| usize::try_from(bytes).unwrap_or(usize::MAX));

    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let keep = match limit {
            Some(limit) => limit.saturating_sub(captured.len()).min(n),
            None => n,
        };
        captured.extend_from_slice(&chunk[..keep]);
    }

    Ok(captured)
}
