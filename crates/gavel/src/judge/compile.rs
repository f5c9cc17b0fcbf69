//! Preparing a stored source file for execution
//!
//! Compiled languages are built exactly once, before any test case runs; the
//! resulting invocation is shared by every execution.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::config::Language;
use crate::process::{Invocation, ProcessRunner, resolve_command};
use crate::types::{Judgment, ResourceLimits};

const COMPILE_TIME_LIMIT_MS: u64 = 30_000;

/// Default compilation limits
fn default_compile_limits() -> ResourceLimits {
    ResourceLimits::unset().with_time_limit_ms(COMPILE_TIME_LIMIT_MS)
}

/// Build the run invocation for `source`, compiling it first if the language
/// needs it.
///
/// A failed or unlaunchable compiler yields the CompileError judgment that
/// ends the submission.
#[instrument(skip(runner, language), fields(language = %language.name))]
pub async fn prepare(
    runner: &dyn ProcessRunner,
    language: &Language,
    source: &Path,
) -> Result<Invocation, Judgment> {
    let working_dir = source.parent().unwrap_or(Path::new("."));
    let source_name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| language.source_name());

    let binary = match &language.compile {
        Some(compile) => {
            let mut command =
                Language::expand_command(&compile.command, &source_name, &compile.output_name);
            resolve_command(&mut command, working_dir)
                .map_err(|e| Judgment::compile_error(e.to_string()))?;

            let limits = match &compile.limits {
                Some(limits) => default_compile_limits().with_overrides(limits),
                None => default_compile_limits(),
            };
            let budget = limits
                .time_budget()
                .unwrap_or(Duration::from_millis(COMPILE_TIME_LIMIT_MS));

            let invocation = Invocation::new(command, working_dir)
                .env("PATH", language.run.path.as_str())
                .envs(&compile.env);
            let output = runner
                .run(&invocation, b"", budget)
                .await
                .map_err(|e| Judgment::compile_error(e.to_string()))?;

            debug!(
                exit_code = ?output.exit_code,
                wall_time = ?output.wall_time,
                timed_out = output.timed_out,
                "compilation complete"
            );

            if output.timed_out {
                return Err(Judgment::compile_error(format!(
                    "compilation exceeded {} ms",
                    budget.as_millis()
                )));
            }
            if !output.is_success() {
                let mut diagnostic = output.stderr_lossy();
                if diagnostic.is_empty() {
                    diagnostic = output.stdout_lossy();
                }
                if diagnostic.is_empty() {
                    diagnostic = format!("compiler exited with status {:?}", output.exit_code);
                }
                return Err(Judgment::compile_error(diagnostic));
            }
            compile.output_name.clone()
        }
        None => String::new(),
    };

    let mut command = Language::expand_command(&language.run.command, &source_name, &binary);
    resolve_command(&mut command, working_dir)
        .map_err(|e| Judgment::compile_error(e.to_string()))?;

    Ok(Invocation::new(command, working_dir)
        .env("PATH", language.run.path.as_str())
        .envs(&language.run.env))
}
