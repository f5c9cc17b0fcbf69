//! Gavel CLI
//!
//! A command-line tool for judging a program against a problem file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gavel::config::ProblemFile;
use gavel::{
    Config, EXAMPLE_CONFIG, FsCodeStore, Judge, JudgeError, JudgeRequest, JudgeResponse,
    LocalRunner, MemoryStore,
};
use serde::Serialize;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

/// User the CLI records submissions for
const CLI_USER: &str = "cli";

/// Exit status when a verdict was reached but could not be recorded.
/// Verdict status codes are 1 through 6.
const NOT_RECORDED_EXIT: i32 = 10;

/// A judge response plus whether it reached the ledger
#[derive(Debug, Serialize)]
struct Report {
    #[serde(flatten)]
    response: JudgeResponse,
    recorded: bool,
}

impl Report {
    /// Process exit status: 0 for a recorded Accepted, the verdict's status
    /// code otherwise, and [`NOT_RECORDED_EXIT`] when nothing was saved
    fn exit_code(&self) -> i32 {
        if !self.recorded {
            NOT_RECORDED_EXIT
        } else if self.response.verdict.is_accepted() {
            0
        } else {
            i32::from(self.response.status)
        }
    }
}

#[derive(Parser)]
#[command(name = "gavel")]
#[command(about = "A tool for judging submissions against problem test cases")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: gavel.toml)
        #[arg(short, long, default_value = "gavel.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Judge a source file against a problem file
    Judge {
        /// Source file to judge
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Problem definition (TOML)
        #[arg(short, long)]
        problem: PathBuf,

        /// Language ID (default: judge.default_language)
        #[arg(short, long)]
        language: Option<String>,

        /// Store submitted code here instead of judge.code_dir
        #[arg(long)]
        code_dir: Option<PathBuf>,

        /// Test cases to run at once
        #[arg(short = 'j', long)]
        max_parallel: Option<usize>,

        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },

    /// List available languages
    Languages,

    /// Show the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
        Config::from_file(path).context("failed to load configuration")?
    } else {
        debug!("using default configuration");
        Config::default()
    };

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Judge {
            source,
            problem,
            language,
            code_dir,
            max_parallel,
            json,
        } => {
            if let Some(dir) = code_dir {
                config.judge.code_dir = dir;
            }
            if let Some(max_parallel) = max_parallel {
                config.judge.max_parallel = max_parallel.max(1);
            }
            let report = run_judge(config, &source, &problem, language).await?;
            print_report(&report, json)?;

            match report.exit_code() {
                0 => Ok(()),
                code => std::process::exit(code),
            }
        }
        Commands::Languages => {
            list_languages(&config);
            Ok(())
        }
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

async fn run_judge(
    config: Config,
    source: &Path,
    problem: &Path,
    language: Option<String>,
) -> Result<Report> {
    let code = tokio::fs::read(source)
        .await
        .context("failed to read source file")?;
    let (problem, cases) = ProblemFile::from_file(problem)
        .context("failed to load problem file")?
        .into_parts(&config.default_limits)
        .context("invalid problem file")?;
    let problem_identity = problem.identity.clone();

    info!(
        problem = %problem_identity,
        test_cases = cases.len(),
        max_runtime_ms = problem.max_runtime,
        "judging submission"
    );

    let store = MemoryStore::new();
    store.insert_problem(problem, cases).await;
    store.insert_user(CLI_USER).await;

    let runner = LocalRunner::new()
        .with_sample_interval(config.judge.sample_interval())
        .with_max_output(config.default_limits.max_output_kb);
    let code_store = FsCodeStore::new(&config.judge.code_dir);

    let judge = Judge::new(
        config,
        Arc::new(store.clone()),
        Arc::new(code_store),
        Arc::new(store),
        Arc::new(runner),
    );

    let mut request = JudgeRequest::new(problem_identity, CLI_USER, code);
    if let Some(language) = language {
        request = request.language(language);
    }

    match judge.judge(request).await {
        Ok(response) => Ok(Report {
            response,
            recorded: true,
        }),
        Err(JudgeError::NotRecorded { response, source }) => {
            warn!(error = %source, "verdict was not recorded");
            Ok(Report {
                response: *response,
                recorded: false,
            })
        }
        Err(e) => Err(e).context("judging failed"),
    }
}

fn print_report(report: &Report, json: bool) -> Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(report).context("failed to serialize response")?;
        println!("{rendered}");
        return Ok(());
    }

    let response = &report.response;
    println!("{}", response.verdict);
    if !report.recorded {
        println!("(computed but not recorded)");
    }
    if !response.verdict.is_accepted() && !response.message.is_empty() {
        println!("\n{}", response.message);
    }
    if report.recorded {
        info!(
            submission = %response.submission_id,
            status = response.status,
            "judgment recorded"
        );
    }
    Ok(())
}

fn list_languages(config: &Config) {
    println!("Available languages:\n");

    let mut languages: Vec<_> = config.languages.iter().collect();
    languages.sort_by_key(|(id, _)| *id);

    for (id, lang) in languages {
        let lang_type = if lang.is_compiled() {
            "compiled"
        } else {
            "interpreted"
        };
        let marker = if *id == config.judge.default_language {
            " [default]"
        } else {
            ""
        };
        println!("  {:<15} {} ({}){}", id, lang.name, lang_type, marker);
    }
}

fn show_config(config: &Config) {
    println!("Judge:");
    println!("  Max parallel: {}", config.judge.max_parallel);
    println!("  Code dir: {}", config.judge.code_dir.display());
    println!("  Comparison: {:?}", config.judge.comparison);
    println!("  Default language: {}", config.judge.default_language);
    println!("  Kill grace: {} ms", config.judge.kill_grace_ms);
    println!("  Sample interval: {} ms", config.judge.sample_interval_ms);
    println!();
    println!("Default resource limits:");
    println!(
        "  Time limit: {:?} ms (problems without max_runtime)",
        config.default_limits.time_limit_ms
    );
    println!(
        "  Memory limit: {:?} KB (problems without max_mem)",
        config.default_limits.memory_limit_kb
    );
    println!("  Max output: {:?} KB", config.default_limits.max_output_kb);
    println!();
    println!("Languages configured: {}", config.languages.len());
}

async fn init_config(output: &PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
