//! A concurrent judging engine for online-judge submissions.
//!
//! Gavel takes a submitted program and a problem's test cases, runs the
//! program once per test case in its own child process, and reduces the
//! results into one verdict under a global deadline. The verdict is recorded
//! together with the user and problem counters in a single transaction.
//!
//! # Features
//!
//! - **Concurrent test cases**: a bounded worker pool races every test case
//!   against the others and against the problem's deadline.
//! - **Early verdicts**: the first wrong answer, memory overrun or runtime
//!   failure decides the verdict and cancels the remaining runs.
//! - **Multi-language**: TOML configuration for compiled and interpreted
//!   languages, with per-language forbidden source patterns.
//! - **Pluggable collaborators**: problem store, code store, ledger and
//!   process runner are traits.
//! - **Atomic bookkeeping**: a submission and its counter updates are
//!   recorded together or not at all.

pub use config::{Config, ConfigError, EXAMPLE_CONFIG, Language, OutputComparison};
pub use judge::{
    Judge, JudgeError, JudgeRequest, JudgeResponse, Resolution, TestCaseExecutor,
    VerdictResolver,
};
pub use process::{Invocation, LocalRunner, ProcessError, ProcessRunner, RunOutput};
pub use store::{
    CodeStore, FsCodeStore, Ledger, LedgerTransaction, MemoryStore, PersistError, ProblemStore,
    StoreError, record_submission,
};
pub use types::{
    CounterDelta, Counters, ExecutionOutcome, Judgment, Problem, ResourceLimits, Submission,
    TestCase, Verdict,
};

pub mod config;
pub mod judge;
pub mod process;
pub mod store;
pub mod types;
