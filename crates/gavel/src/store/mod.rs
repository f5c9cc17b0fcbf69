//! Storage collaborators of the judge
//!
//! The judge reads problems, writes submitted code and records results only
//! through these traits. [`MemoryStore`] and [`FsCodeStore`] are the bundled
//! implementations.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::FileExtension;
use crate::types::{CounterDelta, Problem, Submission, TestCase};

pub use crate::store::fs::FsCodeStore;
pub use crate::store::memory::MemoryStore;
pub use crate::store::persist::{PersistError, PersistStep, record_submission};

mod fs;
mod memory;
mod persist;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("problem '{0}' not found")]
    ProblemNotFound(String),

    #[error("user '{0}' not found")]
    UserNotFound(String),

    #[error("submission '{0}' already exists")]
    DuplicateSubmission(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Read access to problem definitions
#[async_trait]
pub trait ProblemStore: Send + Sync {
    async fn load_problem(&self, identity: &str) -> Result<(Problem, Vec<TestCase>), StoreError>;
}

/// Where submitted source code is kept
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Persist `code` and return the path of the stored source file.
    /// Every call gets a path of its own.
    async fn save_code(&self, code: &[u8], extension: &FileExtension)
    -> Result<PathBuf, StoreError>;
}

/// Transactional access to submissions and counters
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, StoreError>;
}

/// One all-or-nothing unit of ledger writes.
///
/// Nothing becomes visible before [`commit`](Self::commit). Dropping a
/// transaction without committing discards it.
#[async_trait]
pub trait LedgerTransaction: Send {
    async fn insert_submission(&mut self, submission: &Submission) -> Result<(), StoreError>;

    async fn bump_user(&mut self, user_identity: &str, delta: CounterDelta)
    -> Result<(), StoreError>;

    async fn bump_problem(
        &mut self,
        problem_identity: &str,
        delta: CounterDelta,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
