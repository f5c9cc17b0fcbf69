//! In-memory problem store and ledger
//!
//! A transaction holds the store lock from `begin` until it is committed or
//! dropped, and stages its writes until `commit`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::store::{Ledger, LedgerTransaction, ProblemStore, StoreError};
use crate::types::{CounterDelta, Counters, Problem, Submission, TestCase};

#[derive(Debug, Default)]
struct State {
    problems: HashMap<String, ProblemRecord>,
    users: HashMap<String, Counters>,
    submissions: Vec<Submission>,
}

#[derive(Debug, Clone)]
struct ProblemRecord {
    problem: Problem,
    test_cases: Vec<TestCase>,
    counters: Counters,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a problem. Its counters start at zero.
    pub async fn insert_problem(&self, problem: Problem, test_cases: Vec<TestCase>) {
        let mut state = self.state.lock().await;
        state.problems.insert(
            problem.identity.clone(),
            ProblemRecord {
                problem,
                test_cases,
                counters: Counters::default(),
            },
        );
    }

    /// Register a user with zeroed counters, keeping existing counters
    pub async fn insert_user(&self, identity: &str) {
        let mut state = self.state.lock().await;
        state.users.entry(identity.to_owned()).or_default();
    }

    pub async fn problem_counters(&self, identity: &str) -> Option<Counters> {
        let state = self.state.lock().await;
        state.problems.get(identity).map(|record| record.counters)
    }

    pub async fn user_counters(&self, identity: &str) -> Option<Counters> {
        let state = self.state.lock().await;
        state.users.get(identity).copied()
    }

    /// Committed submissions, oldest first
    pub async fn submissions(&self) -> Vec<Submission> {
        let state = self.state.lock().await;
        state.submissions.clone()
    }
}

#[async_trait]
impl ProblemStore for MemoryStore {
    async fn load_problem(&self, identity: &str) -> Result<(Problem, Vec<TestCase>), StoreError> {
        let state = self.state.lock().await;
        state
            .problems
            .get(identity)
            .map(|record| (record.problem.clone(), record.test_cases.clone()))
            .ok_or_else(|| StoreError::ProblemNotFound(identity.to_owned()))
    }
}

#[async_trait]
impl Ledger for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(MemoryTransaction {
            state: guard,
            submissions: Vec::new(),
            user_deltas: Vec::new(),
            problem_deltas: Vec::new(),
        }))
    }
}

struct MemoryTransaction {
    state: OwnedMutexGuard<State>,
    submissions: Vec<Submission>,
    user_deltas: Vec<(String, CounterDelta)>,
    problem_deltas: Vec<(String, CounterDelta)>,
}

#[async_trait]
impl LedgerTransaction for MemoryTransaction {
    async fn insert_submission(&mut self, submission: &Submission) -> Result<(), StoreError> {
        let duplicate = self
            .state
            .submissions
            .iter()
            .chain(&self.submissions)
            .any(|existing| existing.identity == submission.identity);
        if duplicate {
            return Err(StoreError::DuplicateSubmission(submission.identity.clone()));
        }
        self.submissions.push(submission.clone());
        Ok(())
    }

    async fn bump_user(
        &mut self,
        user_identity: &str,
        delta: CounterDelta,
    ) -> Result<(), StoreError> {
        if !self.state.users.contains_key(user_identity) {
            return Err(StoreError::UserNotFound(user_identity.to_owned()));
        }
        self.user_deltas.push((user_identity.to_owned(), delta));
        Ok(())
    }

    async fn bump_problem(
        &mut self,
        problem_identity: &str,
        delta: CounterDelta,
    ) -> Result<(), StoreError> {
        if !self.state.problems.contains_key(problem_identity) {
            return Err(StoreError::ProblemNotFound(problem_identity.to_owned()));
        }
        self.problem_deltas.push((problem_identity.to_owned(), delta));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction {
            mut state,
            submissions,
            user_deltas,
            problem_deltas,
        } = *self;

        // Every key was checked while staging and the lock was held since.
        for (identity, delta) in user_deltas {
            if let Some(counters) = state.users.get_mut(&identity) {
                counters.apply(delta);
            }
        }
        for (identity, delta) in problem_deltas {
            if let Some(record) = state.problems.get_mut(&identity) {
                record.counters.apply(delta);
            }
        }
        debug!(count = submissions.len(), "committing submissions");
        state.submissions.extend(submissions);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        debug!(
            discarded = self.submissions.len(),
            "rolling back ledger transaction"
        );
        Ok(())
    }
}
