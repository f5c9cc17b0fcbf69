//! Recording a judged submission
//!
//! The submission row and both counter updates go through one ledger
//! transaction: all three are applied or none is.

use std::fmt;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::store::{Ledger, LedgerTransaction, StoreError};
use crate::types::{CounterDelta, Submission};

/// The write that failed inside the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistStep {
    InsertSubmission,
    BumpUser,
    BumpProblem,
}

impl fmt::Display for PersistStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            PersistStep::InsertSubmission => "inserting the submission",
            PersistStep::BumpUser => "updating user counters",
            PersistStep::BumpProblem => "updating problem counters",
        };
        f.write_str(step)
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("could not open a transaction: {0}")]
    Begin(#[source] StoreError),

    #[error("{step} failed: {source}")]
    Step {
        step: PersistStep,
        #[source]
        source: StoreError,
    },

    #[error("commit failed: {0}")]
    Commit(#[source] StoreError),
}

/// Insert `submission` and bump the user and problem counters atomically
#[instrument(skip(ledger, submission), fields(submission = %submission.identity, verdict = ?submission.verdict))]
pub async fn record_submission(
    ledger: &dyn Ledger,
    submission: &Submission,
) -> Result<(), PersistError> {
    let delta = CounterDelta::for_verdict(submission.verdict);
    let mut tx = ledger.begin().await.map_err(PersistError::Begin)?;

    if let Err((step, source)) = apply(tx.as_mut(), submission, delta).await {
        warn!(%step, error = %source, "rolling back submission");
        if let Err(e) = tx.rollback().await {
            warn!(error = %e, "rollback failed");
        }
        return Err(PersistError::Step { step, source });
    }

    tx.commit().await.map_err(PersistError::Commit)?;
    info!("submission recorded");
    Ok(())
}

async fn apply(
    tx: &mut dyn LedgerTransaction,
    submission: &Submission,
    delta: CounterDelta,
) -> Result<(), (PersistStep, StoreError)> {
    tx.insert_submission(submission)
        .await
        .map_err(|e| (PersistStep::InsertSubmission, e))?;
    tx.bump_user(&submission.user_identity, delta)
        .await
        .map_err(|e| (PersistStep::BumpUser, e))?;
    tx.bump_problem(&submission.problem_identity, delta)
        .await
        .map_err(|e| (PersistStep::BumpProblem, e))?;
    Ok(())
}
