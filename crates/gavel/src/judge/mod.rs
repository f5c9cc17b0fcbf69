//! Judging submissions end to end
//!
//! [`Judge`] wires the collaborators together: it stores the code, loads the
//! problem, races the test cases through a [`VerdictResolver`] and records the
//! result through [`record_submission`].

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub use crate::judge::compile::prepare;
pub use crate::judge::executor::{TestCaseExecutor, compare_output};
pub use crate::judge::resolver::{Resolution, VerdictResolver};

mod compile;
mod executor;
mod resolver;

use crate::config::{Config, ConfigError};
use crate::process::ProcessRunner;
use crate::store::{
    CodeStore, Ledger, PersistError, ProblemStore, StoreError, record_submission,
};
use crate::types::{Judgment, Submission, TestCase, Verdict};

/// A program submitted for judging
#[derive(Debug, Clone)]
pub struct JudgeRequest {
    pub problem_identity: String,
    pub user_identity: String,
    /// Language ID; the configured default when `None`
    pub language: Option<String>,
    pub code: Vec<u8>,
}

impl JudgeRequest {
    pub fn new(
        problem_identity: impl Into<String>,
        user_identity: impl Into<String>,
        code: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            problem_identity: problem_identity.into(),
            user_identity: user_identity.into(),
            language: None,
            code: code.into(),
        }
    }

    pub fn language(mut self, id: impl Into<String>) -> Self {
        self.language = Some(id.into());
        self
    }
}

/// What the submitter is told
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JudgeResponse {
    pub submission_id: String,
    pub verdict: Verdict,
    /// Stored status code of the verdict
    pub status: i8,
    pub message: String,
}

impl JudgeResponse {
    fn new(submission_id: String, judgment: Judgment) -> Self {
        Self {
            submission_id,
            verdict: judgment.verdict,
            status: judgment.verdict.status_code(),
            message: judgment.message,
        }
    }
}

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("problem '{0}' not found")]
    NotFound(String),

    #[error("test case '{identity}' is malformed: {reason}")]
    MalformedTestCase { identity: String, reason: String },

    #[error(transparent)]
    UnknownLanguage(#[from] ConfigError),

    #[error("failed to store code: {0}")]
    CodeStore(#[source] StoreError),

    #[error("failed to load problem: {0}")]
    ProblemStore(#[source] StoreError),

    /// The verdict was reached but could not be recorded
    #[error("verdict '{}' was reached but not recorded: {source}", .response.verdict)]
    NotRecorded {
        response: Box<JudgeResponse>,
        #[source]
        source: PersistError,
    },
}

/// The submission judging engine
#[derive(Clone)]
pub struct Judge {
    config: Config,
    problems: Arc<dyn ProblemStore>,
    code: Arc<dyn CodeStore>,
    ledger: Arc<dyn Ledger>,
    runner: Arc<dyn ProcessRunner>,
}

impl Judge {
    pub fn new(
        config: Config,
        problems: Arc<dyn ProblemStore>,
        code: Arc<dyn CodeStore>,
        ledger: Arc<dyn Ledger>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            config,
            problems,
            code,
            ledger,
            runner,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Judge one submission and record the result.
    ///
    /// Errors before a verdict leave the ledger untouched. A verdict that
    /// could not be recorded comes back as [`JudgeError::NotRecorded`].
    #[instrument(skip(self, request), fields(problem = %request.problem_identity, user = %request.user_identity))]
    pub async fn judge(&self, request: JudgeRequest) -> Result<JudgeResponse, JudgeError> {
        let language_id = request
            .language
            .as_deref()
            .unwrap_or(&self.config.judge.default_language);
        let language = self.config.get_language(language_id)?;

        let path = self
            .code
            .save_code(&request.code, &language.extension)
            .await
            .map_err(JudgeError::CodeStore)?;
        debug!(path = %path.display(), "code saved");

        let (problem, cases) = self
            .problems
            .load_problem(&request.problem_identity)
            .await
            .map_err(|e| match e {
                StoreError::ProblemNotFound(identity) => JudgeError::NotFound(identity),
                other => JudgeError::ProblemStore(other),
            })?;
        validate_cases(&cases, &problem.identity)?;

        let deadline = problem.deadline();

        let judgment = if let Some(pattern) = language.screen(&request.code) {
            warn!(pattern, "forbidden pattern in source");
            Judgment::illegal_code(pattern)
        } else {
            match prepare(self.runner.as_ref(), language, &path).await {
                Ok(invocation) => {
                    let executor = TestCaseExecutor::new(self.runner.clone(), invocation)
                        .with_comparison(self.config.judge.comparison)
                        .with_time_budget(deadline + self.config.judge.kill_grace())
                        .with_memory_limit(Some(problem.max_mem));
                    VerdictResolver::new(self.config.judge.max_parallel)
                        .resolve(Arc::new(executor), cases, deadline)
                        .await
                        .judgment
                }
                Err(judgment) => judgment,
            }
        };

        let submission = Submission {
            identity: Uuid::new_v4().to_string(),
            problem_identity: problem.identity,
            user_identity: request.user_identity,
            path,
            verdict: judgment.verdict,
        };
        let response = JudgeResponse::new(submission.identity.clone(), judgment);

        if let Err(source) = record_submission(self.ledger.as_ref(), &submission).await {
            warn!(error = %source, "verdict not recorded");
            return Err(JudgeError::NotRecorded {
                response: Box::new(response),
                source,
            });
        }

        info!(
            submission = %response.submission_id,
            verdict = %response.verdict,
            "submission judged"
        );
        Ok(response)
    }
}

impl std::fmt::Debug for Judge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Judge")
            .field("config", &self.config)
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

fn validate_cases(cases: &[TestCase], problem_identity: &str) -> Result<(), JudgeError> {
    for case in cases {
        case.validate(problem_identity)
            .map_err(|reason| JudgeError::MalformedTestCase {
                identity: case.identity.clone(),
                reason,
            })?;
    }
    Ok(())
}
