//! Racing test cases against each other and a deadline
//!
//! Every test case runs in its own task on a bounded worker pool and reports
//! through one channel. The first disqualifying report decides the verdict;
//! otherwise the deadline does, unless every case passed before it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument};

use crate::judge::TestCaseExecutor;
use crate::types::{ExecutionOutcome, Judgment, TestCase};

/// One test case's result, tagged with the case it belongs to
#[derive(Debug)]
struct Report {
    case: String,
    outcome: ExecutionOutcome,
}

/// How a race ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub judgment: Judgment,
    /// Test cases that reported Passed before resolution
    pub passed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct VerdictResolver {
    max_parallel: usize,
}

impl VerdictResolver {
    /// A resolver running at most `max_parallel` test cases at once
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
        }
    }

    /// Run every test case and reduce the results to one judgment.
    ///
    /// Tasks still running at resolution are cancelled, which kills their
    /// child processes.
    #[instrument(skip(self, executor, cases), fields(total = cases.len(), max_parallel = self.max_parallel))]
    pub async fn resolve(
        &self,
        executor: Arc<TestCaseExecutor>,
        cases: Vec<TestCase>,
        deadline: Duration,
    ) -> Resolution {
        let total = cases.len();
        if total == 0 {
            debug!("no test cases");
            return Resolution {
                judgment: Judgment::accepted(),
                passed: 0,
                total,
            };
        }

        let passed = Arc::new(AtomicUsize::new(0));
        let permits = Arc::new(Semaphore::new(self.max_parallel));
        let (tx, mut rx) = mpsc::channel::<Report>(total);
        let mut tasks = JoinSet::new();

        for case in cases {
            let executor = executor.clone();
            let permits = permits.clone();
            let passed = passed.clone();
            let tx = tx.clone();
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                let Some(outcome) = executor.execute(&case).await else {
                    return;
                };
                if outcome == ExecutionOutcome::Passed {
                    passed.fetch_add(1, Ordering::SeqCst);
                }
                // The receiver is gone once the race is decided.
                let _ = tx
                    .send(Report {
                        case: case.identity,
                        outcome,
                    })
                    .await;
            });
        }
        drop(tx);

        let timer = tokio::time::sleep(deadline);
        tokio::pin!(timer);

        let at_deadline = |passed: usize| {
            if passed == total {
                Judgment::accepted()
            } else {
                Judgment::timeout()
            }
        };

        let judgment = loop {
            tokio::select! {
                biased;
                report = rx.recv() => match report {
                    Some(report) => {
                        debug!(case = %report.case, outcome = report.outcome.kind(), "test case reported");
                        if let Some(judgment) = Judgment::from_disqualifier(&report.outcome) {
                            break judgment;
                        }
                        if passed.load(Ordering::SeqCst) == total {
                            break Judgment::accepted();
                        }
                    }
                    None => {
                        // Every task is done but some cases never reported.
                        (&mut timer).await;
                        break at_deadline(passed.load(Ordering::SeqCst));
                    }
                },
                () = &mut timer => {
                    debug!("deadline reached");
                    break at_deadline(passed.load(Ordering::SeqCst));
                }
            }
        };

        tasks.shutdown().await;

        let passed = passed.load(Ordering::SeqCst);
        info!(verdict = %judgment.verdict, passed, total, "race resolved");
        Resolution {
            judgment,
            passed,
            total,
        }
    }
}
