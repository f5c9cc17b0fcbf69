use std::time::{Duration, Instant};

use gavel::process::{Invocation, ProcessRunner, resolve_command};
use gavel::{Counters, JudgeError, JudgeRequest, LocalRunner, Verdict};
use procfs::process::all_processes;

use super::{Harness, USER, fixture_source, test_config};

#[tokio::test]
async fn echo_program_passes_echo_problem() {
    let harness = Harness::new("echo_ok.toml").await;
    let (response, _) = harness.submit("echo-ok", "echo.sh").await;

    assert_eq!(response.verdict, Verdict::Accepted);
    assert_eq!(response.status, 1);

    let expected = Counters {
        pass_num: 1,
        submit_num: 1,
    };
    assert_eq!(harness.store.user_counters(USER).await, Some(expected));
    assert_eq!(harness.store.problem_counters("echo-ok").await, Some(expected));
}

#[tokio::test]
async fn echo_program_fails_mismatched_case() {
    let harness = Harness::new("echo.toml").await;
    let (response, _) = harness.submit("echo", "echo.sh").await;

    assert_eq!(response.verdict, Verdict::WrongAnswer);
    assert!(response.message.contains('3'), "{}", response.message);
    assert!(response.message.contains('2'), "{}", response.message);
    assert_eq!(
        harness.store.problem_counters("echo").await,
        Some(Counters {
            pass_num: 0,
            submit_num: 1
        })
    );
}

#[tokio::test]
async fn infinite_loop_times_out_at_the_deadline() {
    let harness = Harness::new("echo.toml").await;
    let (response, elapsed) = harness.submit("echo", "spin.sh").await;

    assert_eq!(response.verdict, Verdict::Timeout);
    assert_eq!(response.status, 3);
    assert!(elapsed >= Duration::from_millis(1000), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
}

#[tokio::test]
async fn syntax_error_is_compile_error_with_diagnostic() {
    let harness = Harness::new("echo.toml").await;
    let (response, elapsed) = harness.submit("echo", "syntax_error.sh").await;

    assert_eq!(response.verdict, Verdict::CompileError);
    assert_eq!(response.status, 5);
    assert!(elapsed < Duration::from_millis(1000), "{elapsed:?}");

    // The message is exactly what the shell printed for the stored file.
    let submissions = harness.store.submissions().await;
    let path = &submissions[0].path;
    let dir = path.parent().unwrap();
    let mut command = vec!["sh".to_owned(), "main.sh".to_owned()];
    resolve_command(&mut command, dir).unwrap();
    let output = LocalRunner::new()
        .run(&Invocation::new(command, dir), b"", Duration::from_secs(5))
        .await
        .unwrap();
    assert!(!output.stderr.is_empty());
    assert_eq!(response.message, output.stderr_lossy());
}

#[tokio::test]
async fn non_zero_exit_is_compile_error() {
    let harness = Harness::new("echo_ok.toml").await;
    let (response, _) = harness.submit("echo-ok", "crash.sh").await;

    assert_eq!(response.verdict, Verdict::CompileError);
    assert!(response.message.contains('3'), "{}", response.message);
}

#[tokio::test]
async fn code_is_stored_under_code_dir() {
    let harness = Harness::new("echo_ok.toml").await;
    let (response, _) = harness.submit("echo-ok", "echo.sh").await;

    let submissions = harness.store.submissions().await;
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].identity, response.submission_id);

    let path = &submissions[0].path;
    let root = harness.code_dir.path().canonicalize().unwrap();
    assert!(path.starts_with(&root), "{path:?} not under {root:?}");
    assert_eq!(path.file_name().unwrap(), "main.sh");
    assert_eq!(std::fs::read(path).unwrap(), fixture_source("echo.sh"));
}

#[tokio::test]
async fn sequential_workers_still_judge_every_case() {
    let mut config = test_config();
    config.judge.max_parallel = 1;
    let harness = Harness::with_config("echo_ok.toml", config).await;

    let (response, _) = harness.submit("echo-ok", "echo.sh").await;
    assert_eq!(response.verdict, Verdict::Accepted);
}

#[tokio::test]
async fn forbidden_source_is_never_run() {
    let mut config = test_config();
    if let Some(sh) = config.languages.get_mut("sh") {
        sh.forbidden = vec!["while".to_owned()];
    }
    let harness = Harness::with_config("echo.toml", config).await;

    let (response, elapsed) = harness.submit("echo", "spin.sh").await;
    assert_eq!(response.verdict, Verdict::IllegalCode);
    assert!(elapsed < Duration::from_millis(1000), "{elapsed:?}");
    assert_eq!(harness.store.submissions().await.len(), 1);
}

#[tokio::test]
async fn repeated_submissions_accumulate_counters() {
    let harness = Harness::new("echo_ok.toml").await;
    harness.submit("echo-ok", "echo.sh").await;
    harness.submit("echo-ok", "crash.sh").await;
    harness.submit("echo-ok", "echo.sh").await;

    assert_eq!(
        harness.store.user_counters(USER).await,
        Some(Counters {
            pass_num: 2,
            submit_num: 3
        })
    );
    assert_eq!(harness.store.submissions().await.len(), 3);
}

#[tokio::test]
async fn unknown_problem_is_reported() {
    let harness = Harness::new("echo.toml").await;
    let err = harness
        .judge
        .judge(JudgeRequest::new("nope", USER, fixture_source("echo.sh")))
        .await
        .unwrap_err();

    assert!(matches!(err, JudgeError::NotFound(_)));
    assert!(harness.store.submissions().await.is_empty());
}

/// Live processes whose command line is exactly `command`
fn running(command: &[&str]) -> Vec<i32> {
    all_processes()
        .expect("procfs unavailable")
        .filter_map(Result::ok)
        .filter(|process| process.stat().is_ok_and(|stat| stat.state != 'Z'))
        .filter(|process| process.cmdline().is_ok_and(|cmdline| cmdline == command))
        .map(|process| process.pid())
        .collect()
}

#[tokio::test]
async fn timed_out_submission_leaves_no_descendants() {
    let harness = Harness::new("echo.toml").await;
    let (response, _) = harness.submit("echo", "linger.sh").await;
    assert_eq!(response.verdict, Verdict::Timeout);

    let started = Instant::now();
    while !running(&["sleep", "7.77"]).is_empty() && started.elapsed() < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(running(&["sleep", "7.77"]), Vec::<i32>::new());
}

#[tokio::test]
async fn memory_held_by_a_child_process_exceeds_the_limit() {
    let harness = Harness::new("echo_ok.toml").await;
    let (response, _) = harness.submit("echo-ok", "hog.sh").await;

    assert_eq!(response.verdict, Verdict::MemoryExceeded);
    assert_eq!(response.status, 4);
    assert!(response.message.contains("16384"), "{}", response.message);
}
