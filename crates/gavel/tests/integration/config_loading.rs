use std::path::PathBuf;

use gavel::ResourceLimits;
use gavel::config::{Config, OutputComparison, ProblemFile};

use super::{FIXTURES_PATH, fixture_problem};

#[test]
fn test_load_valid_full_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_full.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert_eq!(config.judge.max_parallel, 2);
    assert_eq!(config.judge.code_dir, PathBuf::from("/var/lib/gavel/code"));
    assert_eq!(config.judge.comparison, OutputComparison::TrimTrailing);
    assert_eq!(config.judge.default_language, "python3");
    assert_eq!(config.judge.kill_grace_ms, 50);
    assert_eq!(config.judge.sample_interval_ms, 10);
    assert_eq!(config.default_limits.time_limit_ms, Some(2000));

    let python = config.get_language("python3").unwrap();
    assert_eq!(python.forbidden, vec!["subprocess"]);
    assert_eq!(python.run.env.values().collect::<Vec<_>>(), vec!["1"]);

    let c = config.get_language("c").unwrap();
    let compile = c.compile.as_ref().unwrap();
    assert_eq!(compile.output_name, "prog");
    assert_eq!(
        compile.limits.and_then(|limits| limits.time_limit_ms),
        Some(10000)
    );
}

#[test]
fn test_load_minimal_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_minimal.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert!(config.languages.contains_key("sh"));
    assert_eq!(config.judge.max_parallel, 4);
}

#[test]
fn test_load_invalid_empty_name() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_empty_name.toml");
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_load_invalid_empty_run_command() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_empty_run_command.toml");
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_load_invalid_zero_parallel() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_zero_parallel.toml");
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_load_invalid_extension() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_extension.toml");
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_load_missing_config() {
    assert!(Config::from_file("/nonexistent/gavel.toml").is_err());
}

#[test]
fn test_embedded_config_matches_example_file() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/gavel.example.toml");
    let from_file = Config::from_file(path).expect("Failed to load example config");
    let embedded = Config::default();

    assert_eq!(from_file.languages.len(), embedded.languages.len());
    assert_eq!(from_file.default_limits, embedded.default_limits);
}

#[test]
fn test_load_problem_file() {
    let problem = fixture_problem("echo_ok.toml");
    let (problem, cases) = problem.into_parts(&ResourceLimits::unset()).unwrap();

    assert_eq!(problem.identity, "echo-ok");
    assert_eq!(problem.max_runtime, 1000);
    let ids: Vec<_> = cases.iter().map(|case| case.identity.as_str()).collect();
    assert_eq!(ids, vec!["first", "second", "empty"]);
    assert!(cases.iter().all(|case| case.problem_identity == "echo-ok"));
}

#[test]
fn test_problem_case_identities_default_to_position() {
    let (_, cases) = fixture_problem("echo.toml")
        .into_parts(&ResourceLimits::unset())
        .unwrap();
    assert_eq!(cases[0].identity, "echo-1");
    assert_eq!(cases[1].identity, "echo-2");
}

#[test]
fn test_problem_without_limits_uses_config_defaults() {
    let path = format!("{FIXTURES_PATH}/configs/valid_full.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    let (problem, _) = fixture_problem("echo_defaults.toml")
        .into_parts(&config.default_limits)
        .unwrap();
    assert_eq!(problem.max_runtime, 2000);
    assert_eq!(problem.max_mem, 131072);
}

#[test]
fn test_load_missing_problem() {
    assert!(ProblemFile::from_file("/nonexistent/problem.toml").is_err());
}
