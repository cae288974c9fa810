//! End-to-end stress runs against real shell programs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use stressjudge::config::{CodeTemplate, Config, DefaultNaming};
use stressjudge::console::{Console, MemorySink};
use stressjudge::runner::{Role, SystemRunner};
use stressjudge::{RunOutcome, StressRequest, StressTester};

fn shell_config() -> Config {
    Config {
        templates: vec![CodeTemplate {
            alias: "sh".to_string(),
            lang: "POSIX shell".to_string(),
            suffix: vec!["sh".to_string()],
            before_script: String::new(),
            script: "sh $%path%$$%full%$".to_string(),
            after_script: String::new(),
        }],
        default_naming: DefaultNaming {
            solve: "$%task%$.sh".to_string(),
            brute: "$%task%$-brute.sh".to_string(),
            generator: "$%task%$-gen.sh".to_string(),
            test_in: "$%task%$GenTest$%test%$.in".to_string(),
        },
        workers: 10,
    }
}

/// Write the three programs of task `A` into a fresh directory
fn task_dir(generator: &str, brute: &str, solve: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("A-gen.sh"), generator).unwrap();
    fs::write(dir.path().join("A-brute.sh"), brute).unwrap();
    fs::write(dir.path().join("A.sh"), solve).unwrap();
    dir
}

fn tester(dir: &Path, workers: usize) -> StressTester {
    let request = StressRequest {
        workers: Some(workers),
        base_dir: dir.to_path_buf(),
        ..StressRequest::new("A")
    };
    StressTester::new(shell_config(), request, Arc::new(SystemRunner))
}

fn saved_inputs(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == "in"))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_matching_programs_run_until_interrupted() {
    let dir = task_dir("cat; echo\n", "cat\n", "cat\n");
    let sink = MemorySink::new();

    let result = tokio::time::timeout(
        Duration::from_millis(1500),
        tester(dir.path(), 4).run(Console::memory(sink.clone())),
    )
    .await;

    assert!(result.is_err(), "a run without counterexample must not finish");
    let output = sink.contents();
    assert!(output.contains("Test #1: OK"));
    assert!(!output.contains("WRONG ANSWER"));
    assert!(!output.contains("FINISHED"));
    assert!(saved_inputs(dir.path()).is_empty());
}

#[tokio::test]
async fn test_mismatch_stops_at_first_test() {
    let dir = task_dir("cat\n", "echo ok\n", "echo ko\n");
    let sink = MemorySink::new();

    let report = tester(dir.path(), 1)
        .run(Console::memory(sink.clone()))
        .await
        .unwrap();

    match report.outcome {
        RunOutcome::Counterexample {
            test_id,
            input_path,
        } => {
            assert_eq!(test_id, 1);
            let input_path = input_path.unwrap();
            assert_eq!(input_path, dir.path().join("AGenTest1.in"));
            assert_eq!(fs::read_to_string(input_path).unwrap(), "1");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(report.tests_passed, 0);

    let output = sink.contents();
    assert!(output.starts_with("Test #1: WRONG ANSWER\nexpected: ok\nfound:    ko\n"));
    assert!(output.ends_with("----FINISHED----\n"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_mismatch_reports_once() {
    let dir = task_dir("cat\n", "echo ok\n", "echo ko\n");
    let sink = MemorySink::new();

    let report = tester(dir.path(), 10)
        .run(Console::memory(sink.clone()))
        .await
        .unwrap();

    assert_eq!(sink.contents().matches("WRONG ANSWER").count(), 1);
    assert_eq!(saved_inputs(dir.path()).len(), 1);
    match report.outcome {
        RunOutcome::Counterexample { test_id, .. } => assert!((1..=10).contains(&test_id)),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_generator_failure_stops_pool() {
    let dir = task_dir("echo broken >&2; exit 3\n", "cat\n", "cat\n");
    let sink = MemorySink::new();

    let report = tester(dir.path(), 3)
        .run(Console::memory(sink.clone()))
        .await
        .unwrap();

    match report.outcome {
        RunOutcome::PipelineFailure(e) => {
            assert_eq!(e.role, Role::Generator);
            assert!(e.to_string().contains("exited with code 3\nbroken"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(sink.contents().matches("generator failed").count(), 1);
    assert!(saved_inputs(dir.path()).is_empty());
}

#[tokio::test]
async fn test_crashing_solve_is_reported_with_role() {
    let dir = task_dir("cat\n", "cat\n", "read n; [ \"$n\" -lt 3 ] && echo $n || exit 1\n");
    let sink = MemorySink::new();

    let report = tester(dir.path(), 1)
        .run(Console::memory(sink.clone()))
        .await
        .unwrap();

    assert_eq!(report.tests_passed, 2);
    match report.outcome {
        RunOutcome::PipelineFailure(e) => {
            assert_eq!(e.role, Role::Solve);
            assert_eq!(e.test_id, 3);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_program_fails_before_start() {
    let dir = task_dir("cat\n", "cat\n", "cat\n");
    fs::remove_file(dir.path().join("A-brute.sh")).unwrap();

    let err = tester(dir.path(), 2)
        .run(Console::memory(MemorySink::new()))
        .await
        .unwrap_err();

    assert!(err.is_pre_run());
    assert!(err.to_string().contains("A-brute.sh"));
}

#[tokio::test]
async fn test_programs_run_relative_to_base_dir() {
    let dir = task_dir("cat\n", "echo ok\n", "echo ko\n");
    let mut config = shell_config();
    config.templates[0].before_script = "test -f $%full%$".to_string();
    config.templates[0].script = "sh $%full%$".to_string();
    let request = StressRequest {
        workers: Some(1),
        base_dir: dir.path().to_path_buf(),
        ..StressRequest::new("A")
    };

    let report = StressTester::new(config, request, Arc::new(SystemRunner))
        .run(Console::memory(MemorySink::new()))
        .await
        .unwrap();

    match report.outcome {
        RunOutcome::Counterexample { test_id, input_path } => {
            assert_eq!(test_id, 1);
            assert_eq!(input_path, Some(dir.path().join("AGenTest1.in")));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cleanup_runs_after_cancelled_run() {
    let dir = task_dir("cat; echo\n", "cat\n", "cat\n");
    let mut config = shell_config();
    config.templates[0].after_script = "touch $%file%$.cleaned".to_string();
    let request = StressRequest {
        workers: Some(2),
        base_dir: dir.path().to_path_buf(),
        ..StressRequest::new("A")
    };
    let sink = MemorySink::new();
    let mut console = Console::memory(sink.clone());

    let prepared = StressTester::new(config, request, Arc::new(SystemRunner))
        .prepare(&mut console)
        .await
        .unwrap();
    let cancelled = tokio::time::timeout(
        Duration::from_millis(500),
        prepared.execute(console),
    )
    .await;
    assert!(cancelled.is_err());
    prepared.cleanup().await;

    for stem in ["A", "A-brute", "A-gen"] {
        assert!(dir.path().join(format!("{stem}.cleaned")).exists(), "{stem} not cleaned up");
    }
    assert!(!sink.contents().contains("FINISHED"));
}

#[tokio::test]
async fn test_cleanup_runs_after_finished_run() {
    let dir = task_dir("cat\n", "echo ok\n", "echo ko\n");
    let mut config = shell_config();
    config.templates[0].after_script = "touch $%file%$.cleaned".to_string();
    let request = StressRequest {
        workers: Some(1),
        base_dir: dir.path().to_path_buf(),
        ..StressRequest::new("A")
    };

    let report = StressTester::new(config, request, Arc::new(SystemRunner))
        .run(Console::memory(MemorySink::new()))
        .await
        .unwrap();

    assert!(matches!(report.outcome, RunOutcome::Counterexample { .. }));
    for stem in ["A", "A-brute", "A-gen"] {
        assert!(dir.path().join(format!("{stem}.cleaned")).exists());
    }
}
