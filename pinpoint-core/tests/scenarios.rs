//! End-to-end pipeline scenarios driven through real `sh` processes

use std::path::PathBuf;

use pinpoint_core::{
    Config, CursorPosition, EventLog, FixedExecutable, RunEvent, RunOutcome, RunRequest, Session,
    Severity,
};
use tempfile::TempDir;

/// Config whose build step and test executable are both shell scripts
fn config(build_dir: &TempDir, build_script: &str, test_script: &str) -> Config {
    let mut config = Config::default();
    config.build.command = "sh".to_string();
    config.build.args = vec!["-c".to_string(), build_script.to_string()];
    config.build.directory = build_dir.path().to_path_buf();
    // `sh -c <script> sh <filter args...>` exposes the filter args as $1, $2
    config.runner.args = vec!["-c".to_string(), test_script.to_string(), "sh".to_string()];
    config
}

fn source() -> Vec<String> {
    let mut lines: Vec<String> = (1..=12).map(|i| format!("// line {}", i)).collect();
    lines[7] = "Test(math, add) {".to_string();
    lines[9] = "    cr_assert(add_test());".to_string();
    lines[10] = "}".to_string();
    lines
}

fn request(lines: &[String], cursor_line: usize) -> RunRequest {
    RunRequest::for_cursor(
        "foo.c",
        lines,
        CursorPosition::new(cursor_line, 0),
        &FixedExecutable(PathBuf::from("sh")),
    )
}

#[tokio::test]
async fn scenario_a_passing_run_has_no_diagnostics() {
    let dir = TempDir::new().unwrap();
    let session = Session::new(&config(
        &dir,
        "exit 0",
        r#"echo '{"tests":[{"suite":"math","name":"add","passed":true}]}'"#,
    ));
    let lines = source();
    let mut log = EventLog::new();

    let outcome = session.run(&request(&lines, 9), &lines, &mut log).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Completed {
            exit_code: 0,
            failures: 0,
            diagnostics: Vec::new(),
        }
    );
    assert!(log.diagnostics.is_empty());
    assert_eq!(log.events.last(), Some(&RunEvent::Exit { code: 0 }));
    assert_eq!(log.exit_codes(), vec![0]);
}

#[tokio::test]
async fn scenario_b_build_failure_stops_the_pipeline() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("spawned");
    let session = Session::new(&config(
        &dir,
        "echo 'error: foo.c:10'; exit 1",
        &format!("touch '{}'", marker.display()),
    ));
    let lines = source();
    let mut log = EventLog::new();

    let outcome = session.run(&request(&lines, 9), &lines, &mut log).await.unwrap();

    assert_eq!(outcome, RunOutcome::BuildFailed { exit_code: 1 });
    assert_eq!(log.stderr_lines(), vec!["error: foo.c:10"]);
    assert_eq!(log.exit_codes(), vec![1]);
    assert!(!marker.exists(), "test process must not be spawned");
}

#[tokio::test]
async fn scenario_c_failure_maps_to_zero_based_line() {
    let dir = TempDir::new().unwrap();
    let session = Session::new(&config(
        &dir,
        "exit 0",
        r#"echo '{"tests":[{"suite":"math","name":"add","passed":false,"message":"foo.c:10: assertion failed"}]}'; exit 1"#,
    ));
    let lines = source();
    assert!(lines[9].contains("add_test"));
    let mut log = EventLog::new();

    let outcome = session.run(&request(&lines, 9), &lines, &mut log).await.unwrap();

    let diagnostics = outcome.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].line, 9);
    assert_eq!(diagnostics[0].severity, Severity::Error);
    assert_eq!(diagnostics[0].message, "foo.c:10: assertion failed");
    assert_eq!(diagnostics[0].source, "pinpoint");
    assert_eq!(log.diagnostics, diagnostics);
    assert_eq!(log.exit_codes(), vec![1]);
}

#[tokio::test]
async fn scenario_d_truncated_report_is_not_a_clean_run() {
    let dir = TempDir::new().unwrap();
    let session = Session::new(&config(
        &dir,
        "exit 0",
        r#"printf '{"tests":[{"suite":"math"'"#,
    ));
    let lines = source();
    let mut log = EventLog::new();

    let outcome = session.run(&request(&lines, 9), &lines, &mut log).await.unwrap();

    assert_eq!(outcome, RunOutcome::Undecodable { exit_code: 0 });
    assert!(outcome.diagnostics().is_empty());
    assert!(log.diagnostics.is_empty());
    assert_eq!(log.exit_codes(), vec![0]);
    assert!(session.last_report().is_none());
}

#[tokio::test]
async fn filter_args_and_stderr_reach_the_caller_in_order() {
    let dir = TempDir::new().unwrap();
    let session = Session::new(&config(
        &dir,
        "echo quietly building",
        r#"echo "args: $1 $2" >&2; echo progress >&2; echo '{"tests":[]}'"#,
    ));
    let lines = source();
    let mut log = EventLog::new();

    session.run(&request(&lines, 10), &lines, &mut log).await.unwrap();

    // Successful build output is not forwarded
    assert_eq!(
        log.events,
        vec![
            RunEvent::Stderr {
                text: "args: --filter math/add".to_string()
            },
            RunEvent::Stderr {
                text: "progress".to_string()
            },
            RunEvent::Exit { code: 0 },
        ]
    );
}

#[tokio::test]
async fn buffer_without_tests_runs_nothing() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("built");
    let session = Session::new(&config(
        &dir,
        &format!("touch '{}'", marker.display()),
        "exit 0",
    ));
    let lines = vec!["int helper(void) { return 1; }".to_string()];
    let mut log = EventLog::new();
    let request = request(&lines, 0);
    assert!(!request.can_run());

    let outcome = session.run(&request, &lines, &mut log).await.unwrap();

    assert_eq!(outcome, RunOutcome::NothingToRun);
    assert!(log.nothing_to_run);
    assert!(log.events.is_empty());
    assert!(!marker.exists(), "nothing should be built");
}
