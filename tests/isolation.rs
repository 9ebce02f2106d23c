// Process isolation: crashes, hangs, captured output and the child protocol.
#![cfg(unix)]

use std::fs;
use std::io::Read;
use std::process::{Command as StdCommand, Stdio};
use std::time::{Duration, Instant};

use assert_cmd::Command;
use crucible::outcome::{ExecutionOutcome, OutcomeRecord};
use crucible::runner::{channel, IsolatedRunner, Runner};
use crucible::suite::{Suite, TestTree};
use predicates::{prelude::PredicateBooleanExt, str::contains};

const FIXTURES: &str = env!("CARGO_BIN_EXE_crucible-fixtures");

/// Positions in the fixture program's tree.
const FAILS_TEST_ID: usize = 1;
const FAST_TEST_ID: usize = 5;
const CRASHES_TEST_ID: usize = 8;
const HANGS_TEST_ID: usize = 10;
const DAEMON_TEST_ID: usize = 12;
const FIXTURE_TESTS: usize = 13;

/// A parent-side stand-in for the fixture tree; only the ids travel to the
/// child, so the bodies here never run.
fn mirror_tree() -> TestTree {
    let suite = (0..FIXTURE_TESTS).fold(Suite::new("mirror"), |suite, id| {
        suite.test(format!("test {id}"), || Ok(()))
    });
    TestTree::build(vec![suite]).unwrap()
}

fn fixtures() -> Command {
    let mut cmd = Command::cargo_bin("crucible-fixtures").unwrap();
    cmd.env_remove("CRUCIBLE_LOG");
    cmd
}

#[test]
fn a_crash_is_contained_and_the_run_continues() {
    fixtures()
        .args(["-t", "crash", "--output", "verbose", "--color", "never"])
        .assert()
        .code(1)
        .stdout(contains(format!(
            "CRASH: hazards > crashes (signal {})",
            libc::SIGABRT
        )))
        .stdout(contains("PASS: hazards > after crash"))
        .stdout(contains("passed 1, failed 1"));
}

#[test]
fn a_hanging_test_is_killed_at_the_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("hangs.pid");

    fixtures()
        .args(["-t", "hangs", "--timeout", "1000", "--color", "never"])
        .env("CRUCIBLE_FIXTURE_PID_FILE", &pid_file)
        .timeout(Duration::from_secs(30))
        .assert()
        .code(1)
        .stdout(contains("TIMEOUT: hazards > hangs"));

    let pid: libc::pid_t = fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
    // SAFETY: signal 0 only checks whether the process exists.
    let alive = unsafe { libc::kill(pid, 0) } == 0;
    assert!(!alive, "child {pid} outlived its deadline");
    assert_eq!(
        std::io::Error::last_os_error().raw_os_error(),
        Some(libc::ESRCH)
    );
}

#[test]
fn terminal_output_is_shown_only_on_request() {
    fixtures()
        .args(["-t", "prints", "--show-terminal", "--color", "never"])
        .assert()
        .code(1)
        .stdout(contains("FAIL: hazards > prints"))
        .stdout(contains("printed then failed"))
        .stdout(contains("hello from the child"))
        .stdout(contains("and its stderr"));

    fixtures()
        .args(["-t", "prints", "--color", "never"])
        .assert()
        .code(1)
        .stdout(contains("hello from the child").not());
}

#[test]
fn child_mode_writes_one_record() {
    let (mut reader, writer) = channel::result_channel().unwrap();
    let mut command = StdCommand::new(FIXTURES);
    command
        .args(["--child", &writer.handle().to_string()])
        .args(["--child-test", &FAST_TEST_ID.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    writer.inherit_into(&mut command);
    let mut child = command.spawn().unwrap();
    drop(writer);

    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).unwrap();
    assert!(child.wait().unwrap().success());

    let record = OutcomeRecord::decode(&bytes).unwrap();
    assert_eq!(
        record,
        OutcomeRecord {
            test: FAST_TEST_ID,
            outcome: ExecutionOutcome::Passed,
        }
    );
}

#[test]
fn child_mode_rejects_unknown_tests() {
    fixtures()
        .args(["--child", "1", "--child-test", "999"])
        .assert()
        .code(3)
        .stderr(contains("no test with id 999"));
}

#[test]
fn runner_drives_the_fixture_program_directly() {
    let tree = mirror_tree();
    let runner = IsolatedRunner::new(FIXTURES, []).with_timeout(Some(Duration::from_secs(20)));
    let outcome = |id| runner.run(tree.get(id).unwrap()).unwrap().outcome;

    assert_eq!(outcome(FAST_TEST_ID), ExecutionOutcome::Passed);
    assert_eq!(
        outcome(FAILS_TEST_ID),
        ExecutionOutcome::Failed("expected: \"right\"\nactual:   \"left\"".into())
    );
    assert_eq!(
        outcome(CRASHES_TEST_ID),
        ExecutionOutcome::CrashedSignal(libc::SIGABRT)
    );
}

#[test]
fn runner_times_out_a_hanging_child() {
    let tree = mirror_tree();
    let runner = IsolatedRunner::new(FIXTURES, []).with_timeout(Some(Duration::from_millis(300)));
    let report = runner.run(tree.get(HANGS_TEST_ID).unwrap()).unwrap();
    assert_eq!(report.outcome, ExecutionOutcome::TimedOut);
    assert_eq!(report.output, None);
}

#[test]
fn a_background_process_does_not_hold_the_run() {
    let tree = mirror_tree();
    for timeout in [None, Some(Duration::from_secs(20))] {
        let runner = IsolatedRunner::new(FIXTURES, []).with_timeout(timeout);
        let started = Instant::now();
        let report = runner.run(tree.get(DAEMON_TEST_ID).unwrap()).unwrap();
        assert_eq!(report.outcome, ExecutionOutcome::Passed);
        assert!(
            started.elapsed() < Duration::from_secs(3),
            "waited {:?} on a grandchild",
            started.elapsed()
        );
    }
}
