//! Process runner integration tests against real child processes.

use cildev::process::{find_tool, run, ExecError};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_capture_collects_stdout_and_stderr() {
    let out = run(
        &["sh", "-c", "echo to-stdout; echo to-stderr >&2"],
        None,
        true,
        true,
    )
    .unwrap();
    assert!(out.ok());
    assert_eq!(out.stdout.trim(), "to-stdout");
    assert_eq!(out.stderr.trim(), "to-stderr");
}

#[test]
fn test_working_directory_is_honored() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("marker.txt"), b"").unwrap();

    let out = run(&["ls"], Some(dir.path()), true, true).unwrap();
    assert!(out.stdout.contains("marker.txt"));
}

#[test]
fn test_nonzero_exit_surfaces_as_code_without_fail_fast() {
    let out = run(&["sh", "-c", "exit 42"], None, true, false).unwrap();
    assert_eq!(out.code, 42);
    assert!(!out.ok());
}

#[test]
fn test_fail_fast_produces_execution_error() {
    let err = run(&["sh", "-c", "exit 7"], None, true, true).unwrap_err();
    match err {
        ExecError::Failed { code, command, .. } => {
            assert_eq!(code, 7);
            assert!(command.contains("sh -c"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[test]
fn test_failure_diagnostics_are_tail_truncated() {
    // 2000 numbered lines of output; only the tail survives in the error.
    let err = run(
        &["sh", "-c", "seq 1 2000; echo LAST-LINE; exit 1"],
        None,
        true,
        true,
    )
    .unwrap_err();
    match err {
        ExecError::Failed { stdout_tail, .. } => {
            assert!(stdout_tail.len() <= 500);
            assert!(stdout_tail.contains("LAST-LINE"));
            assert!(!stdout_tail.contains("\n1\n2\n"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[test]
fn test_missing_program_is_a_spawn_error() {
    let err = run(&["cildev-no-such-tool-9000"], None, true, true).unwrap_err();
    assert!(matches!(err, ExecError::Spawn { .. }));
    assert!(err.to_string().contains("cildev-no-such-tool-9000"));
}

#[test]
fn test_find_tool_resolves_absolute_path() {
    let sh = find_tool("sh").expect("sh on PATH");
    assert!(sh.is_absolute());
    assert!(sh.is_file());
}

#[test]
fn test_find_tool_misses_cleanly() {
    assert!(find_tool("cildev-no-such-tool-9000").is_none());
}
