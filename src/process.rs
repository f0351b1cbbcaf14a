//! External process execution.
//!
//! Every component funnels child-process work through [`run`]. Failures are
//! real signal: there are no retries, and no timeouts are enforced, so a hung
//! tool blocks the run.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Trailing characters of captured output kept in error diagnostics.
const TAIL_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("command failed with exit code {code}: `{command}`{}", render_tails(.stdout_tail, .stderr_tail))]
    Failed {
        command: String,
        code: i32,
        stdout_tail: String,
        stderr_tail: String,
    },
}

/// Captured result of a completed child process.
#[derive(Debug)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(&self) -> bool {
        self.code == 0
    }
}

/// Execute `argv`, optionally capturing output, optionally treating a
/// non-zero exit as an error. Blocks until the child terminates.
///
/// With `capture` unset the child inherits stdio and the returned output
/// strings are empty. With `fail_fast` set a non-zero exit becomes
/// [`ExecError::Failed`], carrying the output tails for diagnostics.
pub fn run<S: AsRef<OsStr>>(
    argv: &[S],
    cwd: Option<&Path>,
    capture: bool,
    fail_fast: bool,
) -> Result<CommandOutput, ExecError> {
    let command = render_argv(argv);
    let Some((program, rest)) = argv.split_first() else {
        return Err(ExecError::Spawn {
            command,
            source: io::Error::new(io::ErrorKind::InvalidInput, "empty command line"),
        });
    };

    let mut child = Command::new(program);
    child.args(rest);
    if let Some(dir) = cwd {
        child.current_dir(dir);
    }

    let (status, stdout, stderr) = if capture {
        let out = child.output().map_err(|source| ExecError::Spawn {
            command: command.clone(),
            source,
        })?;
        (
            out.status,
            String::from_utf8_lossy(&out.stdout).into_owned(),
            String::from_utf8_lossy(&out.stderr).into_owned(),
        )
    } else {
        let status = child.status().map_err(|source| ExecError::Spawn {
            command: command.clone(),
            source,
        })?;
        (status, String::new(), String::new())
    };

    // Killed-by-signal has no exit code; fold it into a generic failure code.
    let code = status.code().unwrap_or(-1);
    if fail_fast && code != 0 {
        return Err(ExecError::Failed {
            command,
            code,
            stdout_tail: tail(&stdout, TAIL_CHARS).to_string(),
            stderr_tail: tail(&stderr, TAIL_CHARS).to_string(),
        });
    }

    Ok(CommandOutput {
        code,
        stdout,
        stderr,
    })
}

/// Probe every `PATH` entry for an executable with the platform suffix.
pub fn find_tool(name: &str) -> Option<PathBuf> {
    let file_name = format!("{name}{}", std::env::consts::EXE_SUFFIX);
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(&file_name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Render a path as a command-line argument.
pub fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

fn render_argv<S: AsRef<OsStr>>(argv: &[S]) -> String {
    argv.iter()
        .map(|a| a.as_ref().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Last `limit` characters of `s`, on a char boundary.
pub(crate) fn tail(s: &str, limit: usize) -> &str {
    let count = s.chars().count();
    if count <= limit {
        return s;
    }
    match s.char_indices().nth(count - limit) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

fn render_tails(stdout_tail: &str, stderr_tail: &str) -> String {
    let mut out = String::new();
    if !stdout_tail.trim().is_empty() {
        out.push_str("\n--- stdout (tail) ---\n");
        out.push_str(stdout_tail.trim_end());
    }
    if !stderr_tail.trim().is_empty() {
        out.push_str("\n--- stderr (tail) ---\n");
        out.push_str(stderr_tail.trim_end());
    }
    out
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_short_string_unchanged() {
        assert_eq!(tail("hello", 10), "hello");
        assert_eq!(tail("hello", 5), "hello");
    }

    #[test]
    fn test_tail_truncates_to_last_chars() {
        assert_eq!(tail("abcdefgh", 3), "fgh");
    }

    #[test]
    fn test_tail_respects_char_boundaries() {
        let s = "héllo wörld";
        let t = tail(s, 4);
        assert_eq!(t, "örld");
    }

    #[test]
    fn test_render_argv_joins_with_spaces() {
        assert_eq!(render_argv(&["cmake", "--build", "out"]), "cmake --build out");
    }

    #[test]
    fn test_empty_argv_is_spawn_error() {
        let err = run::<&str>(&[], None, true, true).unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }

    #[test]
    fn test_run_captures_stdout() {
        let out = run(&["echo", "hello"], None, true, true).unwrap();
        assert!(out.ok());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn test_run_nonzero_without_fail_fast() {
        let out = run(&["sh", "-c", "exit 3"], None, true, false).unwrap();
        assert_eq!(out.code, 3);
        assert!(!out.ok());
    }

    #[test]
    fn test_run_fail_fast_carries_output_tails() {
        let err = run(
            &["sh", "-c", "echo diagnostic-output; echo diagnostic-error >&2; exit 1"],
            None,
            true,
            true,
        )
        .unwrap_err();
        match err {
            ExecError::Failed {
                code,
                stdout_tail,
                stderr_tail,
                ..
            } => {
                assert_eq!(code, 1);
                assert!(stdout_tail.contains("diagnostic-output"));
                assert!(stderr_tail.contains("diagnostic-error"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn test_fail_fast_error_message_includes_tails() {
        let err = run(&["sh", "-c", "echo boom >&2; exit 2"], None, true, true).unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("exit code 2"));
        assert!(rendered.contains("boom"));
    }

    #[test]
    fn test_spawn_error_for_missing_program() {
        let err = run(&["definitely-not-a-real-tool-4242"], None, true, true).unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }

    #[test]
    fn test_find_tool_locates_shell() {
        assert!(find_tool("sh").is_some());
        assert!(find_tool("definitely-not-a-real-tool-4242").is_none());
    }
}
