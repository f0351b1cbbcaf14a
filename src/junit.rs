//! JUnit XML reporter for CI integration.
//!
//! Buffers step results during the run and writes a JUnit-compatible XML
//! report on completion, usable by Jenkins, GitLab CI, and GitHub Actions.
//! Phase names become test-case class names.

use crate::reporter::Reporter;
use crate::runner::{RunSummary, StepOutcome};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

/// Strip ANSI escape sequences and null bytes; XML consumers choke on both.
fn strip_ansi_codes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_escape = false;
    for c in s.chars() {
        if in_escape {
            if c.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else if c == '\x1b' {
            in_escape = true;
        } else if c != '\0' {
            out.push(c);
        }
    }
    out
}

// =============================================================================
// XML Schema Structs (JUnit Format)
// =============================================================================

#[derive(Serialize)]
#[serde(rename = "testsuites")]
struct TestSuites {
    #[serde(rename = "testsuite")]
    suites: Vec<TestSuite>,
}

#[derive(Serialize)]
struct TestSuite {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@tests")]
    tests: usize,
    #[serde(rename = "@failures")]
    failures: usize,
    #[serde(rename = "@errors")]
    errors: usize,
    #[serde(rename = "@skipped")]
    skipped: usize,
    #[serde(rename = "@time")]
    time: f64,
    #[serde(rename = "testcase")]
    cases: Vec<TestCase>,
}

#[derive(Serialize)]
struct TestCase {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@classname")]
    classname: String,
    #[serde(rename = "@time")]
    time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<Failure>,
}

#[derive(Serialize)]
struct Failure {
    #[serde(rename = "@message")]
    message: String,
    #[serde(rename = "$text")]
    body: String,
}

// =============================================================================
// JunitReporter
// =============================================================================

/// Reporter that buffers pipeline steps and writes JUnit XML on completion.
pub struct JunitReporter {
    output_path: PathBuf,
    current_phase: String,
    cases: Vec<TestCase>,
    start_time: Instant,
}

impl JunitReporter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            output_path: path,
            current_phase: "pipeline".to_string(),
            cases: Vec::new(),
            start_time: Instant::now(),
        }
    }

    #[cfg(test)]
    fn case_count(&self) -> usize {
        self.cases.len()
    }
}

impl Reporter for JunitReporter {
    fn on_phase_start(&mut self, name: &str) {
        self.current_phase = name.to_string();
    }

    fn on_step_start(&mut self, _index: usize, _name: &str) {
        // JUnit has no step-start event; results are buffered on finish.
    }

    fn on_step_finished(
        &mut self,
        _index: usize,
        name: &str,
        outcome: StepOutcome,
        duration_ms: u64,
        _annotation: Option<&str>,
        message: Option<&str>,
    ) {
        let failure = match outcome {
            StepOutcome::Passed => None,
            StepOutcome::Failed => Some(Failure {
                message: "step failed".to_string(),
                body: strip_ansi_codes(message.unwrap_or("step failed")),
            }),
        };
        self.cases.push(TestCase {
            name: name.to_string(),
            classname: self.current_phase.clone(),
            time: duration_ms as f64 / 1000.0,
            failure,
        });
    }

    fn on_run_finished(&mut self, summary: &RunSummary) {
        let suite = TestSuite {
            name: "cildev-pipeline".to_string(),
            tests: summary.total,
            failures: summary.failed,
            errors: 0,
            skipped: 0,
            time: self.start_time.elapsed().as_millis() as f64 / 1000.0,
            cases: std::mem::take(&mut self.cases),
        };
        let root = TestSuites {
            suites: vec![suite],
        };

        match File::create(&self.output_path) {
            Ok(file) => {
                let mut writer = BufWriter::new(file);
                let _ = writer.write_all(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
                match quick_xml::se::to_string(&root) {
                    Ok(xml) => {
                        if let Err(e) = writer.write_all(xml.as_bytes()) {
                            eprintln!("[cildev] failed to write JUnit report: {e}");
                        } else {
                            eprintln!(
                                "[cildev] JUnit report written to {}",
                                self.output_path.display()
                            );
                        }
                    }
                    Err(e) => eprintln!("[cildev] failed to serialize JUnit report: {e}"),
                }
            }
            Err(e) => eprintln!("[cildev] failed to create JUnit report: {e}"),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi_codes() {
        assert_eq!(strip_ansi_codes("\x1b[31mRed text\x1b[0m"), "Red text");
        assert_eq!(strip_ansi_codes("plain text"), "plain text");
        assert_eq!(strip_ansi_codes("\x1b[1m\x1b[31mBold Red\x1b[0m"), "Bold Red");
    }

    #[test]
    fn test_strip_null_bytes() {
        assert_eq!(strip_ansi_codes("text\0with\0nulls"), "textwithnulls");
    }

    #[test]
    fn test_reporter_buffers_steps_under_current_phase() {
        let mut reporter = JunitReporter::new(PathBuf::from("/tmp/junit.xml"));
        reporter.on_phase_start("Phase 0: Prerequisites");
        reporter.on_step_finished(1, "dotnet SDK available", StepOutcome::Passed, 12, None, None);
        reporter.on_phase_start("Phase 1: HelloWorld");
        reporter.on_step_finished(
            2,
            "Run HelloWorld and verify output",
            StepOutcome::Failed,
            800,
            None,
            Some("output mismatch"),
        );

        assert_eq!(reporter.case_count(), 2);
        assert_eq!(reporter.cases[0].classname, "Phase 0: Prerequisites");
        assert!(reporter.cases[0].failure.is_none());
        assert_eq!(reporter.cases[1].classname, "Phase 1: HelloWorld");
        let failure = reporter.cases[1].failure.as_ref().unwrap();
        assert_eq!(failure.body, "output mismatch");
    }

    #[test]
    fn test_time_converted_to_seconds() {
        let mut reporter = JunitReporter::new(PathBuf::from("/tmp/junit.xml"));
        reporter.on_step_finished(1, "build", StepOutcome::Passed, 1500, None, None);
        assert!((reporter.cases[0].time - 1.5).abs() < 0.001);
    }

    #[test]
    fn test_report_written_on_run_finished() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xml");
        let mut reporter = JunitReporter::new(path.clone());
        reporter.on_phase_start("Phase 4: String literals");
        reporter.on_step_finished(
            1,
            "header contains init hook",
            StepOutcome::Failed,
            3,
            None,
            Some("\x1b[31mmissing __init_string_literals\x1b[0m"),
        );
        reporter.on_run_finished(&RunSummary {
            total: 1,
            passed: 0,
            failed: 1,
            failures: vec![],
        });

        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\""));
        assert!(xml.contains("testsuites"));
        assert!(xml.contains("cildev-pipeline"));
        assert!(xml.contains("missing __init_string_literals"));
        assert!(!xml.contains('\x1b'));
    }
}
