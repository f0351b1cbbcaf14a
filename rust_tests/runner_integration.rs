//! Pipeline runner integration tests.
//!
//! Exercises the step recorder against a reporter that records every event,
//! verifying ordering, bookkeeping, and the continue-on-failure policy.

use anyhow::bail;
use cildev::reporter::Reporter;
use cildev::runner::{PipelineRunner, RunSummary, StepOutcome, StepResult};

/// Records every reporter callback for later inspection.
#[derive(Default)]
struct RecordingReporter {
    events: Vec<String>,
    finished: Option<RunSummary>,
}

impl Reporter for RecordingReporter {
    fn on_phase_start(&mut self, name: &str) {
        self.events.push(format!("phase:{name}"));
    }

    fn on_step_start(&mut self, index: usize, name: &str) {
        self.events.push(format!("start:{index}:{name}"));
    }

    fn on_step_finished(
        &mut self,
        index: usize,
        name: &str,
        outcome: StepOutcome,
        _duration_ms: u64,
        annotation: Option<&str>,
        _message: Option<&str>,
    ) {
        self.events.push(format!(
            "finish:{index}:{name}:{}:{}",
            outcome.as_str(),
            annotation.unwrap_or("-")
        ));
    }

    fn on_run_finished(&mut self, summary: &RunSummary) {
        self.finished = Some(summary.clone());
    }
}

#[test]
fn test_all_steps_run_in_declaration_order_despite_failures() {
    let mut reporter = RecordingReporter::default();
    let mut runner = PipelineRunner::new(&mut reporter);

    runner.phase("Phase A");
    runner.step("one", || -> StepResult { Ok(None) });
    runner.step("two", || -> StepResult { bail!("broken tool") });
    runner.phase("Phase B");
    runner.step("three", || -> StepResult { Ok(None) });

    let summary = runner.finish();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.passed, 2);
    assert_eq!(summary.failed, 1);

    let starts: Vec<&String> = reporter
        .events
        .iter()
        .filter(|e| e.starts_with("start:"))
        .collect();
    assert_eq!(starts, vec!["start:1:one", "start:2:two", "start:3:three"]);
}

#[test]
fn test_summary_counts_match_for_every_failure_position() {
    // For N steps with the failure at any position, failed = 1, passed = N-1.
    const N: usize = 6;
    for failing in 0..N {
        let mut reporter = RecordingReporter::default();
        let mut runner = PipelineRunner::new(&mut reporter);
        for i in 0..N {
            if i == failing {
                runner.step(&format!("step{i}"), || -> StepResult { bail!("boom") });
            } else {
                runner.step(&format!("step{i}"), || -> StepResult { Ok(None) });
            }
        }
        let summary = runner.finish();
        assert_eq!(summary.total, N);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.passed, N - 1);
        assert_eq!(summary.failures[0].0, format!("step{failing}"));
    }
}

#[test]
fn test_each_step_appears_exactly_once() {
    let mut reporter = RecordingReporter::default();
    let mut runner = PipelineRunner::new(&mut reporter);
    for i in 0..10 {
        runner.step(&format!("step{i}"), || -> StepResult { Ok(None) });
    }
    runner.finish();

    for i in 0..10 {
        let needle = format!(":step{i}:");
        let count = reporter
            .events
            .iter()
            .filter(|e| e.starts_with("finish:") && e.contains(&needle))
            .count();
        assert_eq!(count, 1, "step{i} should finish exactly once");
    }
}

#[test]
fn test_annotation_reaches_reporter() {
    let mut reporter = RecordingReporter::default();
    let mut runner = PipelineRunner::new(&mut reporter);
    runner.step("probe", || -> StepResult { Ok(Some("cmake version 3.28.1".to_string())) });
    runner.finish();

    assert!(reporter
        .events
        .iter()
        .any(|e| e.contains("pass:cmake version 3.28.1")));
}

#[test]
fn test_failure_messages_collected_in_run_order() {
    let mut reporter = RecordingReporter::default();
    let mut runner = PipelineRunner::new(&mut reporter);
    runner.step("a", || -> StepResult { bail!("first failure") });
    runner.step("b", || -> StepResult { Ok(None) });
    runner.step("c", || -> StepResult { bail!("second failure") });

    let summary = runner.finish();
    assert_eq!(summary.failures.len(), 2);
    assert_eq!(summary.failures[0].0, "a");
    assert!(summary.failures[0].1.contains("first failure"));
    assert_eq!(summary.failures[1].0, "c");
    assert!(summary.failures[1].1.contains("second failure"));
}

#[test]
fn test_run_finished_summary_is_published() {
    let mut reporter = RecordingReporter::default();
    let mut runner = PipelineRunner::new(&mut reporter);
    runner.step("only", || -> StepResult { Ok(None) });
    runner.finish();

    let published = reporter.finished.expect("run-finished event");
    assert_eq!(published.total, 1);
    assert_eq!(published.failed, 0);
}

#[test]
fn test_error_chain_is_rendered_into_the_record() {
    use anyhow::Context;

    let mut reporter = RecordingReporter::default();
    let mut runner = PipelineRunner::new(&mut reporter);
    runner.step("chained", || -> StepResult {
        let io: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ));
        io.context("failed to read CMakeLists.txt")?;
        Ok(None)
    });

    let summary = runner.finish();
    let message = &summary.failures[0].1;
    assert!(message.contains("failed to read CMakeLists.txt"));
    assert!(message.contains("no such file"));
}
