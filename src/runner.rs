//! Step recorder and phase pipeline.
//!
//! Steps are declared in order and executed immediately; a failing step is
//! recorded and the run continues, so one invocation yields the maximal set
//! of diagnostics. The aggregate failed count is the run's success signal.

use crate::reporter::Reporter;
use anyhow::Result;
use std::time::Instant;

/// Result of a step action: an optional annotation, or a failure.
pub type StepResult = Result<Option<String>>;

/// A unit of checked work. The pipeline is agnostic to the concrete
/// behavior; any closure returning [`StepResult`] qualifies.
pub trait StepAction {
    fn execute(&mut self) -> StepResult;
}

impl<F> StepAction for F
where
    F: FnMut() -> StepResult,
{
    fn execute(&mut self) -> StepResult {
        (self)()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Passed,
    Failed,
}

impl StepOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepOutcome::Passed => "pass",
            StepOutcome::Failed => "fail",
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, StepOutcome::Passed)
    }
}

/// Permanent record of one executed step.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub name: String,
    pub outcome: StepOutcome,
    pub annotation: Option<String>,
    pub error: Option<String>,
}

/// Aggregate tallies for a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// `(step name, error message)` for every failed step, in run order.
    pub failures: Vec<(String, String)>,
}

/// Sequences named steps grouped into named phases and records outcomes.
pub struct PipelineRunner<'a> {
    reporter: &'a mut dyn Reporter,
    records: Vec<StepRecord>,
}

impl<'a> PipelineRunner<'a> {
    pub fn new(reporter: &'a mut dyn Reporter) -> Self {
        Self {
            reporter,
            records: Vec::new(),
        }
    }

    /// Announce the next phase. Steps declared afterwards belong to it.
    pub fn phase(&mut self, name: &str) {
        self.reporter.on_phase_start(name);
    }

    /// Execute `action` synchronously and record its outcome. Any failure is
    /// caught here and never propagates; the run always continues.
    pub fn step<A: StepAction>(&mut self, name: &str, mut action: A) -> StepOutcome {
        let index = self.records.len() + 1;
        self.reporter.on_step_start(index, name);

        let started = Instant::now();
        let (outcome, annotation, error) = match action.execute() {
            Ok(annotation) => (StepOutcome::Passed, annotation, None),
            Err(e) => (StepOutcome::Failed, None, Some(format!("{e:#}"))),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        self.reporter.on_step_finished(
            index,
            name,
            outcome,
            duration_ms,
            annotation.as_deref(),
            error.as_deref(),
        );
        self.records.push(StepRecord {
            name: name.to_string(),
            outcome,
            annotation,
            error,
        });
        outcome
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn failed(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.outcome == StepOutcome::Failed)
            .count()
    }

    /// Emit the run-finished event and yield the aggregate summary.
    pub fn finish(self) -> RunSummary {
        let failed = self.failed();
        let summary = RunSummary {
            total: self.records.len(),
            passed: self.records.len() - failed,
            failed,
            failures: self
                .records
                .iter()
                .filter(|r| r.outcome == StepOutcome::Failed)
                .map(|r| {
                    (
                        r.name.clone(),
                        r.error.clone().unwrap_or_else(|| "step failed".to_string()),
                    )
                })
                .collect(),
        };
        self.reporter.on_run_finished(&summary);
        summary
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
