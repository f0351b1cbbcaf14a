//! Trait-based pipeline output for human (CLI) and machine (JSON) formats.
//!
//! `HumanReporter` writes readable progress to stderr; `JsonReporter` emits
//! NDJSON events on stdout for IDE/CI integration. When the JSON reporter is
//! active, only valid JSON goes to stdout — everything else stays on stderr.

use crate::console::Console;
use crate::runner::{RunSummary, StepOutcome};
use serde::Serialize;

/// Machine-readable events for JSON output.
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MachineEvent<'a> {
    /// Emitted when a phase is announced
    PhaseStart { name: &'a str },
    /// Emitted when a step begins execution
    StepStart { index: usize, name: &'a str },
    /// Emitted when a step completes
    StepFinished {
        index: usize,
        name: &'a str,
        status: &'a str,
        duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotation: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<&'a str>,
    },
    /// Emitted once at end of run
    RunFinished {
        total: usize,
        passed: usize,
        failed: usize,
    },
}

/// Event callbacks fired by the pipeline runner.
pub trait Reporter {
    fn on_phase_start(&mut self, name: &str);

    fn on_step_start(&mut self, index: usize, name: &str);

    fn on_step_finished(
        &mut self,
        index: usize,
        name: &str,
        outcome: StepOutcome,
        duration_ms: u64,
        annotation: Option<&str>,
        message: Option<&str>,
    );

    fn on_run_finished(&mut self, summary: &RunSummary);
}

// =============================================================================
// HumanReporter
// =============================================================================

/// Human-readable progress on stderr, one numbered line per step.
pub struct HumanReporter {
    console: Console,
}

impl HumanReporter {
    pub fn new(console: Console) -> Self {
        Self { console }
    }
}

impl Reporter for HumanReporter {
    fn on_phase_start(&mut self, name: &str) {
        self.console.header(name);
    }

    fn on_step_start(&mut self, index: usize, name: &str) {
        eprint!("  [{index}] {name} ... ");
    }

    fn on_step_finished(
        &mut self,
        _index: usize,
        _name: &str,
        outcome: StepOutcome,
        _duration_ms: u64,
        annotation: Option<&str>,
        message: Option<&str>,
    ) {
        if let Some(extra) = annotation {
            eprint!("({extra}) ");
        }
        match outcome {
            StepOutcome::Passed => eprintln!("{}", self.console.green("PASS")),
            StepOutcome::Failed => {
                eprintln!("{}", self.console.red("FAIL"));
                if let Some(msg) = message {
                    for line in msg.lines().take(10) {
                        eprintln!("       {line}");
                    }
                }
            }
        }
    }

    fn on_run_finished(&mut self, summary: &RunSummary) {
        eprintln!();
        eprintln!("  Total:  {}", summary.total);
        self.console.success(&format!("  Passed: {}", summary.passed));
        if summary.failed > 0 {
            self.console.error(&format!("  Failed: {}", summary.failed));
            eprintln!();
            self.console.error("  Failures:");
            for (name, message) in &summary.failures {
                let first = message.lines().next().unwrap_or(message);
                self.console.error(&format!("    - {name}: {first}"));
            }
        } else {
            self.console.success(&format!("  Failed: {}", summary.failed));
        }
        eprintln!();
    }
}

// =============================================================================
// JsonReporter
// =============================================================================

/// NDJSON events on stdout.
pub struct JsonReporter;

impl JsonReporter {
    fn emit(event: &MachineEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            println!("{json}");
        }
    }
}

impl Reporter for JsonReporter {
    fn on_phase_start(&mut self, name: &str) {
        Self::emit(&MachineEvent::PhaseStart { name });
    }

    fn on_step_start(&mut self, index: usize, name: &str) {
        Self::emit(&MachineEvent::StepStart { index, name });
    }

    fn on_step_finished(
        &mut self,
        index: usize,
        name: &str,
        outcome: StepOutcome,
        duration_ms: u64,
        annotation: Option<&str>,
        message: Option<&str>,
    ) {
        Self::emit(&MachineEvent::StepFinished {
            index,
            name,
            status: outcome.as_str(),
            duration_ms,
            annotation,
            message,
        });
    }

    fn on_run_finished(&mut self, summary: &RunSummary) {
        Self::emit(&MachineEvent::RunFinished {
            total: summary.total,
            passed: summary.passed,
            failed: summary.failed,
        });
    }
}

// =============================================================================
// MultiReporter & NullReporter
// =============================================================================

/// Broadcasts events to multiple reporters.
pub struct MultiReporter {
    reporters: Vec<Box<dyn Reporter>>,
}

impl MultiReporter {
    pub fn new(reporters: Vec<Box<dyn Reporter>>) -> Self {
        Self { reporters }
    }
}

impl Reporter for MultiReporter {
    fn on_phase_start(&mut self, name: &str) {
        for r in &mut self.reporters {
            r.on_phase_start(name);
        }
    }

    fn on_step_start(&mut self, index: usize, name: &str) {
        for r in &mut self.reporters {
            r.on_step_start(index, name);
        }
    }

    fn on_step_finished(
        &mut self,
        index: usize,
        name: &str,
        outcome: StepOutcome,
        duration_ms: u64,
        annotation: Option<&str>,
        message: Option<&str>,
    ) {
        for r in &mut self.reporters {
            r.on_step_finished(index, name, outcome, duration_ms, annotation, message);
        }
    }

    fn on_run_finished(&mut self, summary: &RunSummary) {
        for r in &mut self.reporters {
            r.on_run_finished(summary);
        }
    }
}

/// Discards all events. Used by tests and headless callers.
pub struct NullReporter;

impl Reporter for NullReporter {
    fn on_phase_start(&mut self, _name: &str) {}

    fn on_step_start(&mut self, _index: usize, _name: &str) {}

    fn on_step_finished(
        &mut self,
        _index: usize,
        _name: &str,
        _outcome: StepOutcome,
        _duration_ms: u64,
        _annotation: Option<&str>,
        _message: Option<&str>,
    ) {
    }

    fn on_run_finished(&mut self, _summary: &RunSummary) {}
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_finished_serialization() {
        let event = MachineEvent::StepFinished {
            index: 3,
            name: "CMake configure",
            status: "pass",
            duration_ms: 42,
            annotation: None,
            message: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"step_finished\""));
        assert!(json.contains("\"name\":\"CMake configure\""));
        assert!(json.contains("\"status\":\"pass\""));
        assert!(!json.contains("annotation"));
        assert!(!json.contains("message"));
    }

    #[test]
    fn test_step_finished_with_failure_message() {
        let event = MachineEvent::StepFinished {
            index: 1,
            name: "Run HelloWorld",
            status: "fail",
            duration_ms: 100,
            annotation: None,
            message: Some("output mismatch"),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"message\":\"output mismatch\""));
    }

    #[test]
    fn test_phase_start_serialization() {
        let event = MachineEvent::PhaseStart {
            name: "Phase 1: HelloWorld",
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"phase_start\""));
    }

    #[test]
    fn test_run_finished_serialization() {
        let event = MachineEvent::RunFinished {
            total: 10,
            passed: 8,
            failed: 2,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"total\":10"));
        assert!(json.contains("\"failed\":2"));
    }

    #[test]
    fn test_multi_reporter_broadcasts() {
        let reporters: Vec<Box<dyn Reporter>> = vec![Box::new(NullReporter), Box::new(NullReporter)];
        let mut multi = MultiReporter::new(reporters);
        multi.on_phase_start("Phase 0");
        multi.on_step_start(1, "probe");
        multi.on_step_finished(1, "probe", StepOutcome::Passed, 5, Some("v1"), None);
        multi.on_run_finished(&RunSummary::default());
    }
}
