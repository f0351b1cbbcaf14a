//! Unified coverage pipeline.
//!
//! Two instrumented suites feed one merge: the managed compiler tests
//! (coverlet, Cobertura out of the box) and the native runtime tests, whose
//! collector depends on the host. Everything is normalized to the Cobertura
//! interchange schema before `reportgenerator` merges it.
//!
//! Partial-success policy: a managed collection failure aborts the whole
//! flow, a native collection failure only costs its artifact.

use crate::cobertura::{self, CoverageSummary};
use crate::config::{cmake_arch_args, ProjectLayout};
use crate::console::Console;
use crate::process::{self, path_arg, ExecError};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// File name produced by coverlet's Cobertura exporter.
pub const MANAGED_ARTIFACT_NAME: &str = "coverage.cobertura.xml";
/// File name of the converted native coverage snapshot.
pub const NATIVE_ARTIFACT_NAME: &str = "cpp_coverage.cobertura.xml";

/// lcov snapshot paths excluded before conversion: system headers, the test
/// sources themselves, the test framework, and dependency caches.
const LCOV_EXCLUDE_GLOBS: &[&str] = &["/usr/*", "*/googletest/*", "*/tests/*", "*/.deps/*"];

#[derive(Debug, Error)]
pub enum CoverageError {
    #[error("no coverage data collected")]
    NoArtifacts,
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Which instrumented suite produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteKind {
    Managed,
    Native,
}

/// One interchange-format coverage file, consumed exactly once by the merge.
#[derive(Debug, Clone)]
pub struct CoverageArtifact {
    pub suite: SuiteKind,
    pub path: PathBuf,
}

// =============================================================================
// Orchestration
// =============================================================================

/// Run both collection flows and merge whatever they produced.
pub fn run_coverage(layout: &ProjectLayout, generator: &str, console: &Console) -> Result<()> {
    let results_dir = layout.repo_root.join("CoverageResults");
    if results_dir.exists() {
        fs::remove_dir_all(&results_dir)
            .with_context(|| format!("failed to clear {}", results_dir.display()))?;
    }
    fs::create_dir_all(&results_dir)
        .with_context(|| format!("failed to create {}", results_dir.display()))?;

    let mut artifacts = Vec::new();

    console.header("C# coverage (coverlet)");
    match collect_managed(layout, &results_dir, console)? {
        Some(artifact) => artifacts.push(artifact),
        None => console.warn(&format!("  No {MANAGED_ARTIFACT_NAME} found")),
    }

    console.header("C++ coverage");
    let collector = native_collector();
    match collector.collect(layout, &results_dir, generator, console) {
        Ok(Some(artifact)) => artifacts.push(artifact),
        Ok(None) => {}
        Err(e) => console.warn(&format!("  {} coverage collection failed: {e:#}", collector.label())),
    }

    let merge_tool = process::find_tool("reportgenerator");
    merge_artifacts(&artifacts, &results_dir, merge_tool.as_deref(), console)?;
    Ok(())
}

// =============================================================================
// Collect: managed suite (coverlet)
// =============================================================================

/// Run the compiler tests with inline instrumentation and pick up the first
/// interchange artifact from the results tree. A failed test run aborts the
/// whole coverage flow; a clean run without an artifact is only a warning.
fn collect_managed(
    layout: &ProjectLayout,
    results_dir: &Path,
    console: &Console,
) -> Result<Option<CoverageArtifact>> {
    let managed_dir = results_dir.join("cs");
    let out = process::run(
        &[
            "dotnet".to_string(),
            "test".to_string(),
            path_arg(&layout.test_project),
            "--collect:XPlat Code Coverage".to_string(),
            format!("--results-directory:{}", managed_dir.display()),
            "--verbosity".to_string(),
            "minimal".to_string(),
        ],
        Some(&layout.repo_root),
        false,
        false,
    )?;
    if !out.ok() {
        bail!("managed tests failed during coverage collection (exit code {})", out.code);
    }

    Ok(find_interchange_artifact(&managed_dir, MANAGED_ARTIFACT_NAME).map(|(path, summary)| {
        console.success(&format!(
            "  C# coverage: {} ({})",
            path.display(),
            render_rate(&summary)
        ));
        CoverageArtifact {
            suite: SuiteKind::Managed,
            path,
        }
    }))
}

/// Recursively search `root` for the first file named `file_name` that
/// actually conforms to the interchange schema.
pub fn find_interchange_artifact(root: &Path, file_name: &str) -> Option<(PathBuf, CoverageSummary)> {
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_file() && entry.file_name().to_string_lossy() == file_name {
            if let Ok(summary) = cobertura::inspect(entry.path()) {
                return Some((entry.path().to_path_buf(), summary));
            }
        }
    }
    None
}

fn render_rate(summary: &CoverageSummary) -> String {
    format!("{:.1}% line rate", summary.line_rate * 100.0)
}

// =============================================================================
// Collect: native suite (host-dependent)
// =============================================================================

/// Host-specific native coverage collection. Selected once at startup; the
/// aggregator never branches on the platform inline.
pub trait NativeCoverageCollector {
    fn label(&self) -> &'static str;

    fn collect(
        &self,
        layout: &ProjectLayout,
        results_dir: &Path,
        generator: &str,
        console: &Console,
    ) -> Result<Option<CoverageArtifact>>;
}

/// The collector for the current host.
pub fn native_collector() -> Box<dyn NativeCoverageCollector> {
    if cfg!(windows) {
        Box::new(OpenCppCoverageCollector)
    } else {
        Box::new(LcovCollector)
    }
}

/// Find OpenCppCoverage on PATH or at its conventional install location.
pub fn find_opencppcoverage() -> Option<PathBuf> {
    if let Some(path) = process::find_tool("OpenCppCoverage") {
        return Some(path);
    }
    let default = Path::new("C:/Program Files/OpenCppCoverage/OpenCppCoverage.exe");
    if default.exists() {
        return Some(default.to_path_buf());
    }
    None
}

/// Wraps the already-built test binary with OpenCppCoverage, which exports
/// the interchange schema directly.
pub struct OpenCppCoverageCollector;

impl NativeCoverageCollector for OpenCppCoverageCollector {
    fn label(&self) -> &'static str {
        "OpenCppCoverage"
    }

    fn collect(
        &self,
        layout: &ProjectLayout,
        results_dir: &Path,
        generator: &str,
        console: &Console,
    ) -> Result<Option<CoverageArtifact>> {
        let Some(tool) = find_opencppcoverage() else {
            console.warn("  OpenCppCoverage not found. Install with:");
            console.line("    winget install OpenCppCoverage.OpenCppCoverage");
            console.warn("  Skipping C++ coverage");
            return Ok(None);
        };

        // Debug build: the instrumentation needs PDBs.
        let build_dir = layout.runtime_tests_build_dir();
        let mut configure = vec![
            "cmake".to_string(),
            "-B".to_string(),
            path_arg(&build_dir),
            "-S".to_string(),
            path_arg(&layout.runtime_tests_dir),
            "-G".to_string(),
            generator.to_string(),
        ];
        configure.extend(cmake_arch_args(generator).iter().map(|s| s.to_string()));
        process::run(&configure, Some(&layout.repo_root), true, true)?;
        let build_arg = path_arg(&build_dir);
        process::run(
            &["cmake", "--build", build_arg.as_str(), "--config", "Debug"],
            Some(&layout.repo_root),
            false,
            true,
        )?;

        let test_exe = crate::resolver::executable_path(&build_dir, "Debug", "cil2cpp_tests");
        if !test_exe.exists() {
            bail!("test executable not found: {}", test_exe.display());
        }

        let export_path = results_dir.join(NATIVE_ARTIFACT_NAME);
        process::run(
            &[
                path_arg(&tool),
                "--modules".to_string(),
                path_arg(&test_exe),
                "--sources".to_string(),
                path_arg(&layout.runtime_dir.join("src")),
                "--sources".to_string(),
                path_arg(&layout.runtime_dir.join("include")),
                "--export_type".to_string(),
                format!("cobertura:{}", export_path.display()),
                "--quiet".to_string(),
                "--".to_string(),
                path_arg(&test_exe),
            ],
            Some(&layout.repo_root),
            false,
            true,
        )?;

        if export_path.exists() {
            console.success(&format!("  C++ coverage: {}", export_path.display()));
            Ok(Some(CoverageArtifact {
                suite: SuiteKind::Native,
                path: export_path,
            }))
        } else {
            Ok(None)
        }
    }
}

/// Builds with instrumentation enabled, captures an lcov snapshot, filters
/// it, and converts to the interchange schema when a converter is present.
pub struct LcovCollector;

impl NativeCoverageCollector for LcovCollector {
    fn label(&self) -> &'static str {
        "lcov"
    }

    fn collect(
        &self,
        layout: &ProjectLayout,
        results_dir: &Path,
        generator: &str,
        console: &Console,
    ) -> Result<Option<CoverageArtifact>> {
        let Some(lcov) = process::find_tool("lcov") else {
            console.warn("  lcov not found. Install with: sudo apt install lcov");
            console.warn("  Skipping C++ coverage");
            return Ok(None);
        };

        let build_dir = layout.runtime_tests_build_dir();
        process::run(
            &[
                "cmake".to_string(),
                "-B".to_string(),
                path_arg(&build_dir),
                "-S".to_string(),
                path_arg(&layout.runtime_tests_dir),
                "-G".to_string(),
                generator.to_string(),
                "-DENABLE_COVERAGE=ON".to_string(),
            ],
            Some(&layout.repo_root),
            true,
            true,
        )?;
        let build_arg = path_arg(&build_dir);
        process::run(
            &["cmake", "--build", build_arg.as_str(), "--config", "Debug"],
            Some(&layout.repo_root),
            false,
            true,
        )?;
        process::run(
            &["ctest", "--test-dir", build_arg.as_str(), "-C", "Debug"],
            Some(&layout.repo_root),
            false,
            true,
        )?;

        let raw_snapshot = results_dir.join("coverage.info");
        process::run(
            &[
                path_arg(&lcov),
                "--capture".to_string(),
                "--directory".to_string(),
                path_arg(&build_dir),
                "--output-file".to_string(),
                path_arg(&raw_snapshot),
                "--ignore-errors".to_string(),
                "mismatch".to_string(),
            ],
            Some(&layout.repo_root),
            false,
            true,
        )?;

        let filtered = results_dir.join("coverage_filtered.info");
        let mut remove = vec![
            path_arg(&lcov),
            "--remove".to_string(),
            path_arg(&raw_snapshot),
        ];
        remove.extend(LCOV_EXCLUDE_GLOBS.iter().map(|g| g.to_string()));
        remove.push("--output-file".to_string());
        remove.push(path_arg(&filtered));
        process::run(&remove, Some(&layout.repo_root), false, true)?;

        let Some(converter) = process::find_tool("lcov_cobertura") else {
            console.warn("  lcov_cobertura not found (pip install lcov_cobertura)");
            console.warn("  C++ coverage collected but can't merge with C# report");
            return Ok(None);
        };
        let export_path = results_dir.join(NATIVE_ARTIFACT_NAME);
        process::run(
            &[
                path_arg(&converter),
                path_arg(&filtered),
                "-o".to_string(),
                path_arg(&export_path),
            ],
            Some(&layout.repo_root),
            false,
            true,
        )?;

        if export_path.exists() {
            console.success(&format!("  C++ coverage: {}", export_path.display()));
            Ok(Some(CoverageArtifact {
                suite: SuiteKind::Native,
                path: export_path,
            }))
        } else {
            Ok(None)
        }
    }
}

// =============================================================================
// Merge
// =============================================================================

/// Merge the collected artifacts into one report under `results_dir`.
///
/// Zero artifacts is a hard failure. Without a merge tool the artifact paths
/// are listed and the flow still succeeds: partial data is useful. With a
/// tool, the unified text summary is printed and the HTML report opened.
pub fn merge_artifacts(
    artifacts: &[CoverageArtifact],
    results_dir: &Path,
    merge_tool: Option<&Path>,
    console: &Console,
) -> Result<Option<PathBuf>, CoverageError> {
    if artifacts.is_empty() {
        return Err(CoverageError::NoArtifacts);
    }

    let Some(tool) = merge_tool else {
        console.warn("reportgenerator not found. Install with:");
        console.line("  dotnet tool install -g dotnet-reportgenerator-globaltool");
        for artifact in artifacts {
            console.line(&format!("  Coverage XML: {}", artifact.path.display()));
        }
        return Ok(None);
    };

    console.header("Generating unified coverage report");
    let report_dir = results_dir.join("CoverageReport");
    let reports_arg = artifacts
        .iter()
        .map(|a| a.path.display().to_string())
        .collect::<Vec<_>>()
        .join(";");
    process::run(
        &[
            path_arg(tool),
            format!("-reports:{reports_arg}"),
            format!("-targetdir:{}", report_dir.display()),
            "-reporttypes:HtmlInline_AzurePipelines;TextSummary;Badges".to_string(),
        ],
        None,
        false,
        true,
    )?;

    let summary = report_dir.join("Summary.txt");
    if let Ok(text) = fs::read_to_string(&summary) {
        console.line("");
        console.line(&text);
    }

    let mut index = report_dir.join("index.html");
    if !index.exists() {
        index = report_dir.join("index.htm");
    }
    console.success(&format!("HTML coverage report: {}", index.display()));
    open_report(&index, console);
    Ok(Some(report_dir))
}

/// Open the report in the default browser. Best-effort only.
fn open_report(path: &Path, console: &Console) {
    let argv: Vec<String> = if cfg!(windows) {
        vec![
            "cmd".to_string(),
            "/C".to_string(),
            "start".to_string(),
            String::new(),
            path_arg(path),
        ]
    } else if cfg!(target_os = "macos") {
        vec!["open".to_string(), path_arg(path)]
    } else {
        vec!["xdg-open".to_string(), path_arg(path)]
    };
    if process::run(&argv, None, true, true).is_err() {
        console.warn(&format!("  Could not open {} in a browser", path.display()));
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const VALID_COBERTURA: &str = r#"<?xml version="1.0"?>
<coverage line-rate="0.5" lines-covered="5" lines-valid="10"><packages/></coverage>"#;

    fn artifact(path: &Path) -> CoverageArtifact {
        CoverageArtifact {
            suite: SuiteKind::Managed,
            path: path.to_path_buf(),
        }
    }

    #[test]
    fn test_merge_with_zero_artifacts_is_hard_failure() {
        let dir = tempdir().unwrap();
        let err = merge_artifacts(&[], dir.path(), None, &Console::plain()).unwrap_err();
        assert!(matches!(err, CoverageError::NoArtifacts));
        assert!(!dir.path().join("CoverageReport").exists());
    }

    #[test]
    fn test_merge_without_tool_lists_artifacts_and_succeeds() {
        let dir = tempdir().unwrap();
        let xml = dir.path().join(MANAGED_ARTIFACT_NAME);
        fs::write(&xml, VALID_COBERTURA).unwrap();

        let result =
            merge_artifacts(&[artifact(&xml)], dir.path(), None, &Console::plain()).unwrap();
        assert!(result.is_none());
        assert!(!dir.path().join("CoverageReport").exists());
    }

    #[test]
    fn test_find_interchange_artifact_searches_recursively() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("cs/abc123/deep");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join(MANAGED_ARTIFACT_NAME), VALID_COBERTURA).unwrap();

        let (path, summary) =
            find_interchange_artifact(dir.path(), MANAGED_ARTIFACT_NAME).unwrap();
        assert!(path.ends_with(format!("deep/{MANAGED_ARTIFACT_NAME}")));
        assert!((summary.line_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_find_interchange_artifact_skips_schema_mismatches() {
        let dir = tempdir().unwrap();
        let decoy_dir = dir.path().join("a");
        let real_dir = dir.path().join("b");
        fs::create_dir_all(&decoy_dir).unwrap();
        fs::create_dir_all(&real_dir).unwrap();
        fs::write(
            decoy_dir.join(MANAGED_ARTIFACT_NAME),
            "<testsuites></testsuites>",
        )
        .unwrap();
        fs::write(real_dir.join(MANAGED_ARTIFACT_NAME), VALID_COBERTURA).unwrap();

        let (path, _) = find_interchange_artifact(dir.path(), MANAGED_ARTIFACT_NAME).unwrap();
        assert!(path.starts_with(&real_dir));
    }

    #[test]
    fn test_find_interchange_artifact_none_when_absent() {
        let dir = tempdir().unwrap();
        assert!(find_interchange_artifact(dir.path(), MANAGED_ARTIFACT_NAME).is_none());
    }

    #[test]
    fn test_native_collector_matches_host() {
        let collector = native_collector();
        if cfg!(windows) {
            assert_eq!(collector.label(), "OpenCppCoverage");
        } else {
            assert_eq!(collector.label(), "lcov");
        }
    }

    #[test]
    fn test_lcov_collector_without_tool_skips_quietly() {
        // Guard: only meaningful when lcov is genuinely absent.
        if process::find_tool("lcov").is_some() {
            return;
        }
        let dir = tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        let result = LcovCollector
            .collect(&layout, dir.path(), "Ninja", &Console::plain())
            .unwrap();
        assert!(result.is_none());
    }
}
