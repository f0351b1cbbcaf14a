//! Coverage aggregation integration tests.
//!
//! Exercises the merge edge cases and the artifact search against real
//! directory trees, with a stub merge tool standing in for reportgenerator.

use cildev::console::Console;
use cildev::coverage::{
    find_interchange_artifact, merge_artifacts, CoverageArtifact, CoverageError, SuiteKind,
    MANAGED_ARTIFACT_NAME, NATIVE_ARTIFACT_NAME,
};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const VALID_COBERTURA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<coverage line-rate="0.91" branch-rate="0.8" lines-covered="91" lines-valid="100">
  <packages/>
</coverage>"#;

fn write_artifact(dir: &Path, name: &str) -> CoverageArtifact {
    let path = dir.join(name);
    fs::write(&path, VALID_COBERTURA).unwrap();
    CoverageArtifact {
        suite: SuiteKind::Managed,
        path,
    }
}

#[test]
fn test_zero_artifacts_is_a_hard_failure_with_no_report() {
    let results = tempdir().unwrap();
    let err = merge_artifacts(&[], results.path(), None, &Console::plain()).unwrap_err();
    assert!(matches!(err, CoverageError::NoArtifacts));
    assert!(err.to_string().contains("no coverage data collected"));
    assert!(!results.path().join("CoverageReport").exists());
}

#[test]
fn test_single_artifact_without_merge_tool_degrades_gracefully() {
    let results = tempdir().unwrap();
    let artifact = write_artifact(results.path(), MANAGED_ARTIFACT_NAME);

    let report = merge_artifacts(&[artifact], results.path(), None, &Console::plain()).unwrap();
    assert!(report.is_none());
    assert!(!results.path().join("CoverageReport").exists());
}

#[cfg(unix)]
#[test]
fn test_merge_with_stub_tool_produces_report_directory() {
    use std::os::unix::fs::PermissionsExt;

    let results = tempdir().unwrap();
    let managed = write_artifact(results.path(), MANAGED_ARTIFACT_NAME);
    let native = CoverageArtifact {
        suite: SuiteKind::Native,
        path: {
            let p = results.path().join(NATIVE_ARTIFACT_NAME);
            fs::write(&p, VALID_COBERTURA).unwrap();
            p
        },
    };

    // Stub reportgenerator: creates the target dir and a text summary.
    let tool = results.path().join("reportgenerator");
    fs::write(
        &tool,
        "#!/bin/sh\n\
         for arg in \"$@\"; do\n\
           case \"$arg\" in\n\
             -targetdir:*) dir=\"${arg#-targetdir:}\" ;;\n\
           esac\n\
         done\n\
         mkdir -p \"$dir\"\n\
         echo 'Line coverage: 91%' > \"$dir/Summary.txt\"\n\
         echo '<html></html>' > \"$dir/index.html\"\n",
    )
    .unwrap();
    fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

    let report = merge_artifacts(
        &[managed, native],
        results.path(),
        Some(&tool),
        &Console::plain(),
    )
    .unwrap()
    .expect("report directory");

    assert_eq!(report, results.path().join("CoverageReport"));
    assert!(report.join("Summary.txt").exists());
    assert!(report.join("index.html").exists());
}

#[cfg(unix)]
#[test]
fn test_merge_tool_failure_propagates() {
    use std::os::unix::fs::PermissionsExt;

    let results = tempdir().unwrap();
    let artifact = write_artifact(results.path(), MANAGED_ARTIFACT_NAME);

    let tool = results.path().join("reportgenerator");
    fs::write(&tool, "#!/bin/sh\nexit 3\n").unwrap();
    fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

    let err = merge_artifacts(&[artifact], results.path(), Some(&tool), &Console::plain())
        .unwrap_err();
    assert!(matches!(err, CoverageError::Exec(_)));
}

#[test]
fn test_artifact_search_finds_nested_interchange_file() {
    let root = tempdir().unwrap();
    let nested = root.path().join("cs").join("8f2a41d9").join("x");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join(MANAGED_ARTIFACT_NAME), VALID_COBERTURA).unwrap();

    let (path, summary) = find_interchange_artifact(root.path(), MANAGED_ARTIFACT_NAME).unwrap();
    assert!(path.starts_with(root.path()));
    assert!((summary.line_rate - 0.91).abs() < 1e-9);
    assert_eq!(summary.lines_valid, Some(100));
}

#[test]
fn test_artifact_search_ignores_wrong_schema_and_wrong_name() {
    let root = tempdir().unwrap();
    fs::write(root.path().join("coverage.xml"), VALID_COBERTURA).unwrap();
    fs::write(
        root.path().join(MANAGED_ARTIFACT_NAME),
        "<testsuites/>",
    )
    .unwrap();

    assert!(find_interchange_artifact(root.path(), MANAGED_ARTIFACT_NAME).is_none());
}

#[test]
fn test_artifact_search_is_idempotent() {
    let root = tempdir().unwrap();
    fs::write(root.path().join(MANAGED_ARTIFACT_NAME), VALID_COBERTURA).unwrap();

    let first = find_interchange_artifact(root.path(), MANAGED_ARTIFACT_NAME).unwrap();
    let second = find_interchange_artifact(root.path(), MANAGED_ARTIFACT_NAME).unwrap();
    assert_eq!(first.0, second.0);
}
