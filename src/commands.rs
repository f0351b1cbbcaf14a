//! Pass-through commands over the build system and test suites.
//!
//! These carry no pipeline logic of their own: build, install, and codegen
//! delegate directly to `dotnet` and `cmake`; `cmd_test` dispatches to the
//! suites and accumulates a failure count.

use crate::config::{cmake_arch_args, BuildConfig, IntegrationOptions, ProjectLayout};
use crate::console::Console;
use crate::coverage;
use crate::integration;
use crate::process::{self, path_arg};
use crate::reporter::Reporter;
use anyhow::Result;
use std::path::{Path, PathBuf};

fn configure_argv(build: &Path, source: &Path, generator: &str) -> Vec<String> {
    let mut argv = vec![
        "cmake".to_string(),
        "-B".to_string(),
        path_arg(build),
        "-S".to_string(),
        path_arg(source),
        "-G".to_string(),
        generator.to_string(),
    ];
    argv.extend(cmake_arch_args(generator).iter().map(|s| s.to_string()));
    argv
}

fn build_argv(build: &Path, config: &str) -> Vec<String> {
    vec![
        "cmake".to_string(),
        "--build".to_string(),
        path_arg(build),
        "--config".to_string(),
        config.to_string(),
    ]
}

// =============================================================================
// build
// =============================================================================

pub fn cmd_build(
    layout: &ProjectLayout,
    compiler: bool,
    runtime: bool,
    config: BuildConfig,
    generator: &str,
    console: &Console,
) -> Result<usize> {
    // No selection means both.
    let build_compiler = compiler || !runtime;
    let build_runtime = runtime || !compiler;

    if build_compiler {
        console.header("Building compiler");
        process::run(
            &[
                "dotnet".to_string(),
                "build".to_string(),
                path_arg(&layout.core_project),
            ],
            Some(&layout.repo_root),
            false,
            true,
        )?;
        console.success("Compiler build succeeded");
    }

    if build_runtime {
        console.header(&format!("Building runtime ({})", config.as_str()));
        let build_dir = layout.runtime_build_dir();
        process::run(
            &configure_argv(&build_dir, &layout.runtime_dir, generator),
            Some(&layout.repo_root),
            false,
            true,
        )?;
        process::run(
            &build_argv(&build_dir, config.as_str()),
            Some(&layout.repo_root),
            false,
            true,
        )?;
        console.success(&format!("Runtime build succeeded ({})", config.as_str()));
    }

    Ok(0)
}

// =============================================================================
// test
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct TestSelection {
    pub compiler: bool,
    pub runtime: bool,
    pub integration: bool,
    pub all: bool,
    pub coverage: bool,
}

/// Which suites a selection enables: `(compiler, runtime, integration)`.
/// No explicit suite means both unit suites; integration is opt-in.
pub fn resolve_selection(sel: &TestSelection) -> (bool, bool, bool) {
    let default_unit = !sel.compiler && !sel.runtime && !sel.integration;
    (
        sel.compiler || sel.all || default_unit,
        sel.runtime || sel.all || default_unit,
        sel.integration || sel.all,
    )
}

pub fn cmd_test(
    layout: &ProjectLayout,
    sel: &TestSelection,
    opts: &IntegrationOptions,
    console: &Console,
    reporter: &mut dyn Reporter,
) -> Result<usize> {
    let (run_compiler, run_runtime, run_integ) = resolve_selection(sel);
    let mut failures = 0usize;

    if run_compiler {
        console.header("Compiler tests (xUnit)");
        if sel.coverage {
            if let Err(e) = coverage::run_coverage(layout, &opts.generator, console) {
                console.error(&format!("{e:#}"));
                failures += 1;
            }
        } else {
            let argv = [
                "dotnet".to_string(),
                "test".to_string(),
                path_arg(&layout.test_project),
                "--verbosity".to_string(),
                "minimal".to_string(),
            ];
            match process::run(&argv, Some(&layout.repo_root), false, true) {
                Ok(_) => console.success("Compiler tests passed"),
                Err(_) => {
                    console.error("Compiler tests FAILED");
                    failures += 1;
                }
            }
        }
    }

    if run_runtime {
        console.header("Runtime tests (Google Test)");
        match run_runtime_tests(layout, &opts.generator, console) {
            Ok(()) => console.success("Runtime tests passed"),
            Err(e) => {
                console.error("Runtime tests FAILED");
                console.line(&format!("  {e:#}"));
                failures += 1;
            }
        }
    }

    if run_integ {
        failures += integration::run_integration(layout, opts, console, reporter)?;
    }

    Ok(failures)
}

fn run_runtime_tests(layout: &ProjectLayout, generator: &str, _console: &Console) -> Result<()> {
    let build_dir = layout.runtime_tests_build_dir();
    process::run(
        &configure_argv(&build_dir, &layout.runtime_tests_dir, generator),
        Some(&layout.repo_root),
        true,
        true,
    )?;
    process::run(
        &build_argv(&build_dir, "Debug"),
        Some(&layout.repo_root),
        false,
        true,
    )?;
    let build_arg = path_arg(&build_dir);
    process::run(
        &[
            "ctest",
            "--test-dir",
            build_arg.as_str(),
            "-C",
            "Debug",
            "--output-on-failure",
        ],
        Some(&layout.repo_root),
        false,
        true,
    )?;
    Ok(())
}

// =============================================================================
// install
// =============================================================================

pub fn cmd_install(
    layout: &ProjectLayout,
    prefix: &str,
    configs: &[&str],
    generator: &str,
    console: &Console,
) -> Result<usize> {
    console.header(&format!("Installing runtime to {prefix}"));
    let build_dir = layout.runtime_build_dir();
    process::run(
        &configure_argv(&build_dir, &layout.runtime_dir, generator),
        Some(&layout.repo_root),
        false,
        true,
    )?;

    for config in configs {
        console.line(&format!("\n  Building {config}..."));
        process::run(
            &build_argv(&build_dir, config),
            Some(&layout.repo_root),
            false,
            true,
        )?;
        console.line(&format!("  Installing {config}..."));
        process::run(
            &[
                "cmake".to_string(),
                "--install".to_string(),
                path_arg(&build_dir),
                "--config".to_string(),
                config.to_string(),
                "--prefix".to_string(),
                prefix.to_string(),
            ],
            Some(&layout.repo_root),
            false,
            true,
        )?;
    }

    console.success(&format!("Runtime installed to {prefix}"));
    Ok(0)
}

// =============================================================================
// codegen
// =============================================================================

/// Resolve the codegen input: a bare sample name maps into the samples tree,
/// anything with a path separator or a `.csproj` suffix is taken literally.
pub fn resolve_codegen_input(
    layout: &ProjectLayout,
    sample: Option<&str>,
    input: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(name) = sample {
        if !name.ends_with(".csproj") && !name.contains('/') && !name.contains('\\') {
            return Some(layout.sample_project(name));
        }
        return Some(PathBuf::from(name));
    }
    input.map(Path::to_path_buf)
}

pub fn cmd_codegen(
    layout: &ProjectLayout,
    sample: Option<&str>,
    input: Option<&Path>,
    output: &Path,
    config: BuildConfig,
    console: &Console,
) -> Result<usize> {
    let Some(csproj) = resolve_codegen_input(layout, sample, input) else {
        console.error("Specify a sample name or -i <path.csproj>");
        return Ok(1);
    };
    if !csproj.exists() {
        console.error(&format!("Not found: {}", csproj.display()));
        return Ok(1);
    }

    let display_name = csproj
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    console.header(&format!("Codegen: {display_name} ({})", config.as_str()));
    process::run(
        &integration::codegen_argv(layout, &csproj, output, Some(config.as_str()), false),
        Some(&layout.repo_root),
        false,
        true,
    )?;
    console.success(&format!("Output: {}", output.display()));
    Ok(0)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(compiler: bool, runtime: bool, integration: bool, all: bool) -> TestSelection {
        TestSelection {
            compiler,
            runtime,
            integration,
            all,
            coverage: false,
        }
    }

    #[test]
    fn test_no_flags_selects_both_unit_suites() {
        assert_eq!(
            resolve_selection(&sel(false, false, false, false)),
            (true, true, false)
        );
    }

    #[test]
    fn test_single_suite_flags_are_exclusive() {
        assert_eq!(
            resolve_selection(&sel(true, false, false, false)),
            (true, false, false)
        );
        assert_eq!(
            resolve_selection(&sel(false, true, false, false)),
            (false, true, false)
        );
        assert_eq!(
            resolve_selection(&sel(false, false, true, false)),
            (false, false, true)
        );
    }

    #[test]
    fn test_all_flag_selects_everything() {
        assert_eq!(
            resolve_selection(&sel(false, false, false, true)),
            (true, true, true)
        );
    }

    #[test]
    fn test_codegen_input_sample_name_maps_into_samples_tree() {
        let layout = ProjectLayout::new(Path::new("/repo"));
        let resolved = resolve_codegen_input(&layout, Some("HelloWorld"), None).unwrap();
        assert_eq!(
            resolved,
            Path::new("/repo/compiler/samples/HelloWorld/HelloWorld.csproj")
        );
    }

    #[test]
    fn test_codegen_input_explicit_paths_taken_literally() {
        let layout = ProjectLayout::new(Path::new("/repo"));
        let by_suffix = resolve_codegen_input(&layout, Some("Custom.csproj"), None).unwrap();
        assert_eq!(by_suffix, Path::new("Custom.csproj"));

        let by_separator =
            resolve_codegen_input(&layout, Some("projects/App/App.csproj"), None).unwrap();
        assert_eq!(by_separator, Path::new("projects/App/App.csproj"));

        let by_input =
            resolve_codegen_input(&layout, None, Some(Path::new("/x/y.csproj"))).unwrap();
        assert_eq!(by_input, Path::new("/x/y.csproj"));
    }

    #[test]
    fn test_codegen_input_missing_everything() {
        let layout = ProjectLayout::new(Path::new("/repo"));
        assert!(resolve_codegen_input(&layout, None, None).is_none());
    }
}
