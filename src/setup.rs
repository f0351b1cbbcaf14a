//! Developer environment setup.
//!
//! Presence probes for the core toolchain plus installation of optional dev
//! tools. Remediation is an explicit ordered ladder attempted in sequence,
//! stopping at the first success; the final outcome is recorded distinctly
//! from "already present".

use crate::console::Console;
use crate::coverage;
use crate::process::{self, path_arg};
use std::path::Path;

/// One installation attempt in a remediation ladder.
pub struct Remediation {
    pub label: &'static str,
    pub argv: &'static [&'static str],
}

/// Install first; a failed install may mean the tool is already registered,
/// so fall back to an update. The two cases are not distinguishable here.
pub const REPORTGENERATOR_REMEDIATIONS: &[Remediation] = &[
    Remediation {
        label: "Installed",
        argv: &[
            "dotnet",
            "tool",
            "install",
            "-g",
            "dotnet-reportgenerator-globaltool",
        ],
    },
    Remediation {
        label: "Updated",
        argv: &[
            "dotnet",
            "tool",
            "update",
            "-g",
            "dotnet-reportgenerator-globaltool",
        ],
    },
];

pub const OPENCPPCOVERAGE_REMEDIATIONS: &[Remediation] = &[Remediation {
    label: "Installed",
    argv: &[
        "winget",
        "install",
        "OpenCppCoverage.OpenCppCoverage",
        "--accept-source-agreements",
        "--accept-package-agreements",
    ],
}];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    AlreadyPresent,
    Remediated(&'static str),
    Failed,
}

/// Attempt each remediation in order, stopping at the first success.
pub fn attempt_remediations(steps: &[Remediation], console: &Console) -> InstallOutcome {
    for step in steps {
        console.line(&format!("    Attempting: {}", step.argv.join(" ")));
        if let Ok(out) = process::run(step.argv, None, false, false) {
            if out.ok() {
                return InstallOutcome::Remediated(step.label);
            }
        }
    }
    InstallOutcome::Failed
}

fn ensure_tool(
    label: &str,
    present: bool,
    ladder: &[Remediation],
    console: &Console,
) -> InstallOutcome {
    if present {
        console.success(&format!("  {label:<25}OK  (already installed)"));
        return InstallOutcome::AlreadyPresent;
    }
    console.warn(&format!("  {label:<25}NOT FOUND"));
    match attempt_remediations(ladder, console) {
        InstallOutcome::Remediated(how) => {
            console.success(&format!("    {how} successfully"));
            InstallOutcome::Remediated(how)
        }
        _ => {
            console.error(&format!("    Failed to install {label}"));
            InstallOutcome::Failed
        }
    }
}

fn probe_version(argv: &[&str]) -> Option<String> {
    let out = process::run(argv, None, true, false).ok()?;
    if !out.ok() {
        return None;
    }
    out.stdout.lines().next().map(|l| l.trim().to_string())
}

fn check_core_tool(label: &str, argv: &[&str], console: &Console) -> bool {
    match process::find_tool(argv[0]) {
        None => {
            console.error(&format!("  {label:<25}NOT FOUND"));
            false
        }
        Some(path) => {
            let detail = probe_version(argv).unwrap_or_else(|| path.display().to_string());
            console.success(&format!("  {label:<25}OK  ({detail})"));
            true
        }
    }
}

fn check_cpp_toolchain(console: &Console) -> bool {
    if cfg!(windows) {
        // cl.exe is only on PATH inside a VS developer prompt; ask vswhere.
        let label = "MSVC (Visual Studio)";
        let program_files = std::env::var("ProgramFiles(x86)")
            .unwrap_or_else(|_| "C:/Program Files (x86)".to_string());
        let vswhere =
            Path::new(&program_files).join("Microsoft Visual Studio/Installer/vswhere.exe");
        if vswhere.exists() {
            let argv = vec![
                path_arg(&vswhere),
                "-latest".to_string(),
                "-property".to_string(),
                "installationVersion".to_string(),
            ];
            if let Ok(out) = process::run(&argv, None, true, false) {
                let version = out.stdout.trim().to_string();
                if !version.is_empty() {
                    console.success(&format!("  {label:<25}OK  (VS {version})"));
                    return true;
                }
            }
            console.error(&format!("  {label:<25}NOT FOUND (no VS installation detected)"));
            false
        } else if process::find_tool("cl").is_some() {
            console.success(&format!("  {label:<25}OK  (cl.exe on PATH)"));
            true
        } else {
            console.error(&format!("  {label:<25}NOT FOUND"));
            false
        }
    } else {
        check_core_tool("C++ compiler (g++)", &["g++", "--version"], console)
    }
}

/// Check prerequisites and install optional dev dependencies.
pub fn cmd_setup(console: &Console) -> usize {
    console.header("Checking core prerequisites");
    let mut found = 0usize;
    let mut total = 0usize;

    let core: &[(&str, &[&str])] = &[
        ("dotnet SDK", &["dotnet", "--version"]),
        ("CMake", &["cmake", "--version"]),
        ("Git", &["git", "--version"]),
    ];
    for (label, argv) in core {
        total += 1;
        if check_core_tool(label, argv, console) {
            found += 1;
        }
    }
    total += 1;
    if check_cpp_toolchain(console) {
        found += 1;
    }

    // ----- Optional dev tools -----
    console.header("Optional dev dependencies");
    let mut installed = 0usize;

    let outcome = ensure_tool(
        "ReportGenerator",
        process::find_tool("reportgenerator").is_some(),
        REPORTGENERATOR_REMEDIATIONS,
        console,
    );
    if matches!(outcome, InstallOutcome::Remediated(_)) {
        installed += 1;
    }

    if cfg!(windows) {
        let outcome = ensure_tool(
            "OpenCppCoverage",
            coverage::find_opencppcoverage().is_some(),
            OPENCPPCOVERAGE_REMEDIATIONS,
            console,
        );
        match outcome {
            InstallOutcome::Remediated(_) => installed += 1,
            InstallOutcome::Failed => console.line(
                "    Manual install: https://github.com/OpenCppCoverage/OpenCppCoverage/releases",
            ),
            InstallOutcome::AlreadyPresent => {}
        }
    } else {
        // No auto-install on Linux; point at the package manager instead.
        if process::find_tool("lcov").is_some() {
            console.success(&format!("  {:<25}OK  (already installed)", "lcov"));
        } else {
            console.warn(&format!("  {:<25}NOT FOUND", "lcov"));
            console.line("    Install with: sudo apt install lcov  (or your distro's package manager)");
        }
        if process::find_tool("lcov_cobertura").is_some() {
            console.success(&format!("  {:<25}OK  (already installed)", "lcov_cobertura"));
        } else {
            console.warn(&format!("  {:<25}NOT FOUND", "lcov_cobertura"));
            console.line("    Install with: pip install lcov_cobertura");
        }
    }

    // ----- Summary -----
    console.header("Setup summary");
    console.success(&format!("  Core tools: {found}/{total} found"));
    if installed > 0 {
        console.success(&format!("  Installed {installed} tool(s) this session"));
    }
    console.line("");
    console.line("  If you just installed tools, you may need to restart your terminal");
    console.line("  for PATH changes to take effect.");
    0
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_stops_at_first_success() {
        let ladder = [
            Remediation {
                label: "first",
                argv: &["false"],
            },
            Remediation {
                label: "second",
                argv: &["true"],
            },
            Remediation {
                label: "never reached",
                argv: &["false"],
            },
        ];
        let outcome = attempt_remediations(&ladder, &Console::plain());
        assert_eq!(outcome, InstallOutcome::Remediated("second"));
    }

    #[test]
    fn test_ladder_with_all_failures() {
        let ladder = [
            Remediation {
                label: "first",
                argv: &["false"],
            },
            Remediation {
                label: "second",
                argv: &["false"],
            },
        ];
        assert_eq!(
            attempt_remediations(&ladder, &Console::plain()),
            InstallOutcome::Failed
        );
    }

    #[test]
    fn test_empty_ladder_fails() {
        assert_eq!(
            attempt_remediations(&[], &Console::plain()),
            InstallOutcome::Failed
        );
    }

    #[test]
    fn test_already_present_is_distinct_from_remediated() {
        let present = ensure_tool("sh", true, REPORTGENERATOR_REMEDIATIONS, &Console::plain());
        assert_eq!(present, InstallOutcome::AlreadyPresent);
        assert_ne!(present, InstallOutcome::Remediated("Installed"));
    }

    #[test]
    fn test_reportgenerator_ladder_is_install_then_update() {
        assert_eq!(REPORTGENERATOR_REMEDIATIONS.len(), 2);
        assert!(REPORTGENERATOR_REMEDIATIONS[0].argv.contains(&"install"));
        assert!(REPORTGENERATOR_REMEDIATIONS[1].argv.contains(&"update"));
    }
}
