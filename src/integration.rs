//! End-to-end integration pipeline.
//!
//! Drives the code generator and the native build system against real sample
//! projects inside an ephemeral workspace, then checks the generated
//! artifacts. Later phases depend on filesystem state left by earlier ones,
//! so declaration order is load-bearing. A failing step never stops the run;
//! one invocation reports everything that is broken.

use crate::config::{cmake_arch_args, IntegrationOptions, ProjectLayout};
use crate::console::Console;
use crate::process::{self, path_arg};
use crate::reporter::Reporter;
use crate::resolver;
use crate::runner::{PipelineRunner, StepResult};
use crate::workspace::Workspace;
use anyhow::{ensure, Context, Result};
use std::fs;
use std::path::Path;

/// Exact stdout required from the built HelloWorld sample.
pub const EXPECTED_HELLO_OUTPUT: &str = "Hello, CIL2CPP!\n30\n42";

const LIBRARY_CSPROJ: &str = "<Project Sdk=\"Microsoft.NET.Sdk\">\n\
  <PropertyGroup>\n\
    <TargetFramework>net8.0</TargetFramework>\n\
    <OutputType>Library</OutputType>\n\
  </PropertyGroup>\n\
</Project>\n";

const LIBRARY_SOURCE: &str = "public class MathHelper\n\
{\n\
    private int _value;\n\
    public int Add(int a, int b) { return a + b; }\n\
    public int Multiply(int a, int b) { return a * b; }\n\
    public void SetValue(int v) { _value = v; }\n\
    public int GetValue() { return _value; }\n\
}\n";

// =============================================================================
// Generated-artifact assertions
// =============================================================================
// Read-only filesystem checks; running one twice against an unchanged tree
// yields the same result.

/// Files every generated executable project must contain.
pub fn generated_project_files(assembly: &str) -> Vec<String> {
    vec![
        format!("{assembly}.h"),
        format!("{assembly}.cpp"),
        "main.cpp".to_string(),
        "CMakeLists.txt".to_string(),
    ]
}

pub fn require_files<S: AsRef<str>>(dir: &Path, files: &[S]) -> Result<()> {
    for file in files {
        let file = file.as_ref();
        ensure!(dir.join(file).exists(), "missing generated file: {file}");
    }
    Ok(())
}

/// Compare captured program output against the expected text. Windows line
/// endings are normalized first; a mismatch reports both texts verbatim.
pub fn verify_program_output(raw_stdout: &str) -> Result<()> {
    let normalized = raw_stdout.replace("\r\n", "\n");
    let got = normalized.trim();
    ensure!(
        got == EXPECTED_HELLO_OUTPUT,
        "output mismatch.\nExpected:\n{EXPECTED_HELLO_OUTPUT}\nGot:\n{got}"
    );
    Ok(())
}

pub fn verify_line_directives(source: &str) -> Result<()> {
    ensure!(
        source.contains("#line"),
        "no #line directives found in Debug output"
    );
    Ok(())
}

pub fn verify_il_offset_comments(source: &str) -> Result<()> {
    ensure!(
        source.contains("/* IL_"),
        "no IL offset comments found in Debug output"
    );
    Ok(())
}

/// A library project gets a library-target build descriptor and no
/// entry-point unit.
pub fn verify_library_output(output_dir: &Path) -> Result<()> {
    let descriptor = read_lossy(&output_dir.join("CMakeLists.txt"))?;
    ensure!(
        descriptor.contains("add_library"),
        "CMakeLists.txt missing add_library"
    );
    ensure!(
        !output_dir.join("main.cpp").exists(),
        "library should not have main.cpp"
    );
    Ok(())
}

pub fn verify_string_literal_calls(source: &str) -> Result<()> {
    ensure!(
        source.contains("string_literal"),
        "no string_literal calls found"
    );
    ensure!(
        source.contains("Hello, CIL2CPP!"),
        "string content not found"
    );
    Ok(())
}

pub fn verify_string_literal_init_hook(header: &str) -> Result<()> {
    ensure!(
        header.contains("__init_string_literals"),
        "no __init_string_literals in header"
    );
    Ok(())
}

pub fn verify_multi_assembly_header(header: &str) -> Result<()> {
    ensure!(
        header.contains("MathLib_MathUtils"),
        "MathUtils type not found in header"
    );
    ensure!(
        header.contains("MathLib_Counter"),
        "Counter type not found in header"
    );
    Ok(())
}

pub fn verify_cross_assembly_calls(source: &str) -> Result<()> {
    ensure!(
        source.contains("MathLib_MathUtils_Add"),
        "cross-assembly MathUtils_Add call not found"
    );
    ensure!(
        source.contains("MathLib_Counter"),
        "cross-assembly Counter usage not found"
    );
    Ok(())
}

pub fn verify_entry_point(main_source: &str) -> Result<()> {
    ensure!(
        main_source.contains("Program_Main"),
        "entry point not found in main.cpp"
    );
    Ok(())
}

/// Generated sources may carry stray bytes; never fail an assertion on
/// encoding alone.
pub fn read_lossy(path: &Path) -> Result<String> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// =============================================================================
// Command construction
// =============================================================================

/// Command line for one code-generator invocation.
pub fn codegen_argv(
    layout: &ProjectLayout,
    input: &Path,
    output: &Path,
    config: Option<&str>,
    multi_assembly: bool,
) -> Vec<String> {
    let mut argv = vec![
        "dotnet".to_string(),
        "run".to_string(),
        "--project".to_string(),
        path_arg(&layout.cli_project),
        "--".to_string(),
        "codegen".to_string(),
        "-i".to_string(),
        path_arg(input),
        "-o".to_string(),
        path_arg(output),
    ];
    if let Some(config) = config {
        argv.push("-c".to_string());
        argv.push(config.to_string());
    }
    if multi_assembly {
        argv.push("--multi-assembly".to_string());
    }
    argv
}

fn configure_argv(build: &Path, source: &Path, generator: &str, prefix: &str) -> Vec<String> {
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
    argv.push(format!("-DCMAKE_PREFIX_PATH={prefix}"));
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
// The pipeline
// =============================================================================

/// Run the full integration pipeline. Returns the aggregate failure count;
/// an `Err` means the run could not start at all.
pub fn run_integration(
    layout: &ProjectLayout,
    opts: &IntegrationOptions,
    console: &Console,
    reporter: &mut dyn Reporter,
) -> Result<usize> {
    let workspace = Workspace::allocate(opts.keep_temp)?;
    let mut runner = PipelineRunner::new(reporter);

    console.header("CIL2CPP Integration Test");
    console.line(&format!("  Repo:    {}", layout.repo_root.display()));
    console.line(&format!("  Runtime: {}", opts.prefix));
    console.line(&format!("  Config:  {}", opts.config.as_str()));
    console.line(&format!("  Temp:    {}", workspace.path().display()));

    // ===== Phase 0: Prerequisites =====
    runner.phase("Phase 0: Prerequisites");

    runner.step("dotnet SDK available", || -> StepResult {
        let out = process::run(&["dotnet", "--version"], None, true, false)?;
        ensure!(out.ok(), "dotnet not found");
        Ok(Some(out.stdout.trim().to_string()))
    });
    runner.step("CMake available", || -> StepResult {
        let out = process::run(&["cmake", "--version"], None, true, false)?;
        ensure!(out.ok(), "cmake not found");
        Ok(out.stdout.lines().next().map(|l| l.trim().to_string()))
    });
    runner.step(&format!("Runtime installed at {}", opts.prefix), || -> StepResult {
        let marker = ProjectLayout::runtime_install_marker(&opts.prefix);
        ensure!(
            marker.exists(),
            "cil2cppConfig.cmake not found at {}",
            marker.display()
        );
        Ok(None)
    });

    // ===== Phase 1: HelloWorld =====
    runner.phase("Phase 1: HelloWorld (executable with entry point)");

    let hw_sample = layout.sample_project("HelloWorld");
    let hw_output = workspace.subdir("helloworld_output");
    let hw_build = workspace.subdir("helloworld_build");

    runner.step("Codegen HelloWorld", || -> StepResult {
        process::run(
            &codegen_argv(layout, &hw_sample, &hw_output, None, false),
            Some(&layout.repo_root),
            true,
            true,
        )?;
        Ok(None)
    });
    runner.step(
        "Generated files exist (*.h, *.cpp, main.cpp, CMakeLists.txt)",
        || -> StepResult {
            require_files(&hw_output, &generated_project_files("HelloWorld"))?;
            Ok(None)
        },
    );
    runner.step("CMake configure", || -> StepResult {
        process::run(
            &configure_argv(&hw_build, &hw_output, &opts.generator, &opts.prefix),
            Some(&layout.repo_root),
            true,
            true,
        )?;
        Ok(None)
    });
    runner.step(&format!("CMake build ({})", opts.config.as_str()), || -> StepResult {
        process::run(
            &build_argv(&hw_build, opts.config.as_str()),
            Some(&layout.repo_root),
            true,
            true,
        )?;
        Ok(None)
    });
    runner.step("Run HelloWorld and verify output", || -> StepResult {
        let exe = resolver::executable_path(&hw_build, opts.config.as_str(), "HelloWorld");
        ensure!(exe.exists(), "executable not found: {}", exe.display());
        let out = process::run(&[path_arg(&exe)], None, true, false)?;
        ensure!(out.ok(), "HelloWorld exited with code {}", out.code);
        verify_program_output(&out.stdout)?;
        Ok(None)
    });

    // ===== Phase 2: Library project =====
    runner.phase("Phase 2: Library project (no entry point)");

    let lib_sample = workspace.subdir("lib_sample");
    let lib_output = workspace.subdir("lib_output");
    let lib_build = workspace.subdir("lib_build");

    runner.step("Create temporary class library project", || -> StepResult {
        fs::create_dir_all(&lib_sample)?;
        fs::write(lib_sample.join("MathLib.csproj"), LIBRARY_CSPROJ)?;
        fs::write(lib_sample.join("MathHelper.cs"), LIBRARY_SOURCE)?;
        Ok(None)
    });
    runner.step("Codegen library project", || -> StepResult {
        process::run(
            &codegen_argv(
                layout,
                &lib_sample.join("MathLib.csproj"),
                &lib_output,
                None,
                false,
            ),
            Some(&layout.repo_root),
            true,
            true,
        )?;
        Ok(None)
    });
    runner.step("Library generates add_library (no main.cpp)", || -> StepResult {
        verify_library_output(&lib_output)?;
        Ok(None)
    });
    runner.step("Library CMake configure + build", || -> StepResult {
        process::run(
            &configure_argv(&lib_build, &lib_output, &opts.generator, &opts.prefix),
            Some(&layout.repo_root),
            true,
            true,
        )?;
        process::run(
            &build_argv(&lib_build, opts.config.as_str()),
            Some(&layout.repo_root),
            true,
            true,
        )?;
        Ok(None)
    });

    // ===== Phase 3: Debug configuration =====
    runner.phase("Phase 3: Debug configuration");

    let dbg_output = workspace.subdir("debug_output");
    let dbg_build = workspace.subdir("debug_build");

    runner.step("Codegen HelloWorld in Debug mode", || -> StepResult {
        process::run(
            &codegen_argv(layout, &hw_sample, &dbg_output, Some("Debug"), false),
            Some(&layout.repo_root),
            true,
            true,
        )?;
        Ok(None)
    });
    runner.step("Debug output contains #line directives", || -> StepResult {
        verify_line_directives(&read_lossy(&dbg_output.join("HelloWorld.cpp"))?)?;
        Ok(None)
    });
    runner.step("Debug output contains IL offset comments", || -> StepResult {
        verify_il_offset_comments(&read_lossy(&dbg_output.join("HelloWorld.cpp"))?)?;
        Ok(None)
    });
    runner.step("Debug build + run produces same output", || -> StepResult {
        process::run(
            &configure_argv(&dbg_build, &dbg_output, &opts.generator, &opts.prefix),
            Some(&layout.repo_root),
            true,
            true,
        )?;
        process::run(
            &build_argv(&dbg_build, "Debug"),
            Some(&layout.repo_root),
            true,
            true,
        )?;
        let exe = resolver::executable_path(&dbg_build, "Debug", "HelloWorld");
        let out = process::run(&[path_arg(&exe)], None, true, false)?;
        verify_program_output(&out.stdout)?;
        Ok(None)
    });

    // ===== Phase 4: String literals =====
    runner.phase("Phase 4: String literals");

    runner.step("HelloWorld source contains string_literal calls", || -> StepResult {
        verify_string_literal_calls(&read_lossy(&hw_output.join("HelloWorld.cpp"))?)?;
        Ok(None)
    });
    runner.step("HelloWorld header contains __init_string_literals", || -> StepResult {
        verify_string_literal_init_hook(&read_lossy(&hw_output.join("HelloWorld.h"))?)?;
        Ok(None)
    });

    // ===== Phase 5: Multi-assembly codegen =====
    runner.phase("Phase 5: Multi-assembly codegen (MathLib + MultiAssemblyTest)");

    let multi_sample = layout.sample_project("MultiAssemblyTest");
    let multi_output = workspace.subdir("multi_output");

    runner.step("Multi-assembly codegen (--multi-assembly flag)", || -> StepResult {
        process::run(
            &codegen_argv(layout, &multi_sample, &multi_output, None, true),
            Some(&layout.repo_root),
            true,
            true,
        )?;
        Ok(None)
    });
    runner.step("Generated files exist", || -> StepResult {
        require_files(&multi_output, &generated_project_files("MultiAssemblyTest"))?;
        Ok(None)
    });
    runner.step("Header contains MathLib types", || -> StepResult {
        verify_multi_assembly_header(&read_lossy(&multi_output.join("MultiAssemblyTest.h"))?)?;
        Ok(None)
    });
    runner.step("Source has cross-assembly method calls", || -> StepResult {
        verify_cross_assembly_calls(&read_lossy(&multi_output.join("MultiAssemblyTest.cpp"))?)?;
        Ok(None)
    });
    runner.step("Main has entry point", || -> StepResult {
        verify_entry_point(&read_lossy(&multi_output.join("main.cpp"))?)?;
        Ok(None)
    });

    // ===== Cleanup & Results =====
    console.header("Cleanup");
    workspace.finish(console);

    console.header("Results");
    let summary = runner.finish();
    Ok(summary.failed)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_expected_output_accepts_exact_match() {
        assert!(verify_program_output("Hello, CIL2CPP!\n30\n42\n").is_ok());
        assert!(verify_program_output("Hello, CIL2CPP!\r\n30\r\n42\r\n").is_ok());
    }

    #[test]
    fn test_output_mismatch_reports_both_texts_verbatim() {
        let err = verify_program_output("Hello, CIL2CPP!\n30\n41\n").unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("Hello, CIL2CPP!\n30\n42"));
        assert!(msg.contains("Hello, CIL2CPP!\n30\n41"));
    }

    #[test]
    fn test_generated_project_files_for_assembly() {
        let files = generated_project_files("HelloWorld");
        assert_eq!(
            files,
            vec!["HelloWorld.h", "HelloWorld.cpp", "main.cpp", "CMakeLists.txt"]
        );
    }

    #[test]
    fn test_require_files_names_missing_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("HelloWorld.h"), b"").unwrap();
        let err =
            require_files(dir.path(), &generated_project_files("HelloWorld")).unwrap_err();
        assert!(format!("{err:#}").contains("HelloWorld.cpp"));
    }

    #[test]
    fn test_require_files_is_idempotent() {
        let dir = tempdir().unwrap();
        for file in generated_project_files("HelloWorld") {
            fs::write(dir.path().join(file), b"").unwrap();
        }
        let first = require_files(dir.path(), &generated_project_files("HelloWorld")).is_ok();
        let second = require_files(dir.path(), &generated_project_files("HelloWorld")).is_ok();
        assert!(first);
        assert_eq!(first, second);
    }

    #[test]
    fn test_debug_marker_checks() {
        let debug_src = "#line 12 \"Program.cs\"\nint x = 0; /* IL_0001 */\n";
        assert!(verify_line_directives(debug_src).is_ok());
        assert!(verify_il_offset_comments(debug_src).is_ok());

        let release_src = "int x = 0;\n";
        assert!(verify_line_directives(release_src).is_err());
        assert!(verify_il_offset_comments(release_src).is_err());
    }

    #[test]
    fn test_library_output_checks() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("CMakeLists.txt"),
            "add_library(MathLib STATIC MathLib.cpp)\n",
        )
        .unwrap();
        assert!(verify_library_output(dir.path()).is_ok());

        // An entry-point unit must fail the library check.
        fs::write(dir.path().join("main.cpp"), "int main() {}\n").unwrap();
        assert!(verify_library_output(dir.path()).is_err());
    }

    #[test]
    fn test_library_output_requires_library_target() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("CMakeLists.txt"),
            "add_executable(App main.cpp)\n",
        )
        .unwrap();
        assert!(verify_library_output(dir.path()).is_err());
    }

    #[test]
    fn test_string_literal_checks() {
        let src = "cil2cpp::string_literal(u\"Hello, CIL2CPP!\");\n";
        let hdr = "void HelloWorld__init_string_literals();\n";
        assert!(verify_string_literal_calls(src).is_ok());
        assert!(verify_string_literal_init_hook(hdr).is_ok());
        assert!(verify_string_literal_calls("no literals here").is_err());
        assert!(verify_string_literal_init_hook("plain header").is_err());
    }

    #[test]
    fn test_multi_assembly_symbol_checks() {
        let hdr = "struct MathLib_MathUtils; struct MathLib_Counter;";
        let src = "MathLib_MathUtils_Add(10, 20); MathLib_Counter_Increment(c);";
        let main_src = "return MultiAssemblyTest_Program_Main();";
        assert!(verify_multi_assembly_header(hdr).is_ok());
        assert!(verify_cross_assembly_calls(src).is_ok());
        assert!(verify_entry_point(main_src).is_ok());
        assert!(verify_multi_assembly_header("struct Other;").is_err());
        assert!(verify_cross_assembly_calls("nothing()").is_err());
        assert!(verify_entry_point("int main() {}").is_err());
    }

    #[test]
    fn test_codegen_argv_shape() {
        let layout = ProjectLayout::new(Path::new("/repo"));
        let argv = codegen_argv(
            &layout,
            Path::new("/repo/compiler/samples/HelloWorld/HelloWorld.csproj"),
            Path::new("/tmp/out"),
            Some("Debug"),
            true,
        );
        assert_eq!(argv[0], "dotnet");
        assert!(argv.contains(&"codegen".to_string()));
        assert!(argv.contains(&"--multi-assembly".to_string()));
        let c = argv.iter().position(|a| a == "-c").unwrap();
        assert_eq!(argv[c + 1], "Debug");
    }

    #[test]
    fn test_configure_argv_includes_prefix_and_arch() {
        let argv = configure_argv(
            Path::new("/tmp/build"),
            Path::new("/tmp/out"),
            "Visual Studio 17 2022",
            "C:/cil2cpp_test",
        );
        assert!(argv.contains(&"-A".to_string()));
        assert!(argv.contains(&"-DCMAKE_PREFIX_PATH=C:/cil2cpp_test".to_string()));

        let ninja = configure_argv(
            Path::new("/tmp/build"),
            Path::new("/tmp/out"),
            "Ninja",
            "/usr/local/cil2cpp",
        );
        assert!(!ninja.contains(&"-A".to_string()));
    }

    #[test]
    fn test_read_lossy_replaces_invalid_utf8() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mangled.cpp");
        fs::write(&path, b"MathLib_MathUtils \xff\xfe ok").unwrap();
        let text = read_lossy(&path).unwrap();
        assert!(text.contains("MathLib_MathUtils"));
    }
}
