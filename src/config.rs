//! CLI definition, project layout, and developer configuration.
//!
//! Command-line parsing uses clap with env-var fallbacks; an optional
//! `cildev.toml` at the repository root supplies defaults for the install
//! prefix, CMake generator, and build configuration. CLI flags always win.

use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the optional defaults file at the repository root.
pub const CONFIG_FILE: &str = "cildev.toml";

// =============================================================================
// CLI Configuration
// =============================================================================

/// Output format for pipeline progress
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable CLI output (to stderr)
    #[default]
    Human,
    /// Machine-readable NDJSON (to stdout)
    Json,
}

/// Build configuration passed to the code generator and the build system
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BuildConfig {
    Debug,
    #[default]
    Release,
}

impl BuildConfig {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildConfig::Debug => "Debug",
            BuildConfig::Release => "Release",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "debug" => Some(BuildConfig::Debug),
            "release" => Some(BuildConfig::Release),
            _ => None,
        }
    }
}

/// Install configuration: one build configuration or both
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InstallConfig {
    Debug,
    Release,
    #[default]
    Both,
}

impl InstallConfig {
    pub fn configs(&self) -> &'static [&'static str] {
        match self {
            InstallConfig::Debug => &["Debug"],
            InstallConfig::Release => &["Release"],
            InstallConfig::Both => &["Debug", "Release"],
        }
    }
}

/// CIL2CPP Developer CLI - build, test, install, codegen
#[derive(Parser)]
#[command(name = "cildev", version, about = "CIL2CPP developer CLI - build, test, install, codegen")]
pub struct Cli {
    /// Repository root (also: CILDEV_ROOT env var)
    #[arg(long, global = true, default_value = ".", env = "CILDEV_ROOT")]
    pub repo_root: PathBuf,

    /// Output format for pipeline runs (also: CILDEV_FORMAT env var)
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human, env = "CILDEV_FORMAT")]
    pub format: OutputFormat,

    /// Path to generate a JUnit XML report for pipeline runs (also: CILDEV_JUNIT_XML)
    #[arg(long, global = true, env = "CILDEV_JUNIT_XML")]
    pub junit_xml: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Build compiler and/or runtime
    Build {
        /// Build compiler only
        #[arg(long)]
        compiler: bool,
        /// Build runtime only
        #[arg(long)]
        runtime: bool,
        #[arg(long, value_enum, default_value_t = BuildConfig::Release)]
        config: BuildConfig,
    },
    /// Run tests
    Test {
        /// Compiler tests only
        #[arg(long)]
        compiler: bool,
        /// Runtime tests only
        #[arg(long)]
        runtime: bool,
        /// Integration tests only
        #[arg(long)]
        integration: bool,
        /// All tests
        #[arg(long)]
        all: bool,
        /// Generate a unified coverage report
        #[arg(long)]
        coverage: bool,
        /// Runtime prefix for integration tests
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Install runtime to prefix
    Install {
        /// Install prefix
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long, value_enum, default_value_t = InstallConfig::Both)]
        config: InstallConfig,
    },
    /// Generate C++ from a C# project
    Codegen {
        /// Sample name or .csproj path
        sample: Option<String>,
        /// Input .csproj path
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Output directory
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
        #[arg(short, long, value_enum, default_value_t = BuildConfig::Release)]
        config: BuildConfig,
    },
    /// Run the end-to-end integration pipeline
    Integration {
        /// Runtime prefix
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long, value_enum)]
        config: Option<BuildConfig>,
        /// CMake generator
        #[arg(long)]
        generator: Option<String>,
        /// Keep the temp workspace
        #[arg(long)]
        keep_temp: bool,
    },
    /// Check prerequisites and install optional dev dependencies
    Setup,
}

// =============================================================================
// Project Layout & Platform Defaults
// =============================================================================

/// Fixed locations inside a CIL2CPP checkout.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub repo_root: PathBuf,
    pub compiler_dir: PathBuf,
    pub runtime_dir: PathBuf,
    pub core_project: PathBuf,
    pub cli_project: PathBuf,
    pub test_project: PathBuf,
    pub runtime_tests_dir: PathBuf,
    pub samples_dir: PathBuf,
}

impl ProjectLayout {
    pub fn new(repo_root: &Path) -> Self {
        let repo_root = repo_root.to_path_buf();
        let compiler_dir = repo_root.join("compiler");
        let runtime_dir = repo_root.join("runtime");
        Self {
            core_project: compiler_dir.join("CIL2CPP.Core"),
            cli_project: compiler_dir.join("CIL2CPP.CLI"),
            test_project: compiler_dir.join("CIL2CPP.Tests"),
            runtime_tests_dir: runtime_dir.join("tests"),
            samples_dir: compiler_dir.join("samples"),
            repo_root,
            compiler_dir,
            runtime_dir,
        }
    }

    pub fn runtime_build_dir(&self) -> PathBuf {
        self.runtime_dir.join("build")
    }

    pub fn runtime_tests_build_dir(&self) -> PathBuf {
        self.runtime_tests_dir.join("build")
    }

    pub fn sample_project(&self, name: &str) -> PathBuf {
        self.samples_dir.join(name).join(format!("{name}.csproj"))
    }

    /// Marker file proving the runtime is installed under `prefix`.
    pub fn runtime_install_marker(prefix: &str) -> PathBuf {
        Path::new(prefix).join("lib/cmake/cil2cpp/cil2cppConfig.cmake")
    }
}

pub fn default_prefix() -> &'static str {
    if cfg!(windows) {
        "C:/cil2cpp_test"
    } else {
        "/usr/local/cil2cpp"
    }
}

pub fn default_generator() -> &'static str {
    if cfg!(windows) {
        "Visual Studio 17 2022"
    } else {
        "Ninja"
    }
}

/// Architecture flag required by IDE-integrated generators.
pub fn cmake_arch_args(generator: &str) -> &'static [&'static str] {
    if generator.contains("Visual Studio") {
        &["-A", "x64"]
    } else {
        &[]
    }
}

/// Resolved parameters for one integration pipeline run.
#[derive(Debug, Clone)]
pub struct IntegrationOptions {
    pub prefix: String,
    pub config: BuildConfig,
    pub generator: String,
    pub keep_temp: bool,
}

// =============================================================================
// cildev.toml
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct DevConfig {
    #[serde(default)]
    pub defaults: Defaults,
}

#[derive(Debug, Default, Deserialize)]
pub struct Defaults {
    pub prefix: Option<String>,
    pub generator: Option<String>,
    pub config: Option<String>,
}

impl DevConfig {
    pub fn resolve_prefix(&self, cli: Option<String>) -> String {
        cli.or_else(|| self.defaults.prefix.clone())
            .unwrap_or_else(|| default_prefix().to_string())
    }

    pub fn resolve_generator(&self, cli: Option<String>) -> String {
        cli.or_else(|| self.defaults.generator.clone())
            .unwrap_or_else(|| default_generator().to_string())
    }

    pub fn resolve_config(&self, cli: Option<BuildConfig>) -> BuildConfig {
        cli.or_else(|| self.defaults.config.as_deref().and_then(BuildConfig::from_name))
            .unwrap_or_default()
    }
}

/// Load `cildev.toml` from the repository root. A missing file yields the
/// defaults; a malformed one is reported and ignored.
pub fn load_dev_config(root: &Path) -> DevConfig {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        return DevConfig::default();
    }
    let contents = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[cildev] failed to read {}: {}", path.display(), e);
            return DevConfig::default();
        }
    };
    match toml::from_str(&contents) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[cildev] failed to parse {}: {}", path.display(), e);
            DevConfig::default()
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_layout_paths_nest_under_repo_root() {
        let layout = ProjectLayout::new(Path::new("/work/cil2cpp"));
        assert_eq!(layout.compiler_dir, Path::new("/work/cil2cpp/compiler"));
        assert_eq!(
            layout.cli_project,
            Path::new("/work/cil2cpp/compiler/CIL2CPP.CLI")
        );
        assert_eq!(
            layout.sample_project("HelloWorld"),
            Path::new("/work/cil2cpp/compiler/samples/HelloWorld/HelloWorld.csproj")
        );
        assert_eq!(
            layout.runtime_tests_build_dir(),
            Path::new("/work/cil2cpp/runtime/tests/build")
        );
    }

    #[test]
    fn test_install_marker_under_prefix() {
        let marker = ProjectLayout::runtime_install_marker("/usr/local/cil2cpp");
        assert_eq!(
            marker,
            Path::new("/usr/local/cil2cpp/lib/cmake/cil2cpp/cil2cppConfig.cmake")
        );
    }

    #[test]
    fn test_arch_flag_only_for_visual_studio() {
        assert_eq!(cmake_arch_args("Visual Studio 17 2022"), &["-A", "x64"]);
        assert!(cmake_arch_args("Ninja").is_empty());
        assert!(cmake_arch_args("Unix Makefiles").is_empty());
    }

    #[test]
    fn test_build_config_names() {
        assert_eq!(BuildConfig::Debug.as_str(), "Debug");
        assert_eq!(BuildConfig::Release.as_str(), "Release");
        assert_eq!(BuildConfig::from_name("debug"), Some(BuildConfig::Debug));
        assert_eq!(BuildConfig::from_name("Release"), Some(BuildConfig::Release));
        assert_eq!(BuildConfig::from_name("Profile"), None);
    }

    #[test]
    fn test_install_config_expansion() {
        assert_eq!(InstallConfig::Both.configs(), &["Debug", "Release"]);
        assert_eq!(InstallConfig::Debug.configs(), &["Debug"]);
    }

    #[test]
    fn test_parse_dev_config_defaults_section() {
        let parsed: DevConfig = toml::from_str(
            r#"
[defaults]
prefix = "/opt/cil2cpp"
generator = "Unix Makefiles"
config = "debug"
"#,
        )
        .unwrap();
        assert_eq!(parsed.defaults.prefix.as_deref(), Some("/opt/cil2cpp"));
        assert_eq!(parsed.resolve_prefix(None), "/opt/cil2cpp");
        assert_eq!(parsed.resolve_generator(None), "Unix Makefiles");
        assert_eq!(parsed.resolve_config(None), BuildConfig::Debug);
    }

    #[test]
    fn test_cli_flags_override_dev_config() {
        let parsed: DevConfig = toml::from_str(
            r#"
[defaults]
prefix = "/opt/cil2cpp"
"#,
        )
        .unwrap();
        assert_eq!(
            parsed.resolve_prefix(Some("/custom".to_string())),
            "/custom"
        );
        assert_eq!(
            parsed.resolve_config(Some(BuildConfig::Debug)),
            BuildConfig::Debug
        );
    }

    #[test]
    fn test_parse_empty_dev_config() {
        let parsed: DevConfig = toml::from_str("").unwrap();
        assert!(parsed.defaults.prefix.is_none());
        assert_eq!(parsed.resolve_config(None), BuildConfig::Release);
    }

    #[test]
    fn test_load_dev_config_missing_file() {
        let dir = tempdir().unwrap();
        let config = load_dev_config(dir.path());
        assert!(config.defaults.generator.is_none());
    }

    #[test]
    fn test_load_dev_config_malformed_file_is_ignored() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "not [valid toml").unwrap();
        let config = load_dev_config(dir.path());
        assert!(config.defaults.prefix.is_none());
    }
}
