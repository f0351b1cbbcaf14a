//! CLI surface integration tests.
//!
//! Verifies flag recognition, subcommand parsing, and the precedence of
//! CLI arguments over `cildev.toml` defaults.

use cildev::config::{
    BuildConfig, Cli, Commands, DevConfig, InstallConfig, OutputFormat, ProjectLayout,
};
use cildev::reporter::{HumanReporter, JsonReporter, MultiReporter, NullReporter, Reporter};
use clap::Parser;
use std::path::Path;

#[test]
fn test_integration_subcommand_flags() {
    let cli = Cli::try_parse_from([
        "cildev",
        "integration",
        "--prefix",
        "/opt/cil2cpp",
        "--config",
        "debug",
        "--generator",
        "Unix Makefiles",
        "--keep-temp",
    ])
    .unwrap();

    match cli.command {
        Commands::Integration {
            prefix,
            config,
            generator,
            keep_temp,
        } => {
            assert_eq!(prefix.as_deref(), Some("/opt/cil2cpp"));
            assert_eq!(config, Some(BuildConfig::Debug));
            assert_eq!(generator.as_deref(), Some("Unix Makefiles"));
            assert!(keep_temp);
        }
        _ => panic!("expected integration subcommand"),
    }
}

#[test]
fn test_test_subcommand_with_all_and_coverage() {
    let cli = Cli::try_parse_from(["cildev", "test", "--all", "--coverage"]).unwrap();
    match cli.command {
        Commands::Test {
            all,
            coverage,
            compiler,
            runtime,
            integration,
            ..
        } => {
            assert!(all);
            assert!(coverage);
            assert!(!compiler);
            assert!(!runtime);
            assert!(!integration);
        }
        _ => panic!("expected test subcommand"),
    }
}

#[test]
fn test_codegen_defaults() {
    let cli = Cli::try_parse_from(["cildev", "codegen", "HelloWorld"]).unwrap();
    match cli.command {
        Commands::Codegen {
            sample,
            input,
            output,
            config,
        } => {
            assert_eq!(sample.as_deref(), Some("HelloWorld"));
            assert!(input.is_none());
            assert_eq!(output, Path::new("output"));
            assert_eq!(config, BuildConfig::Release);
        }
        _ => panic!("expected codegen subcommand"),
    }
}

#[test]
fn test_install_config_defaults_to_both() {
    let cli = Cli::try_parse_from(["cildev", "install"]).unwrap();
    match cli.command {
        Commands::Install { config, .. } => {
            assert_eq!(config, InstallConfig::Both);
            assert_eq!(config.configs(), &["Debug", "Release"]);
        }
        _ => panic!("expected install subcommand"),
    }
}

#[test]
fn test_global_format_flag_after_subcommand() {
    let cli = Cli::try_parse_from(["cildev", "integration", "--format", "json"]).unwrap();
    assert_eq!(cli.format, OutputFormat::Json);
}

#[test]
fn test_junit_xml_flag_parses_path() {
    let cli =
        Cli::try_parse_from(["cildev", "test", "--junit-xml", "reports/pipeline.xml"]).unwrap();
    assert_eq!(
        cli.junit_xml.as_deref(),
        Some(Path::new("reports/pipeline.xml"))
    );
}

#[test]
fn test_format_defaults_to_human() {
    let cli = Cli::try_parse_from(["cildev", "setup"]).unwrap();
    assert_eq!(cli.format, OutputFormat::Human);
    assert_eq!(OutputFormat::default(), OutputFormat::Human);
}

#[test]
fn test_unknown_subcommand_is_rejected() {
    assert!(Cli::try_parse_from(["cildev", "frobnicate"]).is_err());
}

#[test]
fn test_cli_values_override_toml_defaults() {
    let dev: DevConfig = toml::from_str(
        r#"
[defaults]
prefix = "/from/toml"
generator = "Ninja"
config = "debug"
"#,
    )
    .unwrap();

    assert_eq!(dev.resolve_prefix(Some("/from/cli".to_string())), "/from/cli");
    assert_eq!(dev.resolve_prefix(None), "/from/toml");
    assert_eq!(
        dev.resolve_generator(Some("Visual Studio 17 2022".to_string())),
        "Visual Studio 17 2022"
    );
    assert_eq!(dev.resolve_config(None), BuildConfig::Debug);
    assert_eq!(
        dev.resolve_config(Some(BuildConfig::Release)),
        BuildConfig::Release
    );
}

#[test]
fn test_layout_derives_from_repo_root_flag() {
    let cli = Cli::try_parse_from(["cildev", "--repo-root", "/work/cil2cpp", "setup"]).unwrap();
    let layout = ProjectLayout::new(&cli.repo_root);
    assert_eq!(layout.samples_dir, Path::new("/work/cil2cpp/compiler/samples"));
}

#[test]
fn test_reporter_stack_composes() {
    fn accepts_reporter<T: Reporter>(_r: T) {}
    accepts_reporter(JsonReporter);
    accepts_reporter(HumanReporter::new(cildev::console::Console::plain()));
    accepts_reporter(NullReporter);

    let reporters: Vec<Box<dyn Reporter>> = vec![Box::new(JsonReporter), Box::new(NullReporter)];
    let _ = MultiReporter::new(reporters);
}
