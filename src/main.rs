//! CLI entry point.
//!
//! Every command yields an integer failure count; zero is overall success
//! and becomes the process exit status.

use cildev::commands::{self, TestSelection};
use cildev::config::{self, Cli, Commands, IntegrationOptions, OutputFormat, ProjectLayout};
use cildev::console::Console;
use cildev::integration;
use cildev::junit::JunitReporter;
use cildev::reporter::{HumanReporter, JsonReporter, MultiReporter, Reporter};
use cildev::setup;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let console = Console::detect();

    let repo_root = cli
        .repo_root
        .canonicalize()
        .unwrap_or_else(|_| cli.repo_root.clone());
    let layout = ProjectLayout::new(&repo_root);
    let dev_config = config::load_dev_config(&layout.repo_root);

    let mut reporters: Vec<Box<dyn Reporter>> = match cli.format {
        OutputFormat::Human => vec![Box::new(HumanReporter::new(console))],
        OutputFormat::Json => vec![Box::new(JsonReporter)],
    };
    if let Some(path) = &cli.junit_xml {
        reporters.push(Box::new(JunitReporter::new(path.clone())));
    }
    let mut reporter = MultiReporter::new(reporters);

    let result = match cli.command {
        Commands::Build {
            compiler,
            runtime,
            config,
        } => {
            let generator = dev_config.resolve_generator(None);
            commands::cmd_build(&layout, compiler, runtime, config, &generator, &console)
        }
        Commands::Test {
            compiler,
            runtime,
            integration,
            all,
            coverage,
            prefix,
        } => {
            let sel = TestSelection {
                compiler,
                runtime,
                integration,
                all,
                coverage,
            };
            let opts = IntegrationOptions {
                prefix: dev_config.resolve_prefix(prefix),
                config: dev_config.resolve_config(None),
                generator: dev_config.resolve_generator(None),
                keep_temp: false,
            };
            commands::cmd_test(&layout, &sel, &opts, &console, &mut reporter)
        }
        Commands::Install { prefix, config } => {
            let prefix = dev_config.resolve_prefix(prefix);
            let generator = dev_config.resolve_generator(None);
            commands::cmd_install(&layout, &prefix, config.configs(), &generator, &console)
        }
        Commands::Codegen {
            sample,
            input,
            output,
            config,
        } => commands::cmd_codegen(
            &layout,
            sample.as_deref(),
            input.as_deref(),
            &output,
            config,
            &console,
        ),
        Commands::Integration {
            prefix,
            config,
            generator,
            keep_temp,
        } => {
            let opts = IntegrationOptions {
                prefix: dev_config.resolve_prefix(prefix),
                config: dev_config.resolve_config(config),
                generator: dev_config.resolve_generator(generator),
                keep_temp,
            };
            integration::run_integration(&layout, &opts, &console, &mut reporter)
        }
        Commands::Setup => Ok(setup::cmd_setup(&console)),
    };

    let failures = match result {
        Ok(count) => count,
        Err(e) => {
            console.error(&format!("error: {e:#}"));
            1
        }
    };
    ExitCode::from(failures.min(255) as u8)
}
