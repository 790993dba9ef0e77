//! Vigil CLI: run declarative media UI suites
//!
//! ## Usage
//!
//! ```bash
//! vigil run --suite demos/video_gallery.suite.yaml \
//!           --fixture demos/video_gallery.fixture.yaml --engine firefox
//! vigil list --suite demos/video_gallery.suite.yaml --engine webkit
//! ```
//!
//! Exit codes: 0 when no case failed, 1 when a case failed, 2 on usage or
//! configuration errors.

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vigil_cli::{
    execute_list, execute_run, Cli, CliConfig, CliError, CliResult, Commands, Printer, EXIT_OK,
    EXIT_USAGE,
};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::from(EXIT_OK)
            };
        }
    };

    let config = CliConfig::from_cli(&cli);
    init_tracing(&config);

    match run(cli, &config) {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(e) => {
            if !matches!(e, CliError::CasesFailed { .. }) {
                eprintln!("Error: {e}");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(config: &CliConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.verbosity.log_filter())),
        )
        .with_target(false)
        .with_ansi(config.color.should_color())
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli, config: &CliConfig) -> CliResult<()> {
    let printer = Printer::new(config.color.should_color(), config.verbosity.is_quiet());
    match cli.command {
        Commands::Run(args) => {
            let report = execute_run(&args, |key| std::env::var(key).ok())?;
            printer.report(&report, args.format)?;
            if report.all_passed() {
                Ok(())
            } else {
                Err(CliError::CasesFailed {
                    failed: report.failed_count(),
                })
            }
        }
        Commands::List(args) => {
            let cases = execute_list(&args)?;
            printer.listing(&cases)?;
            Ok(())
        }
    }
}
