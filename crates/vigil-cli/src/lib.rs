//! Vigil CLI library
//!
//! Command-line front end: loads a suite, a page fixture and the layered
//! harness config, runs the suite and renders the report.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;
mod output;
mod runner;

pub use commands::{Cli, ColorArg, Commands, EngineArg, FormatArg, ListArgs, RunArgs};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult, EXIT_FAILED, EXIT_OK, EXIT_USAGE};
pub use output::Printer;
pub use runner::{execute_list, execute_run, resolve_config, run_suite};
