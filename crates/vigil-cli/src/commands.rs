//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use vigil::Engine;

/// Vigil: run media UI end-to-end suites
#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (only failures and the summary)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a suite against a simulated page
    Run(RunArgs),

    /// List the cases of a suite and whether each would run
    List(ListArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Suite file (YAML)
    #[arg(short, long)]
    pub suite: PathBuf,

    /// Page fixture file (YAML)
    #[arg(short = 'x', long)]
    pub fixture: PathBuf,

    /// Active engine (overrides config and VIGIL_ENGINE)
    #[arg(short, long)]
    pub engine: Option<EngineArg>,

    /// Harness config file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Overwrite divergent reference snapshots
    #[arg(long)]
    pub update_snapshots: bool,

    /// Never record snapshots; missing references fail
    #[arg(long, conflicts_with = "update_snapshots")]
    pub strict_snapshots: bool,

    /// Reference snapshot directory
    #[arg(long)]
    pub snapshot_dir: Option<PathBuf>,

    /// Directory for actual/diff images of failing snapshots
    #[arg(long)]
    pub artifact_dir: Option<PathBuf>,

    /// Stop at the first failing case
    #[arg(long)]
    pub fail_fast: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,

    /// Also write the JSON report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Suite file (YAML)
    #[arg(short, long)]
    pub suite: PathBuf,

    /// Engine to evaluate skip annotations against
    #[arg(short, long, default_value = "chromium")]
    pub engine: EngineArg,
}

/// Engine argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineArg {
    /// Chromium
    Chromium,
    /// Firefox
    Firefox,
    /// WebKit
    Webkit,
}

impl From<EngineArg> for Engine {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Chromium => Self::Chromium,
            EngineArg::Firefox => Self::Firefox,
            EngineArg::Webkit => Self::Webkit,
        }
    }
}

/// Output format argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatArg {
    /// Human-readable lines
    #[default]
    Text,
    /// JSON report
    Json,
    /// JUnit XML
    Junit,
}

/// Color choice argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorArg {
    /// Color when writing to a terminal
    #[default]
    Auto,
    /// Always color
    Always,
    /// Never color
    Never,
}
