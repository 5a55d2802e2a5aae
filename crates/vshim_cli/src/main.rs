//! vshim CLI: generate model wrappers and drive simulation sessions.
//!
//! Provides `vshim gen` to render the C wrapper for a compiled model,
//! `vshim run` to open a session, apply inputs and step it, and
//! `vshim inspect` to summarize a recorded VCD trace.

#![warn(missing_docs)]

mod generate;
mod inspect;
mod project;
mod run;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};

/// vshim, a session shim for Verilator-compiled models.
#[derive(Parser, Debug)]
#[command(name = "vshim", version, about = "Session shim for compiled HDL models")]
pub struct Cli {
    /// `-v` for more log output, `-q` for less.
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render the C wrapper and header for the configured model.
    Gen(GenArgs),
    /// Open a session, apply inputs, and step the model.
    Run(RunArgs),
    /// Summarize a VCD trace.
    Inspect(InspectArgs),
}

/// Arguments for `vshim gen`.
#[derive(Parser, Debug)]
pub struct GenArgs {
    /// Directory containing `vshim.toml`, or the file itself.
    #[arg(short, long)]
    pub config: Option<String>,

    /// Output directory (overrides `codegen.out_dir`).
    #[arg(short, long)]
    pub out: Option<String>,
}

/// Arguments for `vshim run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Directory containing `vshim.toml`, or the file itself.
    #[arg(short, long)]
    pub config: Option<String>,

    /// Number of steps to run.
    #[arg(short = 'n', long, default_value_t = 1)]
    pub steps: u64,

    /// Drive the clock port low and high on alternate steps.
    #[arg(long)]
    pub toggle_clock: bool,

    /// Input assignment applied before the first step (e.g. `a=0x1f`).
    #[arg(long = "set", value_name = "PORT=VALUE")]
    pub set: Vec<String>,

    /// Disable tracing even if the configuration enables it.
    #[arg(long, conflicts_with = "trace_dir")]
    pub no_trace: bool,

    /// Trace into this directory, enabling tracing if needed.
    #[arg(long)]
    pub trace_dir: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for `vshim inspect`.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Path to a VCD file.
    pub file: String,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(cli.verbosity.log_level_filter())
        .init();

    let result = match cli.command {
        Command::Gen(ref args) => generate::run(args),
        Command::Run(ref args) => run::run(args),
        Command::Inspect(ref args) => inspect::run(args),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
