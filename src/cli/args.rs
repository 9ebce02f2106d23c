//! Defines the command-line arguments every crucible test program accepts.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::{Args, Parser, ValueEnum};

use crate::runner::channel::Handle;

/// The arguments of a test program.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "crucible",
    version,
    about = "Runs the unit tests compiled into this program."
)]
pub struct CliArgs {
    /// Run the test suite this many times.
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub runs: usize,

    /// Run tests in this process instead of one child process per test.
    #[arg(long)]
    pub no_fork: bool,

    /// Kill a test's child process after this many milliseconds.
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Show what each test's child process wrote to its terminal.
    #[arg(long)]
    pub show_terminal: bool,

    /// Only run tests whose full name matches one of these regexes.
    #[arg(short = 't', long = "test", value_name = "REGEX")]
    pub tests: Vec<String>,

    /// Run tests matching all of these comma-separated attribute clauses.
    #[arg(short = 'a', long = "attr", value_name = "CLAUSES")]
    pub run_attrs: Vec<String>,

    /// Skip tests matching all of these comma-separated attribute clauses.
    #[arg(long = "skip-attr", value_name = "CLAUSES")]
    pub skip_attrs: Vec<String>,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Child mode: write the single outcome record to this inherited handle.
    #[arg(long, hide = true, value_name = "HANDLE")]
    pub child: Option<Handle>,

    /// Child mode: the id of the one test to run.
    #[arg(long, hide = true, value_name = "ID")]
    pub child_test: Option<usize>,
}

/// How results are shown on the terminal.
#[derive(Debug, Clone, Default, Args)]
pub struct OutputArgs {
    /// Output style.
    #[arg(long, value_enum)]
    pub output: Option<OutputFormat>,

    /// When to color the output.
    #[arg(long, value_enum, value_name = "WHEN")]
    pub color: Option<ColorWhen>,

    /// Show how long each test took.
    #[arg(long)]
    pub show_time: bool,
}

impl OutputArgs {
    /// The first output option present on the command line, if any.
    pub fn first_given(&self) -> Option<&'static str> {
        if self.output.is_some() {
            Some("--output")
        } else if self.color.is_some() {
            Some("--color")
        } else if self.show_time {
            Some("--show-time")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per failing or skipped test plus a summary.
    #[default]
    Brief,
    /// One line per test.
    Verbose,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ColorWhen {
    #[default]
    Auto,
    Always,
    Never,
}
