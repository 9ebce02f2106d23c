//! The crucible command-line driver.
//!
//! A test program hands its suites to [`drive_tests`] from `main`. The same
//! program serves as parent and child: with `--child` it runs one test and
//! reports over the inherited channel, otherwise it orchestrates the run.

use std::ffi::OsString;
use std::panic::{self, AssertUnwindSafe};
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use crate::child::run_child;
use crate::driver::run_passes;
use crate::errors::{DriverError, RunnerError, SinkError};
use crate::runner::{InlineRunner, IsolatedRunner, Runner};
use crate::summary::{ExitStatus, RunSummary};
use crate::suite::{Suite, TestTree};

pub mod args;
pub mod config;
pub mod output;

pub use args::CliArgs;
pub use config::{DriverConfig, ExecutionMode};
pub use output::TerminalSink;

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "CRUCIBLE_LOG";

/// Installs the stderr log subscriber. Later calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Runs `suites` according to this process's command line.
pub fn drive_tests(suites: Vec<Suite>) -> ExitCode {
    init_logging();
    drive_with_args(std::env::args_os(), suites).into()
}

/// Runs `suites` according to `args`, whose first item is the program name.
pub fn drive_with_args<I, T>(args: I, suites: Vec<Suite>) -> ExitStatus
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = match CliArgs::try_parse_from(args) {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitStatus::Usage
            } else {
                ExitStatus::Success
            };
        }
    };

    match panic::catch_unwind(AssertUnwindSafe(|| drive(&args, suites))) {
        Ok(Ok(status)) => status,
        Ok(Err(err)) => {
            let status = err.exit_status();
            eprintln!("{:?}", miette::Report::new(err));
            status
        }
        Err(_) => {
            error!("the test driver panicked");
            ExitStatus::Internal
        }
    }
}

fn drive(args: &CliArgs, suites: Vec<Suite>) -> Result<ExitStatus, DriverError> {
    let config = DriverConfig::from_args(args)?;
    let tree = TestTree::build(suites)?;
    debug!(tests = tree.len(), mode = ?config.mode, "built test tree");

    if let Some(target) = config.child {
        run_child(&tree, target.handle, target.test)?;
        return Ok(ExitStatus::Success);
    }

    if config.runs == 0 {
        eprintln!("no test runs, exiting");
        return Ok(ExitStatus::Failure);
    }

    let runner = build_runner(&config.mode)?;
    let sink = TerminalSink::stdout(
        config.output.format,
        config.output.color,
        config.output.show_time,
    );
    let mut summary = RunSummary::new(sink);
    run_passes(&tree, &config.filter, runner.as_ref(), &mut summary, config.runs)?;

    let (report, mut sink) = summary.finish();
    sink.summarize(&report).map_err(SinkError::from)?;
    info!(
        total = report.counts.total(),
        failures = report.counts.failures(),
        "run complete"
    );
    Ok(report.exit_status())
}

fn build_runner(mode: &ExecutionMode) -> Result<Box<dyn Runner>, RunnerError> {
    Ok(match mode {
        ExecutionMode::Inline => Box::new(InlineRunner),
        ExecutionMode::Isolated {
            timeout,
            capture_output,
        } => Box::new(
            IsolatedRunner::current(std::iter::empty())?
                .with_timeout(*timeout)
                .with_captured_output(*capture_output),
        ),
    })
}
