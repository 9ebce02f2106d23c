//! Crucible error types.
//!
//! Errors fall into three families, each mapped to its own exit status:
//! configuration errors found before any test runs (usage), infrastructure
//! failures while orchestrating a run (internal), and test failures, which
//! are not errors at all but recorded outcomes.

use std::io;

use miette::Diagnostic;
use thiserror::Error;

use crate::attributes::AttributeError;
use crate::filters::FilterError;
use crate::summary::ExitStatus;
use crate::suite::TestId;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Conflicting or malformed options, detected before any test executes.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("--timeout requires forking tests")]
    #[diagnostic(
        code(crucible::config::timeout_without_fork),
        help("inline tests can't be interrupted; drop --no-fork or --timeout")
    )]
    TimeoutWithoutFork,

    #[error("--show-terminal requires forking tests")]
    #[diagnostic(code(crucible::config::terminal_without_fork))]
    ShowTerminalWithoutFork,

    #[error("{option} can't be used with --child")]
    #[diagnostic(
        code(crucible::config::output_in_child),
        help("a child's only output is its result channel")
    )]
    OutputWithChild { option: &'static str },

    #[error("--child and --child-test must be given together")]
    #[diagnostic(code(crucible::config::incomplete_child))]
    IncompleteChild,

    #[error("process isolation is not supported on this platform")]
    #[diagnostic(
        code(crucible::config::isolation_unsupported),
        help("run with --no-fork")
    )]
    IsolationUnsupported,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Suite(#[from] AttributeError),
}

// ============================================================================
// INFRASTRUCTURE
// ============================================================================

/// Failure to dispatch a test, as opposed to the test failing.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to create the result channel")]
    Channel(#[source] io::Error),

    #[error("failed to locate the test executable")]
    CurrentExe(#[source] io::Error),

    #[error("failed to spawn a child for '{test}'")]
    Spawn {
        test: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for the child of '{test}'")]
    Wait {
        test: String,
        #[source]
        source: io::Error,
    },
}

/// Failure to deliver an event to a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write test event")]
    Io(#[from] io::Error),

    #[error("failed to encode outcome record")]
    Encode(#[from] serde_json::Error),
}

/// Anything that stops the driver itself.
#[derive(Debug, Error, Diagnostic)]
pub enum DriverError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("no test with id {0} in this program")]
    #[diagnostic(code(crucible::child::unknown_test))]
    UnknownChildTest(TestId),
}

impl DriverError {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            DriverError::Config(_) => ExitStatus::Usage,
            DriverError::Runner(_) | DriverError::Sink(_) | DriverError::UnknownChildTest(_) => {
                ExitStatus::Internal
            }
        }
    }
}

impl From<FilterError> for DriverError {
    fn from(err: FilterError) -> Self {
        DriverError::Config(err.into())
    }
}

impl From<AttributeError> for DriverError {
    fn from(err: AttributeError) -> Self {
        DriverError::Config(err.into())
    }
}
