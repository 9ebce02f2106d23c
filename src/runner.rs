//! Test runners: how a single test descriptor becomes an outcome.
//!
//! Two runners ship with crucible:
//! - [`InlineRunner`] calls the body in the driver's own process. It can't
//!   enforce a timeout, and a test that crashes takes the whole run down.
//! - [`IsolatedRunner`] re-executes the program as a child restricted to one
//!   test and reads the outcome back over a pipe.

use crate::errors::RunnerError;
use crate::outcome::{CapturedOutput, ExecutionOutcome};
use crate::suite::TestDescriptor;

pub mod channel;
pub mod inline;
pub mod isolated;

pub use inline::{run_inline, InlineRunner};
pub use isolated::IsolatedRunner;

/// What a runner hands back for one test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: ExecutionOutcome,
    pub output: Option<CapturedOutput>,
}

impl From<ExecutionOutcome> for RunReport {
    fn from(outcome: ExecutionOutcome) -> Self {
        Self {
            outcome,
            output: None,
        }
    }
}

/// Runs one test synchronously.
///
/// `Err` is reserved for failures of the runner itself; every way the test
/// can end, including crashing, is an `Ok` outcome.
pub trait Runner {
    fn run(&self, test: &TestDescriptor) -> Result<RunReport, RunnerError>;
}

impl<F> Runner for F
where
    F: Fn(&TestDescriptor) -> Result<RunReport, RunnerError>,
{
    fn run(&self, test: &TestDescriptor) -> Result<RunReport, RunnerError> {
        self(test)
    }
}
