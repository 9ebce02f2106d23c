//! In-process test execution.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::trace;

use super::{RunReport, Runner};
use crate::errors::RunnerError;
use crate::expect::{BodyError, ExpectationFailure};
use crate::outcome::ExecutionOutcome;
use crate::suite::TestDescriptor;

/// Runs test bodies directly in the calling process.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineRunner;

impl Runner for InlineRunner {
    fn run(&self, test: &TestDescriptor) -> Result<RunReport, RunnerError> {
        Ok(run_inline(test).into())
    }
}

/// Invokes `test`'s body and classifies how it ended.
///
/// A failed expectation, returned or raised as a panic payload, is `Failed`;
/// any other error or panic is `Error`.
pub fn run_inline(test: &TestDescriptor) -> ExecutionOutcome {
    trace!(test = %test.name, "running inline");
    match panic::catch_unwind(AssertUnwindSafe(|| test.invoke())) {
        Ok(Ok(())) => ExecutionOutcome::Passed,
        Ok(Err(BodyError::Expectation(failure))) => ExecutionOutcome::Failed(failure.message),
        Ok(Err(BodyError::Other(message))) => ExecutionOutcome::Error(message),
        Err(payload) => classify_panic(payload),
    }
}

fn classify_panic(payload: Box<dyn Any + Send>) -> ExecutionOutcome {
    if let Some(failure) = payload.downcast_ref::<ExpectationFailure>() {
        return ExecutionOutcome::Failed(failure.message.clone());
    }
    let message = if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    };
    ExecutionOutcome::Error(format!("panicked: {message}"))
}
