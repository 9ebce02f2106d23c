//! Expectation failures raised by test bodies.
//!
//! Matchers live outside this crate; all the core needs is a typed signal that
//! tells "the test's expectation didn't hold" apart from "the test broke".
//! A body reports the former either by returning
//! [`BodyError::Expectation`] or by panicking with an [`ExpectationFailure`]
//! payload (see [`fail`]).

use std::fmt::{Debug, Display};

use thiserror::Error;

/// A failed expectation. Recorded as a `Failed` outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExpectationFailure {
    pub message: String,
}

impl ExpectationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error returned by a test body.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error(transparent)]
    Expectation(#[from] ExpectationFailure),
    /// Anything else; recorded as an `Error` outcome.
    #[error("{0}")]
    Other(String),
}

impl BodyError {
    pub fn other(err: impl Display) -> Self {
        Self::Other(err.to_string())
    }
}

/// What a test body returns.
pub type TestResult = Result<(), BodyError>;

pub fn expect(condition: bool, description: impl Into<String>) -> TestResult {
    if condition {
        Ok(())
    } else {
        Err(ExpectationFailure::new(description).into())
    }
}

pub fn expect_eq<T>(actual: T, expected: T) -> TestResult
where
    T: PartialEq + Debug,
{
    if actual == expected {
        return Ok(());
    }
    Err(ExpectationFailure::new(format!(
        "expected: {expected:?}\nactual:   {actual:?}"
    ))
    .into())
}

/// Aborts the current test body with an expectation failure.
///
/// Unwinds without running the panic hook, so nothing is printed; the
/// runner reports the failure.
pub fn fail(message: impl Into<String>) -> ! {
    std::panic::resume_unwind(Box::new(ExpectationFailure::new(message)))
}
