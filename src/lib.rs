//! Crucible: the execution core of a unit-test framework.
//!
//! Tests are declared as a tree of [`Suite`]s carrying typed attributes,
//! selected by name and attribute filters, and run either in-process or one
//! child process per test so that crashes and hangs stay contained.
//!
//! A test program hands its suites to [`cli::drive_tests`]:
//!
//! ```no_run
//! use crucible::prelude::*;
//!
//! fn main() -> std::process::ExitCode {
//!     drive_tests(vec![Suite::new("math")
//!         .test("adds", || expect_eq(1 + 1, 2))
//!         .test_with("divides", [skip_because("not yet")], || Ok(()))])
//! }
//! ```

pub mod attributes;
pub mod child;
pub mod cli;
pub mod driver;
pub mod errors;
pub mod expect;
pub mod filters;
pub mod outcome;
pub mod runner;
pub mod suite;
pub mod summary;

pub use attributes::{Action, AttrInstance, Attribute, AttributeError, AttributeSet};
pub use errors::{ConfigError, DriverError, RunnerError, SinkError};
pub use expect::{BodyError, TestResult};
pub use filters::{CombinedFilter, Verdict};
pub use outcome::{ExecutionOutcome, TestEvent};
pub use suite::{Suite, TestDescriptor, TestTree};
pub use summary::ExitStatus;

/// Everything a test program usually needs.
pub mod prelude {
    pub use crate::attributes::{skip, skip_because, Action, Attribute};
    pub use crate::cli::drive_tests;
    pub use crate::expect::{expect, expect_eq, fail, BodyError, TestResult};
    pub use crate::suite::Suite;
}
