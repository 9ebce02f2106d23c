//! Outcomes of a single test and the record a child process sends back.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::suite::TestName;

/// How one test ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Passed,
    Failed(String),
    Skipped(String),
    CrashedSignal(i32),
    TimedOut,
    Error(String),
}

impl ExecutionOutcome {
    /// Whether this outcome spoils the run.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ExecutionOutcome::Failed(_)
                | ExecutionOutcome::Error(_)
                | ExecutionOutcome::CrashedSignal(_)
                | ExecutionOutcome::TimedOut
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExecutionOutcome::Passed => "PASS",
            ExecutionOutcome::Failed(_) => "FAIL",
            ExecutionOutcome::Skipped(_) => "SKIP",
            ExecutionOutcome::CrashedSignal(_) => "CRASH",
            ExecutionOutcome::TimedOut => "TIMEOUT",
            ExecutionOutcome::Error(_) => "ERROR",
        }
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionOutcome::Passed => f.write_str("passed"),
            ExecutionOutcome::Failed(message) => write!(f, "failed: {message}"),
            ExecutionOutcome::Skipped(reason) if reason.is_empty() => f.write_str("skipped"),
            ExecutionOutcome::Skipped(reason) => write!(f, "skipped: {reason}"),
            ExecutionOutcome::CrashedSignal(signal) => write!(f, "crashed with signal {signal}"),
            ExecutionOutcome::TimedOut => f.write_str("timed out"),
            ExecutionOutcome::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// Output a child wrote to its terminal, captured by the parent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }
}

/// One entry of the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestEvent {
    pub name: TestName,
    pub outcome: ExecutionOutcome,
    pub duration: Duration,
    pub output: Option<CapturedOutput>,
}

/// The single record a child writes to its result channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub test: usize,
    pub outcome: ExecutionOutcome,
}

impl OutcomeRecord {
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Decodes a complete record; trailing whitespace is allowed, anything
    /// else after the record is not.
    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
