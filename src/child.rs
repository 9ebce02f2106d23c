//! Child mode: run exactly one test and report it over the result channel.

use std::io::Write;

use tracing::debug;

use crate::driver::EventSink;
use crate::errors::{DriverError, SinkError};
use crate::outcome::{OutcomeRecord, TestEvent};
use crate::runner::channel::{self, Handle};
use crate::runner::run_inline;
use crate::suite::{TestId, TestTree};

/// Writes a single outcome record, then closes the channel.
#[derive(Debug)]
pub struct ChildSink<W: Write> {
    channel: Option<W>,
}

impl<W: Write> ChildSink<W> {
    pub fn new(channel: W) -> Self {
        Self {
            channel: Some(channel),
        }
    }

    /// Whether the record has been written.
    pub fn is_closed(&self) -> bool {
        self.channel.is_none()
    }
}

impl<W: Write> EventSink for ChildSink<W> {
    fn record(&mut self, event: &TestEvent) -> Result<(), SinkError> {
        let Some(mut channel) = self.channel.take() else {
            return Err(SinkError::Io(std::io::Error::other(
                "result channel already closed",
            )));
        };
        let record = OutcomeRecord {
            test: event.name.id,
            outcome: event.outcome.clone(),
        };
        channel.write_all(&record.encode()?)?;
        channel.flush()?;
        Ok(())
    }
}

/// Runs test `id` of `tree` in this process and writes its outcome to the
/// inherited channel `handle`.
///
/// Filters are not consulted: the parent only dispatches tests it already
/// decided to run.
pub fn run_child(tree: &TestTree, handle: Handle, id: TestId) -> Result<(), DriverError> {
    let test = tree.get(id).ok_or(DriverError::UnknownChildTest(id))?;
    let channel = channel::open_inherited(handle).map_err(SinkError::Io)?;
    debug!(test = %test.name, handle, "running as child");

    let started = std::time::Instant::now();
    let outcome = run_inline(test);
    let event = TestEvent {
        name: test.name.clone(),
        outcome,
        duration: started.elapsed(),
        output: None,
    };
    ChildSink::new(channel).record(&event)?;
    Ok(())
}
