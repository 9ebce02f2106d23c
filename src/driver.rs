//! The execution driver: one pass over the test tree, repeated on request.
//!
//! For each descriptor, in declaration order, the driver asks the combined
//! filter for a verdict. Hidden tests never reach the sink, skipped tests are
//! reported without touching the runner, and everything else is dispatched
//! to the runner synchronously. Test N+1 never starts before test N's runner
//! call has returned.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::errors::{DriverError, SinkError};
use crate::filters::{CombinedFilter, Verdict};
use crate::outcome::{ExecutionOutcome, TestEvent};
use crate::runner::Runner;
use crate::suite::{TestDescriptor, TestTree};

/// Receives the structured event stream of a run.
pub trait EventSink {
    fn started_pass(&mut self, _pass: usize) -> Result<(), SinkError> {
        Ok(())
    }

    fn ended_pass(&mut self, _pass: usize) -> Result<(), SinkError> {
        Ok(())
    }

    fn record(&mut self, event: &TestEvent) -> Result<(), SinkError>;
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn started_pass(&mut self, pass: usize) -> Result<(), SinkError> {
        (**self).started_pass(pass)
    }

    fn ended_pass(&mut self, pass: usize) -> Result<(), SinkError> {
        (**self).ended_pass(pass)
    }

    fn record(&mut self, event: &TestEvent) -> Result<(), SinkError> {
        (**self).record(event)
    }
}

/// Runs every selected test of `tree` once.
pub fn run_pass<R, S>(
    tree: &TestTree,
    filter: &CombinedFilter,
    runner: &R,
    sink: &mut S,
    pass: usize,
) -> Result<(), DriverError>
where
    R: Runner + ?Sized,
    S: EventSink + ?Sized,
{
    debug!(pass, tests = tree.len(), "starting pass");
    sink.started_pass(pass)?;
    for test in tree {
        if let Some(event) = dispatch(test, filter, runner)? {
            sink.record(&event)?;
        }
    }
    sink.ended_pass(pass)?;
    debug!(pass, "finished pass");
    Ok(())
}

/// Runs `runs` independent passes feeding the same sink.
pub fn run_passes<R, S>(
    tree: &TestTree,
    filter: &CombinedFilter,
    runner: &R,
    sink: &mut S,
    runs: usize,
) -> Result<(), DriverError>
where
    R: Runner + ?Sized,
    S: EventSink + ?Sized,
{
    for pass in 0..runs {
        run_pass(tree, filter, runner, sink, pass)?;
    }
    Ok(())
}

fn dispatch<R>(
    test: &TestDescriptor,
    filter: &CombinedFilter,
    runner: &R,
) -> Result<Option<TestEvent>, DriverError>
where
    R: Runner + ?Sized,
{
    let verdict = filter.verdict(test);
    trace!(test = %test.name, ?verdict, "resolved verdict");

    let event = match verdict {
        Verdict::Hide => return Ok(None),
        Verdict::Skip(trigger) => TestEvent {
            name: test.name.clone(),
            outcome: ExecutionOutcome::Skipped(
                trigger.map_or_else(|| "attribute filter".to_string(), |attr| attr.to_string()),
            ),
            duration: Duration::ZERO,
            output: None,
        },
        Verdict::Run | Verdict::Indeterminate => {
            let started = Instant::now();
            let report = runner.run(test)?;
            TestEvent {
                name: test.name.clone(),
                outcome: report.outcome,
                duration: started.elapsed(),
                output: report.output,
            }
        }
    };
    Ok(Some(event))
}
