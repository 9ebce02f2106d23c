//! Run-wide aggregation of the event stream and the process exit status.

use std::process::ExitCode;

use crate::driver::EventSink;
use crate::errors::SinkError;
use crate::outcome::{ExecutionOutcome, TestEvent};

/// Exit status of a test program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    /// Every executed test passed or was skipped.
    Success = 0,
    /// A test failed, or nothing ran at all.
    Failure = 1,
    /// The command line was rejected.
    Usage = 2,
    /// The framework itself broke down.
    Internal = 3,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// Number of events per outcome kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub crashed: usize,
    pub timed_out: usize,
    pub errored: usize,
}

impl OutcomeCounts {
    pub fn record(&mut self, outcome: &ExecutionOutcome) {
        let slot = match outcome {
            ExecutionOutcome::Passed => &mut self.passed,
            ExecutionOutcome::Failed(_) => &mut self.failed,
            ExecutionOutcome::Skipped(_) => &mut self.skipped,
            ExecutionOutcome::CrashedSignal(_) => &mut self.crashed,
            ExecutionOutcome::TimedOut => &mut self.timed_out,
            ExecutionOutcome::Error(_) => &mut self.errored,
        };
        *slot += 1;
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.crashed + self.timed_out + self.errored
    }

    pub fn failures(&self) -> usize {
        self.failed + self.crashed + self.timed_out + self.errored
    }
}

/// A failing event, kept for the closing report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTest {
    pub pass: usize,
    pub name: String,
    pub outcome: ExecutionOutcome,
}

/// What a finished run amounted to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryReport {
    pub counts: OutcomeCounts,
    pub passes: usize,
    pub failures: Vec<FailedTest>,
}

impl SummaryReport {
    /// True when at least one test ran and none of them failed.
    pub fn good(&self) -> bool {
        self.counts.total() > 0 && self.counts.failures() == 0
    }

    pub fn exit_status(&self) -> ExitStatus {
        if self.good() {
            ExitStatus::Success
        } else {
            ExitStatus::Failure
        }
    }
}

/// Sink adapter that counts every event before forwarding it.
#[derive(Debug)]
pub struct RunSummary<S> {
    inner: S,
    report: SummaryReport,
    current_pass: usize,
}

impl<S: EventSink> RunSummary<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            report: SummaryReport::default(),
            current_pass: 0,
        }
    }

    /// The counts so far.
    pub fn report(&self) -> &SummaryReport {
        &self.report
    }

    pub fn finish(self) -> (SummaryReport, S) {
        (self.report, self.inner)
    }
}

impl<S: EventSink> EventSink for RunSummary<S> {
    fn started_pass(&mut self, pass: usize) -> Result<(), SinkError> {
        self.current_pass = pass;
        self.inner.started_pass(pass)
    }

    fn ended_pass(&mut self, pass: usize) -> Result<(), SinkError> {
        self.report.passes += 1;
        self.inner.ended_pass(pass)
    }

    fn record(&mut self, event: &TestEvent) -> Result<(), SinkError> {
        self.report.counts.record(&event.outcome);
        if event.outcome.is_failure() {
            self.report.failures.push(FailedTest {
                pass: self.current_pass,
                name: event.name.full_name(),
                outcome: event.outcome.clone(),
            });
        }
        self.inner.record(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::run_passes;
    use crate::errors::RunnerError;
    use crate::filters::CombinedFilter;
    use crate::runner::{InlineRunner, RunReport};
    use crate::suite::{Suite, TestDescriptor, TestTree};

    struct Discard;

    impl EventSink for Discard {
        fn record(&mut self, _event: &TestEvent) -> Result<(), SinkError> {
            Ok(())
        }
    }

    fn tree() -> TestTree {
        TestTree::build(vec![Suite::new("summary")
            .test("one", || Ok(()))
            .test("two", || Ok(()))
            .test_with("three", [crate::attributes::skip()], || Ok(()))])
        .unwrap()
    }

    #[test]
    fn repeated_passes_multiply_the_counts() {
        let mut summary = RunSummary::new(Discard);
        run_passes(&tree(), &CombinedFilter::default(), &InlineRunner, &mut summary, 3).unwrap();
        let (report, _) = summary.finish();

        assert_eq!(report.passes, 3);
        assert_eq!(
            report.counts,
            OutcomeCounts {
                passed: 6,
                skipped: 3,
                ..Default::default()
            }
        );
        assert!(report.good());
        assert_eq!(report.exit_status(), ExitStatus::Success);
    }

    #[test]
    fn one_failure_spoils_the_run() {
        let runner = |test: &TestDescriptor| -> Result<RunReport, RunnerError> {
            let outcome = if test.name.test == "two" {
                ExecutionOutcome::Failed("injected".into())
            } else {
                ExecutionOutcome::Passed
            };
            Ok(outcome.into())
        };
        let mut summary = RunSummary::new(Discard);
        run_passes(&tree(), &CombinedFilter::default(), &runner, &mut summary, 2).unwrap();
        let (report, _) = summary.finish();

        assert!(!report.good());
        assert_eq!(report.exit_status(), ExitStatus::Failure);
        assert_eq!(report.counts.failed, 2);
        assert_eq!(
            report.failures.iter().map(|f| f.pass).collect::<Vec<_>>(),
            [0, 1]
        );
        assert_eq!(report.failures[0].name, "summary > two");
    }

    #[test]
    fn empty_run_is_not_a_success() {
        let report = SummaryReport::default();
        assert!(!report.good());
        assert_eq!(report.exit_status(), ExitStatus::Failure);
    }

    #[test]
    fn exit_codes_are_stable() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::Failure.code(), 1);
        assert_eq!(ExitStatus::Usage.code(), 2);
        assert_eq!(ExitStatus::Internal.code(), 3);
    }
}
