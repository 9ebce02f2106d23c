//! Handles all user-facing output of a test run.
//!
//! [`TerminalSink`] renders the event stream as it arrives and closes the run
//! with a summary. Colorizing goes through `termcolor`, so tests can render
//! into a plain [`termcolor::Buffer`].

use std::io;
use std::time::Duration;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::cli::args::{ColorWhen, OutputFormat};
use crate::driver::EventSink;
use crate::errors::SinkError;
use crate::outcome::{CapturedOutput, ExecutionOutcome, TestEvent};
use crate::summary::SummaryReport;

// ============================================================================
// TERMINAL SINK
// ============================================================================

/// Renders test events for a human reader.
pub struct TerminalSink<W> {
    out: W,
    format: OutputFormat,
    show_time: bool,
    passes: usize,
}

impl TerminalSink<StandardStream> {
    /// A sink writing to stdout.
    pub fn stdout(format: OutputFormat, color: ColorWhen, show_time: bool) -> Self {
        Self::new(StandardStream::stdout(color_choice(color)), format, show_time)
    }
}

impl<W: WriteColor> TerminalSink<W> {
    pub fn new(out: W, format: OutputFormat, show_time: bool) -> Self {
        Self {
            out,
            format,
            show_time,
            passes: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Prints the closing summary of a run.
    pub fn summarize(&mut self, report: &SummaryReport) -> io::Result<()> {
        let counts = &report.counts;
        if !report.failures.is_empty() {
            writeln!(self.out, "\nFailed tests:")?;
            for failure in &report.failures {
                write!(self.out, "  - {}", failure.name)?;
                if self.passes > 1 {
                    write!(self.out, " (run {})", failure.pass + 1)?;
                }
                writeln!(self.out, ": {}", failure.outcome)?;
            }
        }

        write!(self.out, "\nTest summary: total {}, ", counts.total())?;
        self.colored(Color::Green, "passed")?;
        write!(self.out, " {}, ", counts.passed)?;
        self.colored(Color::Red, "failed")?;
        write!(self.out, " {}, ", counts.failures())?;
        self.colored(Color::Yellow, "skipped")?;
        write!(self.out, " {}", counts.skipped)?;
        if report.passes > 1 {
            write!(self.out, " over {} runs", report.passes)?;
        }
        writeln!(self.out)?;

        if counts.total() == 0 {
            writeln!(self.out, "no tests were run")?;
        }
        self.out.flush()
    }

    fn colored(&mut self, color: Color, text: &str) -> io::Result<()> {
        self.out
            .set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        write!(self.out, "{text}")?;
        self.out.reset()
    }

    fn write_event(&mut self, event: &TestEvent) -> io::Result<()> {
        let quiet = matches!(self.format, OutputFormat::Brief)
            && matches!(event.outcome, ExecutionOutcome::Passed);
        if quiet {
            return Ok(());
        }

        self.colored(outcome_color(&event.outcome), event.outcome.label())?;
        write!(self.out, ": {}", event.name)?;
        if self.show_time {
            write!(self.out, " [{}]", format_duration(event.duration))?;
        }
        match &event.outcome {
            ExecutionOutcome::Passed | ExecutionOutcome::TimedOut => writeln!(self.out)?,
            ExecutionOutcome::Skipped(reason) if reason.is_empty() => writeln!(self.out)?,
            ExecutionOutcome::Skipped(reason) => writeln!(self.out, " ({reason})")?,
            ExecutionOutcome::CrashedSignal(signal) => writeln!(self.out, " (signal {signal})")?,
            ExecutionOutcome::Failed(message) | ExecutionOutcome::Error(message) => {
                writeln!(self.out)?;
                for line in message.lines() {
                    writeln!(self.out, "  {line}")?;
                }
            }
        }

        if let Some(output) = &event.output {
            let show = event.outcome.is_failure() || matches!(self.format, OutputFormat::Verbose);
            if show && !output.is_empty() {
                self.write_captured(output)?;
            }
        }
        Ok(())
    }

    fn write_captured(&mut self, output: &CapturedOutput) -> io::Result<()> {
        for (stream, text) in [("stdout", &output.stdout), ("stderr", &output.stderr)] {
            if text.is_empty() {
                continue;
            }
            writeln!(self.out, "  --- {stream} ---")?;
            for line in text.lines() {
                writeln!(self.out, "  {line}")?;
            }
        }
        Ok(())
    }
}

impl<W: WriteColor> EventSink for TerminalSink<W> {
    fn started_pass(&mut self, pass: usize) -> Result<(), SinkError> {
        if pass > 0 && matches!(self.format, OutputFormat::Verbose) {
            writeln!(self.out, "--- run {} ---", pass + 1)?;
        }
        Ok(())
    }

    fn ended_pass(&mut self, _pass: usize) -> Result<(), SinkError> {
        self.passes += 1;
        self.out.flush()?;
        Ok(())
    }

    fn record(&mut self, event: &TestEvent) -> Result<(), SinkError> {
        self.write_event(event)?;
        Ok(())
    }
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn color_choice(color: ColorWhen) -> ColorChoice {
    match color {
        ColorWhen::Always => ColorChoice::Always,
        ColorWhen::Never => ColorChoice::Never,
        ColorWhen::Auto if atty::is(atty::Stream::Stdout) => ColorChoice::Auto,
        ColorWhen::Auto => ColorChoice::Never,
    }
}

fn outcome_color(outcome: &ExecutionOutcome) -> Color {
    match outcome {
        ExecutionOutcome::Passed => Color::Green,
        ExecutionOutcome::Skipped(_) => Color::Yellow,
        ExecutionOutcome::TimedOut => Color::Magenta,
        _ => Color::Red,
    }
}

fn format_duration(duration: Duration) -> String {
    let millis = duration.as_secs_f64() * 1000.0;
    if millis < 1000.0 {
        format!("{millis:.1}ms")
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::{FailedTest, OutcomeCounts};
    use crate::suite::TestName;
    use termcolor::Buffer;

    fn event(test: &str, outcome: ExecutionOutcome) -> TestEvent {
        TestEvent {
            name: TestName {
                suites: vec!["math".to_string()],
                test: test.to_string(),
                id: 0,
            },
            outcome,
            duration: Duration::from_millis(12),
            output: None,
        }
    }

    fn render(format: OutputFormat, show_time: bool, events: &[TestEvent]) -> String {
        let mut sink = TerminalSink::new(Buffer::no_color(), format, show_time);
        sink.started_pass(0).unwrap();
        for event in events {
            sink.record(event).unwrap();
        }
        sink.ended_pass(0).unwrap();
        String::from_utf8(sink.into_inner().into_inner()).unwrap()
    }

    #[test]
    fn brief_output_hides_passing_tests() {
        let text = render(
            OutputFormat::Brief,
            false,
            &[
                event("adds", ExecutionOutcome::Passed),
                event("divides", ExecutionOutcome::Failed("expected: 2\nactual:   3".into())),
                event("overflows", ExecutionOutcome::Skipped("skip(slow)".into())),
            ],
        );
        assert_eq!(
            text,
            "FAIL: math > divides\n  expected: 2\n  actual:   3\nSKIP: math > overflows (skip(slow))\n"
        );
    }

    #[test]
    fn verbose_output_lists_everything_with_times() {
        let text = render(
            OutputFormat::Verbose,
            true,
            &[
                event("adds", ExecutionOutcome::Passed),
                event("crashes", ExecutionOutcome::CrashedSignal(6)),
            ],
        );
        assert_eq!(
            text,
            "PASS: math > adds [12.0ms]\nCRASH: math > crashes [12.0ms] (signal 6)\n"
        );
    }

    #[test]
    fn captured_output_follows_a_failure() {
        let mut failing = event("prints", ExecutionOutcome::TimedOut);
        failing.output = Some(CapturedOutput {
            stdout: "hello\n".into(),
            stderr: String::new(),
        });
        let text = render(OutputFormat::Brief, false, &[failing]);
        assert_eq!(text, "TIMEOUT: math > prints\n  --- stdout ---\n  hello\n");
    }

    #[test]
    fn summary_lists_failures() {
        let report = SummaryReport {
            counts: OutcomeCounts {
                passed: 3,
                failed: 1,
                skipped: 1,
                ..Default::default()
            },
            passes: 1,
            failures: vec![FailedTest {
                pass: 0,
                name: "math > divides".into(),
                outcome: ExecutionOutcome::Failed("nope".into()),
            }],
        };
        let mut sink = TerminalSink::new(Buffer::no_color(), OutputFormat::Brief, false);
        sink.summarize(&report).unwrap();
        let text = String::from_utf8(sink.into_inner().into_inner()).unwrap();
        assert_eq!(
            text,
            "\nFailed tests:\n  - math > divides: failed: nope\n\nTest summary: total 5, passed 3, failed 1, skipped 1\n"
        );
    }

    #[test]
    fn durations_switch_units() {
        assert_eq!(format_duration(Duration::from_micros(1500)), "1.5ms");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.50s");
    }
}
