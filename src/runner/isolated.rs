//! Process-per-test execution.
//!
//! For every test the parent creates a fresh result channel, re-executes the
//! test program as a child restricted to that one test, and waits for either
//! a record on the channel, the child's exit, or the deadline. At most one
//! child is alive at a time.

use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::channel;
use super::{RunReport, Runner};
use crate::errors::RunnerError;
use crate::outcome::{CapturedOutput, ExecutionOutcome, OutcomeRecord};
use crate::suite::TestDescriptor;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);
const OUTPUT_GRACE: Duration = Duration::from_millis(200);

/// Runs each test in a child process of `program`.
#[derive(Debug, Clone)]
pub struct IsolatedRunner {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Option<Duration>,
    capture_output: bool,
}

impl IsolatedRunner {
    /// A runner that re-executes `program` with `args` plus the child-mode
    /// options.
    pub fn new(program: impl Into<PathBuf>, args: impl IntoIterator<Item = OsString>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().collect(),
            timeout: None,
            capture_output: false,
        }
    }

    /// A runner that re-executes the current program.
    pub fn current(args: impl IntoIterator<Item = OsString>) -> Result<Self, RunnerError> {
        let program = std::env::current_exe().map_err(RunnerError::CurrentExe)?;
        Ok(Self::new(program, args))
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Keeps the child's stdout/stderr instead of discarding them.
    pub fn with_captured_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    fn spawn(&self, test: &TestDescriptor) -> Result<(Child, std::io::PipeReader), RunnerError> {
        let (reader, writer) = channel::result_channel().map_err(RunnerError::Channel)?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--child")
            .arg(writer.handle().to_string())
            .arg("--child-test")
            .arg(test.name.id.to_string())
            .stdin(Stdio::null());
        if self.capture_output {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        writer.inherit_into(&mut command);

        let child = command.spawn().map_err(|source| RunnerError::Spawn {
            test: test.name.full_name(),
            source,
        })?;
        // The child holds the only write end from here on, so EOF on the
        // reader means the child closed it or died.
        drop(writer);
        debug!(pid = child.id(), test = %test.name, "spawned child");
        Ok((child, reader))
    }
}

impl Runner for IsolatedRunner {
    fn run(&self, test: &TestDescriptor) -> Result<RunReport, RunnerError> {
        let started = Instant::now();
        let deadline = self.timeout.map(|timeout| started + timeout);
        let (mut child, reader) = self.spawn(test)?;
        let capture = OutputCapture::start(&mut child);
        let wait_error = |source| RunnerError::Wait {
            test: test.name.full_name(),
            source,
        };

        let received = read_record(reader, deadline);
        let status = match received {
            Some(_) => wait_until(&mut child, deadline).map_err(wait_error)?,
            None => None,
        };

        let Some(status) = status else {
            warn!(pid = child.id(), test = %test.name, "deadline elapsed, killing child");
            kill(&mut child).map_err(wait_error)?;
            return Ok(RunReport {
                outcome: ExecutionOutcome::TimedOut,
                output: capture.finish(),
            });
        };

        let bytes = received.unwrap_or_default();
        let outcome = classify(&bytes, status, test.name.id);
        debug!(test = %test.name, %status, outcome = outcome.label(), "child finished");
        Ok(RunReport {
            outcome,
            output: capture.finish(),
        })
    }
}

/// Reads one newline-terminated record, or whatever precedes EOF, on a
/// helper thread racing `deadline`.
///
/// `None` means the deadline elapsed first; the reader thread is abandoned
/// and ends once every write end of the pipe is closed.
fn read_record(reader: std::io::PipeReader, deadline: Option<Instant>) -> Option<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut bytes = Vec::new();
        let result = BufReader::new(reader)
            .read_until(b'\n', &mut bytes)
            .map(|_| bytes);
        let _ = tx.send(result);
    });

    let received = match deadline {
        Some(deadline) => {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(result) => Ok(result),
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => Err(()),
            }
        }
        None => rx.recv().map_err(|_| ()),
    };

    match received {
        Ok(Ok(bytes)) => Some(bytes),
        Ok(Err(err)) => {
            warn!(error = %err, "failed reading the result channel");
            Some(Vec::new())
        }
        Err(()) => Some(Vec::new()),
    }
}

/// Waits for the child to exit. `Ok(None)` means the deadline elapsed.
fn wait_until(child: &mut Child, deadline: Option<Instant>) -> io::Result<Option<ExitStatus>> {
    let Some(deadline) = deadline else {
        return child.wait().map(Some);
    };
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

/// Kills the child and reaps it, so it is gone when this returns.
fn kill(child: &mut Child) -> io::Result<()> {
    if let Err(err) = child.kill() {
        // Already exited on its own; reaping below still applies.
        if err.kind() != io::ErrorKind::InvalidInput {
            return Err(err);
        }
    }
    child.wait().map(|_| ())
}

fn classify(bytes: &[u8], status: ExitStatus, expected_test: usize) -> ExecutionOutcome {
    if let Some(signal) = terminating_signal(status) {
        return ExecutionOutcome::CrashedSignal(signal);
    }

    let record = if bytes.is_empty() {
        None
    } else {
        match OutcomeRecord::decode(bytes) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(error = %err, "malformed outcome record");
                None
            }
        }
    };

    match (record, status.success()) {
        (Some(record), true) if record.test == expected_test => record.outcome,
        (Some(record), true) => ExecutionOutcome::Error(format!(
            "child reported test {} instead of {expected_test}",
            record.test
        )),
        (Some(record), false) => ExecutionOutcome::Error(format!(
            "child exited with {} after reporting: {}",
            describe(status),
            record.outcome
        )),
        (None, true) => {
            ExecutionOutcome::Error("child exited without reporting a result".to_string())
        }
        (None, false) => ExecutionOutcome::Error(format!(
            "child exited with {} without reporting a result",
            describe(status)
        )),
    }
}

fn describe(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("status {code}"),
        None => status.to_string(),
    }
}

#[cfg(unix)]
fn terminating_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn terminating_signal(_status: ExitStatus) -> Option<i32> {
    None
}

/// Collects a child's stdout/stderr on helper threads.
struct OutputCapture {
    stdout: Option<Drain>,
    stderr: Option<Drain>,
}

/// One stream being drained; bytes land in `buffer` as they arrive.
struct Drain {
    buffer: Arc<Mutex<Vec<u8>>>,
    done: mpsc::Receiver<()>,
}

impl OutputCapture {
    fn start(child: &mut Child) -> Self {
        Self {
            stdout: child.stdout.take().map(drain),
            stderr: child.stderr.take().map(drain),
        }
    }

    /// Takes what was captured. Processes the test spawned may still hold
    /// the streams open, so EOF is awaited for at most `OUTPUT_GRACE`.
    fn finish(self) -> Option<CapturedOutput> {
        if self.stdout.is_none() && self.stderr.is_none() {
            return None;
        }
        let grace_ends = Instant::now() + OUTPUT_GRACE;
        Some(CapturedOutput {
            stdout: self.stdout.map(|d| d.collect(grace_ends)).unwrap_or_default(),
            stderr: self.stderr.map(|d| d.collect(grace_ends)).unwrap_or_default(),
        })
    }
}

impl Drain {
    fn collect(self, grace_ends: Instant) -> String {
        let remaining = grace_ends.saturating_duration_since(Instant::now());
        let _ = self.done.recv_timeout(remaining);
        let bytes = match self.buffer.lock() {
            Ok(bytes) => bytes.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn drain<R: Read + Send + 'static>(mut source: R) -> Drain {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let (tx, done) = mpsc::channel();
    let sink = Arc::clone(&buffer);
    thread::spawn(move || {
        let mut chunk = [0u8; 4096];
        loop {
            match source.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => match sink.lock() {
                    Ok(mut bytes) => bytes.extend_from_slice(&chunk[..n]),
                    Err(_) => break,
                },
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }
        let _ = tx.send(());
    });
    Drain { buffer, done }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    fn exited(code: i32) -> ExitStatus {
        ExitStatus::from_raw(code << 8)
    }

    fn signalled(signal: i32) -> ExitStatus {
        ExitStatus::from_raw(signal)
    }

    fn record(test: usize, outcome: ExecutionOutcome) -> Vec<u8> {
        OutcomeRecord { test, outcome }.encode().unwrap()
    }

    #[test]
    fn record_with_clean_exit_is_trusted() {
        let bytes = record(4, ExecutionOutcome::Failed("nope".into()));
        assert_eq!(
            classify(&bytes, exited(0), 4),
            ExecutionOutcome::Failed("nope".into())
        );
    }

    #[test]
    fn signal_wins_over_everything() {
        let bytes = record(4, ExecutionOutcome::Passed);
        assert_eq!(
            classify(&bytes, signalled(libc::SIGSEGV), 4),
            ExecutionOutcome::CrashedSignal(libc::SIGSEGV)
        );
        assert_eq!(
            classify(b"", signalled(libc::SIGABRT), 4),
            ExecutionOutcome::CrashedSignal(libc::SIGABRT)
        );
    }

    #[test]
    fn missing_record_is_an_error_with_the_status() {
        let ExecutionOutcome::Error(message) = classify(b"", exited(3), 0) else {
            panic!("expected an error outcome");
        };
        assert!(message.contains("status 3"), "{message}");

        assert!(matches!(classify(b"", exited(0), 0), ExecutionOutcome::Error(_)));
        assert!(matches!(classify(b"{\"te", exited(0), 0), ExecutionOutcome::Error(_)));
    }

    #[test]
    fn record_with_failing_exit_is_an_error() {
        let bytes = record(4, ExecutionOutcome::Passed);
        let ExecutionOutcome::Error(message) = classify(&bytes, exited(1), 4) else {
            panic!("expected an error outcome");
        };
        assert!(message.contains("status 1"), "{message}");
        assert!(message.contains("passed"), "{message}");
    }

    #[test]
    fn record_for_another_test_is_an_error() {
        let bytes = record(1, ExecutionOutcome::Passed);
        assert!(matches!(classify(&bytes, exited(0), 2), ExecutionOutcome::Error(_)));
    }
}
