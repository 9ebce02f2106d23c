//! The result channel between a parent and its child.
//!
//! A pipe whose write end is inherited by exactly one child. The child learns
//! the handle through `--child <handle>` and writes one outcome record to it.
//! Only unix has an implementation; elsewhere [`SUPPORTED`] is false and the
//! isolated runner is rejected at configuration time.

#[cfg(unix)]
pub use self::unix::*;

#[cfg(not(unix))]
pub use self::unsupported::*;

#[cfg(unix)]
mod unix {
    use std::fs::File;
    use std::io::{self, PipeReader, PipeWriter};
    use std::os::fd::{AsRawFd, FromRawFd, RawFd};
    use std::os::unix::process::CommandExt;
    use std::process::Command;

    pub const SUPPORTED: bool = true;

    /// Raw handle value passed on the child's command line.
    pub type Handle = RawFd;

    /// Parent-side write end, kept open only until the child is spawned.
    #[derive(Debug)]
    pub struct ResultWriter {
        pipe: PipeWriter,
    }

    impl ResultWriter {
        pub fn handle(&self) -> Handle {
            self.pipe.as_raw_fd()
        }

        /// Lets the child spawned from `command` inherit the write end. Both
        /// ends are close-on-exec, so no other process picks them up.
        pub fn inherit_into(&self, command: &mut Command) {
            let fd = self.handle();
            // SAFETY: the hook runs between fork and exec and only calls
            // fcntl, which is async-signal-safe.
            unsafe {
                command.pre_exec(move || {
                    if libc::fcntl(fd, libc::F_SETFD, 0) == -1 {
                        return Err(io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        }
    }

    pub fn result_channel() -> io::Result<(PipeReader, ResultWriter)> {
        let (reader, pipe) = io::pipe()?;
        Ok((reader, ResultWriter { pipe }))
    }

    /// Child side: takes ownership of the inherited write end.
    pub fn open_inherited(handle: Handle) -> io::Result<File> {
        // SAFETY: fcntl on an arbitrary integer is harmless; it only tells
        // whether the descriptor is open.
        if handle < 0 || unsafe { libc::fcntl(handle, libc::F_GETFD) } == -1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{handle} is not an open descriptor"),
            ));
        }
        // Processes spawned by the test body must not inherit the channel,
        // or the parent would never see it close.
        // SAFETY: the descriptor was just checked to be open.
        if unsafe { libc::fcntl(handle, libc::F_SETFD, libc::FD_CLOEXEC) } == -1 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: the descriptor is open and was handed to this process for
        // its exclusive use by the parent.
        Ok(unsafe { File::from_raw_fd(handle) })
    }
}

#[cfg(not(unix))]
mod unsupported {
    use std::fs::File;
    use std::io::{self, PipeReader};
    use std::process::Command;

    pub const SUPPORTED: bool = false;

    pub type Handle = i64;

    #[derive(Debug)]
    pub struct ResultWriter;

    impl ResultWriter {
        pub fn handle(&self) -> Handle {
            -1
        }

        pub fn inherit_into(&self, _command: &mut Command) {}
    }

    pub fn result_channel() -> io::Result<(PipeReader, ResultWriter)> {
        Err(io::ErrorKind::Unsupported.into())
    }

    pub fn open_inherited(_handle: Handle) -> io::Result<File> {
        Err(io::ErrorKind::Unsupported.into())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::os::fd::AsRawFd;

    #[test]
    fn record_travels_through_the_channel() {
        let (mut reader, writer) = result_channel().unwrap();
        let mut child_end = open_inherited(writer.handle()).unwrap();
        std::mem::forget(writer);
        child_end.write_all(b"record\n").unwrap();
        drop(child_end);

        let mut received = String::new();
        reader.read_to_string(&mut received).unwrap();
        assert_eq!(received, "record\n");
    }

    #[test]
    fn opened_channel_is_closed_on_exec() {
        let (_reader, writer) = result_channel().unwrap();
        let handle = writer.handle();
        // SAFETY: clearing the flag on a descriptor this test owns.
        assert_ne!(unsafe { libc::fcntl(handle, libc::F_SETFD, 0) }, -1);
        let child_end = open_inherited(handle).unwrap();
        std::mem::forget(writer);

        // SAFETY: the descriptor is owned by `child_end` and still open.
        let flags = unsafe { libc::fcntl(child_end.as_raw_fd(), libc::F_GETFD) };
        assert_eq!(flags & libc::FD_CLOEXEC, libc::FD_CLOEXEC);
    }

    #[test]
    fn closed_handles_are_rejected() {
        assert!(open_inherited(-1).is_err());
    }
}
