/*!
 * Descriptor Helpers
 *
 * Every pipe end handed to a stage lives above the stdio range and carries
 * close-on-exec, so a copy that escapes into an unrelated child disappears
 * the moment that child execs.
 */

use super::types::{ProcessError, ProcessResult};
use crate::core::limits::MIN_PIPE_FD;
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

/// Create a pipe whose ends are both >= `MIN_PIPE_FD` and close-on-exec
///
/// Returns `(read_end, write_end)`.
pub fn pipe_above_stdio() -> ProcessResult<(OwnedFd, OwnedFd)> {
    let (read, write) = nix::unistd::pipe().map_err(ProcessError::Pipe)?;
    let read = lift(read).map_err(ProcessError::Pipe)?;
    let write = lift(write).map_err(ProcessError::Pipe)?;
    Ok((read, write))
}

/// Duplicate `fd` to the lowest free slot >= `MIN_PIPE_FD` with close-on-exec
/// set, consuming (closing) the original
pub fn lift(fd: OwnedFd) -> Result<OwnedFd, Errno> {
    let raw = fcntl(fd.as_raw_fd(), FcntlArg::F_DUPFD_CLOEXEC(MIN_PIPE_FD))?;
    // SAFETY: fcntl just returned a fresh descriptor that nothing else owns
    let lifted = unsafe { OwnedFd::from_raw_fd(raw) };
    drop(fd);
    Ok(lifted)
}

/// Number of descriptors currently open in this process
///
/// Returns `None` where the count is not observable.
pub fn open_fd_count() -> Option<usize> {
    #[cfg(target_os = "linux")]
    {
        // read_dir holds one descriptor of its own while iterating
        let entries = std::fs::read_dir("/proc/self/fd").ok()?;
        Some(entries.filter_map(|e| e.ok()).count().saturating_sub(1))
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::fcntl::FdFlag;

    #[test]
    fn test_pipe_ends_above_stdio_with_cloexec() {
        let (read, write) = pipe_above_stdio().unwrap();
        for fd in [&read, &write] {
            assert!(fd.as_raw_fd() >= MIN_PIPE_FD);
            let flags = fcntl(fd.as_raw_fd(), FcntlArg::F_GETFD).unwrap();
            assert!(FdFlag::from_bits_truncate(flags).contains(FdFlag::FD_CLOEXEC));
        }
    }

    #[test]
    fn test_pipe_carries_bytes() {
        use std::io::{Read, Write};

        let (read, write) = pipe_above_stdio().unwrap();
        let mut writer = std::fs::File::from(write);
        writer.write_all(b"through").unwrap();
        drop(writer);

        let mut out = String::new();
        std::fs::File::from(read).read_to_string(&mut out).unwrap();
        assert_eq!(out, "through");
    }
}
