/*!
 * Pipe Links
 *
 * A link connects stage i's stdout to stage i+1's stdin. Both ends are owned
 * descriptors, so each copy held by the parent is closed exactly once, when
 * its owner is dropped.
 */

use crate::process::fd::pipe_above_stdio;
use crate::process::types::ProcessResult;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

/// One pipe between two adjacent stages
#[derive(Debug)]
pub struct PipeLink {
    read: OwnedFd,
    write: OwnedFd,
}

impl PipeLink {
    /// Create a fresh link
    pub fn open() -> ProcessResult<Self> {
        let (read, write) = pipe_above_stdio()?;
        Ok(Self { read, write })
    }

    #[inline]
    pub fn read_fd(&self) -> RawFd {
        self.read.as_raw_fd()
    }

    #[inline]
    pub fn write_fd(&self) -> RawFd {
        self.write.as_raw_fd()
    }

    /// Close the write end and keep the read end for the next stage
    pub fn into_read_end(self) -> OwnedFd {
        let Self { read, write } = self;
        drop(write);
        read
    }
}
