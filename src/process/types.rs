/*!
 * Process Types
 * Common types for spawning and reaping child processes
 */

use crate::core::serde::signal_name;
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// OS-level process id, as returned by fork
pub type OsPid = i32;

/// Process operation result
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Low-level process errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("pipe() failed: {0}")]
    Pipe(Errno),

    #[error("fork() failed: {0}")]
    Fork(Errno),

    #[error("waitpid({pid}) failed: {errno}")]
    Wait { pid: OsPid, errno: Errno },
}

/// How a reaped child terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Termination {
    /// Terminated normally with an exit status
    Exited { code: i32 },
    /// Terminated by a delivered signal
    Signaled {
        #[serde(with = "signal_name")]
        signal: Signal,
    },
}

impl Termination {
    /// Classify a wait status; `None` for states that are not terminal
    pub fn from_wait_status(status: WaitStatus) -> Option<Self> {
        match status {
            WaitStatus::Exited(_, code) => Some(Self::Exited { code }),
            WaitStatus::Signaled(_, signal, _) => Some(Self::Signaled { signal }),
            _ => None,
        }
    }

    /// True for a normal exit with status 0
    #[inline]
    pub fn success(&self) -> bool {
        matches!(self, Self::Exited { code: 0 })
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited { code } => write!(f, "exited with code {}", code),
            Self::Signaled { signal } => {
                write!(f, "killed by {} ({})", signal, describe_signal(*signal))
            }
        }
    }
}

/// Human-readable description of a signal
pub fn describe_signal(signal: Signal) -> &'static str {
    match signal {
        Signal::SIGHUP => "Hangup",
        Signal::SIGINT => "Interrupt",
        Signal::SIGQUIT => "Quit",
        Signal::SIGILL => "Illegal instruction",
        Signal::SIGTRAP => "Trace/breakpoint trap",
        Signal::SIGABRT => "Aborted",
        Signal::SIGBUS => "Bus error",
        Signal::SIGFPE => "Floating point exception",
        Signal::SIGKILL => "Killed",
        Signal::SIGUSR1 => "User defined signal 1",
        Signal::SIGSEGV => "Segmentation fault",
        Signal::SIGUSR2 => "User defined signal 2",
        Signal::SIGPIPE => "Broken pipe",
        Signal::SIGALRM => "Alarm clock",
        Signal::SIGTERM => "Terminated",
        Signal::SIGXCPU => "CPU time limit exceeded",
        Signal::SIGXFSZ => "File size limit exceeded",
        Signal::SIGSYS => "Bad system call",
        _ => "Unknown signal",
    }
}
