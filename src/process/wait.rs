/*!
 * Wait Primitive
 *
 * Reaping always targets a specific pid, never "any child", so an executor
 * cannot collect a child that belongs to someone else in the same process.
 * EINTR is the interruption indicator: an interrupted wait is retried, any
 * other errno is surfaced.
 */

use super::types::{ProcessError, ProcessResult, Termination};
use log::error;
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::Pid;

/// Block until `pid` terminates and reap it
pub fn reap(pid: Pid) -> ProcessResult<Termination> {
    loop {
        match waitpid(pid, None) {
            Ok(status) => {
                if let Some(termination) = Termination::from_wait_status(status) {
                    return Ok(termination);
                }
            }
            Err(Errno::EINTR) => continue,
            Err(errno) => {
                error!("waitpid({}) failed: {}", pid, errno);
                return Err(ProcessError::Wait {
                    pid: pid.as_raw(),
                    errno,
                });
            }
        }
    }
}

/// Reap `pid` if it has already terminated, without blocking
pub fn try_reap(pid: Pid) -> ProcessResult<Option<Termination>> {
    loop {
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(status) => return Ok(Termination::from_wait_status(status)),
            Err(Errno::EINTR) => continue,
            Err(errno) => {
                return Err(ProcessError::Wait {
                    pid: pid.as_raw(),
                    errno,
                })
            }
        }
    }
}

/// Block until `pid` terminates, leaving it unreaped
///
/// The zombie keeps its pid reserved until `reap` is called, so anything
/// that still holds the pid (a deadline watchdog) cannot hit a recycled
/// process in between.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn wait_exited(pid: Pid) -> ProcessResult<()> {
    use nix::sys::wait::{waitid, Id};

    loop {
        match waitid(Id::Pid(pid), WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT) {
            Ok(_) => return Ok(()),
            Err(Errno::EINTR) => continue,
            Err(errno) => {
                error!("waitid({}) failed: {}", pid, errno);
                return Err(ProcessError::Wait {
                    pid: pid.as_raw(),
                    errno,
                });
            }
        }
    }
}
