/*!
 * Child Process Guards
 *
 * RAII ownership of a spawned child until it has been reaped
 */

use super::traits::{Guard, GuardDrop};
use super::{GuardError, GuardMetadata, GuardResult};
use crate::process::types::{OsPid, ProcessResult, Termination};
use crate::process::wait;
use nix::unistd::Pid;

/// Child process guard with automatic reaping
///
/// A guard that is dropped while its child is still unreaped blocks until
/// the child terminates, so no path out of an executor leaves a zombie.
///
/// # Example
///
/// ```ignore
/// let mut guard = ChildGuard::new(pid, "cat");
/// let termination = guard.reap()?;
/// ```
pub struct ChildGuard {
    pid: Pid,
    label: String,
    metadata: GuardMetadata,
    termination: Option<Termination>,
    active: bool,
}

impl ChildGuard {
    /// Take ownership of an unreaped child
    pub fn new(pid: Pid, label: impl Into<String>) -> Self {
        Self {
            pid,
            label: label.into(),
            metadata: GuardMetadata::new("child").with_pid(pid.as_raw()),
            termination: None,
            active: true,
        }
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn os_pid(&self) -> OsPid {
        self.metadata.pid.unwrap_or_else(|| self.pid.as_raw())
    }

    /// Termination recorded by a previous successful `reap`
    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    /// Block until the child terminates and reap it
    ///
    /// Reaping happens at most once; later calls return the recorded
    /// termination.
    pub fn reap(&mut self) -> ProcessResult<Termination> {
        if let Some(termination) = self.termination {
            return Ok(termination);
        }

        // Whatever waitpid says, the pid is no longer ours to wait on
        self.active = false;
        let termination = wait::reap(self.pid)?;
        self.termination = Some(termination);

        log::debug!(
            "Reaped {} '{}' (OS PID: {}) after {}us: {}",
            self.resource_type(),
            self.label,
            self.os_pid(),
            self.metadata().lifetime_micros(),
            termination
        );
        Ok(termination)
    }
}

impl Guard for ChildGuard {
    fn resource_type(&self) -> &'static str {
        self.metadata.resource_type
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn release(&mut self) -> GuardResult<()> {
        if !self.active {
            return Err(GuardError::AlreadyReleased);
        }
        self.reap()
            .map(|_| ())
            .map_err(|e| GuardError::OperationFailed(e.to_string()))
    }
}

impl GuardDrop for ChildGuard {
    fn on_drop(&mut self) {
        if self.active {
            if let Err(e) = self.release() {
                log::error!(
                    "Guard drop failed for {} '{}' (OS PID: {}): {}",
                    self.resource_type(),
                    self.label,
                    self.os_pid(),
                    e
                );
            }
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.on_drop();
    }
}
