/*!
 * RAII Resource Guards
 *
 * Guards own a kernel resource and release it on drop.
 *
 * ## Guard Types
 *
 * - **ChildGuard**: a spawned child process that must be reaped
 *
 * ## Example
 *
 * ```ignore
 * let mut child = ChildGuard::new(pid, "sed");
 * let termination = child.reap()?;
 * // An unreaped guard reaps (blocking) when dropped
 * ```
 */

mod child;
mod traits;

pub use child::ChildGuard;
pub use traits::{Guard, GuardDrop};

use crate::process::types::OsPid;

/// Result type for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

/// Errors that can occur during guard operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum GuardError {
    #[error("Resource already released")]
    AlreadyReleased,

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Guard metadata for observability
#[derive(Debug, Clone)]
pub struct GuardMetadata {
    pub resource_type: &'static str,
    pub creation_time: std::time::Instant,
    pub pid: Option<OsPid>,
}

impl GuardMetadata {
    #[inline]
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            creation_time: std::time::Instant::now(),
            pid: None,
        }
    }

    #[inline]
    pub fn with_pid(mut self, pid: OsPid) -> Self {
        self.pid = Some(pid);
        self
    }

    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        self.creation_time.elapsed().as_micros() as u64
    }
}
