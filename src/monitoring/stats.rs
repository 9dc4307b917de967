/*!
 * Lock-Free Executor Statistics
 * Uses atomic counters for zero-contention stats tracking
 */

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of executor counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutorStats {
    pub pipelines_run: u64,
    pub stages_spawned: u64,
    pub setup_failures: u64,
    pub exec_failures: u64,
    pub tasks_run: u64,
    pub timeouts: u64,
    pub signal_deaths: u64,
}

/// Atomic executor statistics for lock-free updates
///
/// # Performance
/// - Cache-line aligned to prevent false sharing
/// - All operations use relaxed ordering
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct AtomicExecutorStats {
    pipelines_run: AtomicU64,
    stages_spawned: AtomicU64,
    setup_failures: AtomicU64,
    exec_failures: AtomicU64,
    tasks_run: AtomicU64,
    timeouts: AtomicU64,
    signal_deaths: AtomicU64,
}

impl AtomicExecutorStats {
    /// Create new atomic stats
    #[inline]
    pub const fn new() -> Self {
        Self {
            pipelines_run: AtomicU64::new(0),
            stages_spawned: AtomicU64::new(0),
            setup_failures: AtomicU64::new(0),
            exec_failures: AtomicU64::new(0),
            tasks_run: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            signal_deaths: AtomicU64::new(0),
        }
    }

    #[inline(always)]
    pub fn inc_pipelines(&self) {
        self.pipelines_run.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_stages_spawned(&self) {
        self.stages_spawned.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_setup_failures(&self) {
        self.setup_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_exec_failures(&self) {
        self.exec_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_tasks(&self) {
        self.tasks_run.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_timeouts(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_signal_deaths(&self) {
        self.signal_deaths.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats (no locks required)
    ///
    /// # Note
    /// Values may not be perfectly consistent with each other due to concurrent updates,
    /// but each individual value is accurate.
    #[inline]
    pub fn snapshot(&self) -> ExecutorStats {
        ExecutorStats {
            pipelines_run: self.pipelines_run.load(Ordering::Relaxed),
            stages_spawned: self.stages_spawned.load(Ordering::Relaxed),
            setup_failures: self.setup_failures.load(Ordering::Relaxed),
            exec_failures: self.exec_failures.load(Ordering::Relaxed),
            tasks_run: self.tasks_run.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            signal_deaths: self.signal_deaths.load(Ordering::Relaxed),
        }
    }
}
