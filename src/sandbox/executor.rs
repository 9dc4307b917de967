/*!
 * Bounded Executor
 * Runs one task in a forked child under an optional wall-clock deadline
 *
 * Lifecycle: Idle -> Spawned -> {Completed | Killed} -> Reported
 *
 * The deadline is armed in the parent. The parent first observes the
 * child's termination without reaping it, then disarms the watchdog, then
 * reaps. A deadline that fires after the child exited on its own still
 * wins: the outcome is `TimedOut` and the child is reaped exactly once.
 */

use super::types::{BoundedTask, SandboxConfig, TaskOutcome};
use crate::core::errors::ExecutorError;
use crate::core::guard::ChildGuard;
use crate::monitoring::{AtomicExecutorStats, RunSpan};
use crate::process::spawn::spawn_action;
use crate::process::types::{ProcessResult, Termination};
use nix::sys::signal::{kill, Signal};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Runs bounded tasks in isolated child processes
#[derive(Debug, Clone, Default)]
pub struct BoundedExecutor {
    config: SandboxConfig,
    stats: Arc<AtomicExecutorStats>,
}

impl BoundedExecutor {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            stats: Arc::new(AtomicExecutorStats::new()),
        }
    }

    /// Share a stats block with other executors
    pub fn with_stats(mut self, stats: Arc<AtomicExecutorStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn stats(&self) -> &Arc<AtomicExecutorStats> {
        &self.stats
    }

    /// Run `task` to a classified outcome
    ///
    /// Never returns while the child is still running. In verbose mode the
    /// diagnostic line goes to stdout.
    pub fn run<F: FnOnce()>(&self, task: BoundedTask<F>) -> TaskOutcome {
        self.run_reporting(task, &mut std::io::stdout().lock())
    }

    /// Like [`run`](Self::run), writing the verbose diagnostic line to `out`
    ///
    /// A failed write is logged and never changes the outcome.
    pub fn run_reporting<F: FnOnce(), W: Write>(
        &self,
        mut task: BoundedTask<F>,
        out: &mut W,
    ) -> TaskOutcome {
        let deadline = task.deadline().unwrap_or(self.config.default_deadline);
        let verbose = task.verbose().unwrap_or(self.config.verbose);

        let span = RunSpan::new("sandbox", 1);
        let _entered = span.enter();

        let outcome = match task.take_action() {
            None => TaskOutcome::SystemError(ExecutorError::Config("no task to run".into())),
            Some(action) => {
                self.stats.inc_tasks();
                self.supervise(action, deadline)
            }
        };

        match &outcome {
            TaskOutcome::TimedOut { .. } => self.stats.inc_timeouts(),
            TaskOutcome::KilledBySignal { .. } => self.stats.inc_signal_deaths(),
            TaskOutcome::SystemError(e) => warn!(error = %e, "Sandbox failed"),
            _ => {}
        }

        span.record_result(outcome.kind());
        info!(outcome = outcome.kind(), ?deadline, "Task finished");
        if verbose {
            if let Err(e) = writeln!(out, "{}", outcome.describe()).and_then(|_| out.flush()) {
                warn!(error = %e, "Could not write verbose report");
            }
        }
        outcome
    }

    fn supervise<F: FnOnce()>(&self, action: F, deadline: Duration) -> TaskOutcome {
        let pid = match spawn_action(action) {
            Ok(pid) => pid,
            Err(e) => return TaskOutcome::SystemError(e.into()),
        };
        let mut child = ChildGuard::new(pid, "task");

        if deadline.is_zero() {
            return settle(child.reap());
        }

        bounded_wait(&mut child, deadline)
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn bounded_wait(child: &mut ChildGuard, deadline: Duration) -> TaskOutcome {
    use super::watchdog::Watchdog;
    use crate::process::wait::wait_exited;

    let mut watchdog = match Watchdog::arm(child.pid(), deadline) {
        Ok(watchdog) => watchdog,
        Err(e) => {
            let _ = kill(child.pid(), Signal::SIGKILL);
            let _ = child.reap();
            return TaskOutcome::SystemError(e);
        }
    };

    let exited = wait_exited(child.pid());
    let fired = watchdog.disarm();

    if let Err(e) = exited {
        // Unbounded from here on; make sure the guard's reap cannot hang
        let _ = kill(child.pid(), Signal::SIGKILL);
        return TaskOutcome::SystemError(e.into());
    }

    let reaped = child.reap();
    if fired {
        return match reaped {
            Ok(_) => TaskOutcome::TimedOut { deadline },
            Err(e) => TaskOutcome::SystemError(e.into()),
        };
    }
    settle(reaped)
}

/// Polling fallback where the exit cannot be observed without reaping
#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn bounded_wait(child: &mut ChildGuard, deadline: Duration) -> TaskOutcome {
    use crate::core::limits::WAIT_POLL_INTERVAL;
    use crate::process::wait::try_reap;
    use std::time::Instant;

    let until = Instant::now() + deadline;
    loop {
        match try_reap(child.pid()) {
            Ok(Some(termination)) => return TaskOutcome::from_termination(termination),
            Ok(None) => {}
            Err(e) => return TaskOutcome::SystemError(e.into()),
        }
        let now = Instant::now();
        if now >= until {
            break;
        }
        std::thread::sleep(WAIT_POLL_INTERVAL.min(until - now));
    }

    let _ = kill(child.pid(), Signal::SIGKILL);
    match child.reap() {
        Ok(_) => TaskOutcome::TimedOut { deadline },
        Err(e) => TaskOutcome::SystemError(e.into()),
    }
}

fn settle(reaped: ProcessResult<Termination>) -> TaskOutcome {
    match reaped {
        Ok(termination) => TaskOutcome::from_termination(termination),
        Err(e) => TaskOutcome::SystemError(e.into()),
    }
}

/// Run `action` in a child with `deadline` (zero = unbounded)
///
/// An absent action yields `SystemError`.
pub fn sandbox<F: FnOnce()>(action: Option<F>, deadline: Duration, verbose: bool) -> TaskOutcome {
    let task = BoundedTask::from_option(action)
        .with_deadline(deadline)
        .with_verbose(verbose);
    BoundedExecutor::default().run(task)
}
