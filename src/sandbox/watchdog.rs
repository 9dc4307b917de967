/*!
 * Deadline Watchdog
 *
 * A parent-side timer thread that SIGKILLs a child once its deadline passes.
 * The kill happens only while the watchdog is armed and under its state
 * lock, and the owner disarms it before reaping the child, so the signal
 * can never reach a reaped (and possibly recycled) pid.
 */

use crate::core::errors::{ExecutorError, ExecutorResult};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchState {
    Armed,
    Disarmed,
    Fired,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<WatchState>,
    cond: Condvar,
}

/// Armed deadline for one child
#[derive(Debug)]
pub struct Watchdog {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Start a timer that kills `pid` after `deadline`
    ///
    /// The caller must keep `pid` unreaped until `disarm` returns.
    pub fn arm(pid: Pid, deadline: Duration) -> ExecutorResult<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(WatchState::Armed),
            cond: Condvar::new(),
        });
        let until = Instant::now() + deadline;

        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name(format!("watchdog-{}", pid))
            .spawn(move || watch(thread_shared, pid, until))
            .map_err(|e| ExecutorError::Resource(format!("watchdog thread: {}", e)))?;

        debug!(pid = pid.as_raw(), ?deadline, "Watchdog armed");
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Stop the timer and wait for its thread
    ///
    /// Returns whether the deadline fired first. After this returns the
    /// watchdog will never signal again.
    pub fn disarm(&mut self) -> bool {
        let fired = {
            let mut state = self.shared.state.lock();
            if *state == WatchState::Armed {
                *state = WatchState::Disarmed;
                self.shared.cond.notify_one();
            }
            *state == WatchState::Fired
        };

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Watchdog thread panicked");
            }
        }
        fired
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.disarm();
        }
    }
}

fn watch(shared: Arc<Shared>, pid: Pid, until: Instant) {
    let mut state = shared.state.lock();
    while *state == WatchState::Armed {
        if shared.cond.wait_until(&mut state, until).timed_out() {
            if *state == WatchState::Armed {
                *state = WatchState::Fired;
                // The child is unreaped, so the pid still names it
                match kill(pid, Signal::SIGKILL) {
                    Ok(()) => debug!(pid = pid.as_raw(), "Deadline elapsed, child killed"),
                    Err(errno) => error!(pid = pid.as_raw(), %errno, "Deadline kill failed"),
                }
            }
            break;
        }
    }
}
