/*!
 * System Limits and Constants
 *
 * Centralized location for exit statuses, descriptor numbers and timing
 * constants shared by the pipeline and sandbox executors.
 */

use std::time::Duration;

// =============================================================================
// EXIT STATUSES
// =============================================================================

/// Status a stage exits with when its program cannot be executed
/// Indistinguishable from a program that ran and exited 1 unless
/// `ExecFailureMode::Distinct` is selected
pub const DEFAULT_EXEC_FAILURE_CODE: i32 = 1;

/// Usable exec-failure statuses
/// Zero would read as success and `_exit` keeps only the low eight bits
pub const EXEC_FAILURE_CODES: std::ops::RangeInclusive<i32> = 1..=255;

/// Status a sandboxed task exits with after it panicked
/// Matches the status of a Rust process that panics on its main thread
pub const TASK_PANIC_EXIT_CODE: i32 = 101;

/// Status the sandbox child exits with when the task returns normally
pub const TASK_SUCCESS_EXIT_CODE: i32 = 0;

// =============================================================================
// DESCRIPTORS
// =============================================================================

/// Lowest descriptor number a pipe end may occupy
/// Keeps pipe ends clear of stdin/stdout/stderr so redirection never
/// clobbers a descriptor that is still needed
pub const MIN_PIPE_FD: i32 = 3;

/// Size of the errno report an exec-failing stage writes to its status pipe
pub const EXEC_STATUS_REPORT_LEN: usize = std::mem::size_of::<i32>();

// =============================================================================
// TIMING
// =============================================================================

/// Poll interval for the deadline wait on platforms without `waitid`
pub const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(5);

// =============================================================================
// CLI EXIT CODES
// =============================================================================

/// Exit code of `pipeworks run` when the deadline elapsed
/// [LINUX-COMPAT] Same as coreutils timeout(1)
pub const CLI_TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code of `pipeworks run` when the executor itself failed
/// [LINUX-COMPAT] Same as coreutils timeout(1)
pub const CLI_SYSTEM_ERROR_EXIT_CODE: i32 = 125;

/// Exit code of `pipeworks run` when the program could not be executed
pub const CLI_EXEC_FAILURE_EXIT_CODE: i32 = 127;

/// Base added to a signal number to form a shell-style exit code
pub const CLI_SIGNAL_EXIT_BASE: i32 = 128;
