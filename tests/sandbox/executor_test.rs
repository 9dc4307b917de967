/*!
 * Bounded Executor Tests
 * Outcome classification, deadline enforcement and reaping
 */

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::Pid;
use pipeworks::sandbox::{sandbox, BoundedExecutor, BoundedTask, TaskOutcome};
use pipeworks::ExecutorError;
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::io::Write;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

fn assert_no_children() {
    assert_eq!(waitpid(None, Some(WaitPidFlag::WNOHANG)), Err(Errno::ECHILD));
}

#[test]
#[serial]
fn test_quick_task_succeeds() {
    let start = Instant::now();
    let outcome = sandbox(Some(|| {}), Duration::from_secs(5), false);

    assert_eq!(outcome, TaskOutcome::Success);
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_no_children();
}

#[test]
#[serial]
fn test_exit_code_is_application_failure() {
    let outcome = sandbox(Some(|| std::process::exit(3)), Duration::from_secs(5), false);
    assert_eq!(outcome, TaskOutcome::ApplicationFailure(3));
    assert_eq!(outcome.verdict(), 0);
}

#[test]
#[serial]
fn test_fault_is_killed_by_signal() {
    let outcome = sandbox(
        Some(|| {
            let ptr: *mut u8 = std::hint::black_box(std::ptr::null_mut());
            // SAFETY: deliberately faults; only the forked child executes this
            unsafe { ptr.write_volatile(1) }
        }),
        Duration::from_secs(5),
        false,
    );

    assert_eq!(
        outcome,
        TaskOutcome::KilledBySignal {
            signal: Signal::SIGSEGV
        }
    );
    assert_eq!(outcome.describe(), "Bad function: Segmentation fault");
    assert_no_children();
}

#[test]
#[serial]
fn test_verbose_line_goes_to_writer() {
    let executor = BoundedExecutor::default();
    let mut out = Vec::new();
    let outcome = executor.run_reporting(
        BoundedTask::new(|| {})
            .with_deadline(Duration::from_secs(5))
            .with_verbose(true),
        &mut out,
    );

    assert_eq!(outcome, TaskOutcome::Success);
    assert_eq!(String::from_utf8(out).unwrap(), "Nice function!\n");
}

#[test]
#[serial]
fn test_quiet_run_writes_nothing() {
    let executor = BoundedExecutor::default();
    let mut out = Vec::new();
    let outcome = executor.run_reporting(
        BoundedTask::new(|| std::process::exit(4))
            .with_deadline(Duration::from_secs(5))
            .with_verbose(false),
        &mut out,
    );

    assert_eq!(outcome, TaskOutcome::ApplicationFailure(4));
    assert!(out.is_empty());
}

#[test]
#[serial]
fn test_verbose_timeout_line() {
    let executor = BoundedExecutor::default();
    let mut out = Vec::new();
    executor.run_reporting(
        BoundedTask::new(|| loop {
            std::thread::sleep(Duration::from_millis(20));
        })
        .with_deadline(Duration::from_millis(300))
        .with_verbose(true),
        &mut out,
    );

    assert_eq!(
        String::from_utf8(out).unwrap(),
        "Bad function: timed out after 0.300 seconds\n"
    );
}

#[test]
#[serial]
fn test_endless_task_times_out_and_dies() {
    let pid_file = NamedTempFile::new().unwrap();
    let mut writer = pid_file.reopen().unwrap();

    let start = Instant::now();
    let outcome = sandbox(
        Some(move || {
            write!(writer, "{}", std::process::id()).unwrap();
            writer.flush().unwrap();
            loop {
                std::hint::spin_loop();
            }
        }),
        Duration::from_secs(2),
        true,
    );
    let elapsed = start.elapsed();

    assert_eq!(
        outcome,
        TaskOutcome::TimedOut {
            deadline: Duration::from_secs(2)
        }
    );
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(4), "took {:?}", elapsed);

    let pid: i32 = std::fs::read_to_string(pid_file.path())
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(kill(Pid::from_raw(pid), None), Err(Errno::ESRCH));
    assert_no_children();
}

#[test]
#[serial]
fn test_zero_deadline_is_unbounded() {
    let outcome = sandbox(
        Some(|| std::thread::sleep(Duration::from_millis(300))),
        Duration::ZERO,
        false,
    );
    assert_eq!(outcome, TaskOutcome::Success);
}

#[test]
fn test_absent_task() {
    let outcome = sandbox(None::<fn()>, Duration::from_secs(1), false);
    assert!(matches!(
        outcome,
        TaskOutcome::SystemError(ExecutorError::Config(_))
    ));
    assert_eq!(outcome.verdict(), -1);
}

#[test]
#[serial]
fn test_panic_is_contained() {
    let outcome = sandbox(Some(|| panic!("task blew up")), Duration::from_secs(5), false);
    assert_eq!(outcome, TaskOutcome::ApplicationFailure(101));
}

#[test]
#[serial]
fn test_deadline_race_never_double_reaps() {
    // Child exit and deadline land close together; either outcome is valid
    for _ in 0..20 {
        let outcome = sandbox(
            Some(|| std::thread::sleep(Duration::from_millis(10))),
            Duration::from_millis(10),
            false,
        );
        assert!(
            matches!(outcome, TaskOutcome::Success | TaskOutcome::TimedOut { .. }),
            "unexpected {:?}",
            outcome
        );
        assert_no_children();
    }
}

#[test]
#[serial]
fn test_repeat_runs_agree() {
    let executor = BoundedExecutor::default();
    let run = || {
        executor.run(
            BoundedTask::new(|| std::process::exit(2)).with_deadline(Duration::from_secs(5)),
        )
    };

    assert_eq!(run(), run());
    assert_eq!(executor.stats().snapshot().tasks_run, 2);
}

#[test]
#[serial]
fn test_side_effects_stay_in_child() {
    let mut counter = 0;
    let outcome = sandbox(Some(|| counter += 1), Duration::from_secs(5), false);

    assert_eq!(outcome, TaskOutcome::Success);
    assert_eq!(counter, 0);
}
