/*!
 * Pipeline Cleanup Tests
 * Descriptor and zombie accounting around pipeline runs
 */

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag};
use pipeworks::pipeline::{Pipeline, PipelineExecutor, PipelineIo, StageSpec};
use pipeworks::process::fd::open_fd_count;
use serial_test::serial;
use tempfile::NamedTempFile;

/// No child of this process is left, reaped or not
fn assert_no_children() {
    assert_eq!(waitpid(None, Some(WaitPidFlag::WNOHANG)), Err(Errno::ECHILD));
}

fn pipelines() -> Vec<Pipeline> {
    vec![
        Pipeline::builder()
            .command("echo", ["squalala"])
            .command("cat", Vec::<String>::new())
            .command("sed", ["s/a/b/g"])
            .build(),
        Pipeline::builder()
            .command("echo", ["hi"])
            .command("pipeworks-no-such-program", Vec::<String>::new())
            .build(),
        Pipeline::builder()
            .command("pipeworks-no-such-program", Vec::<String>::new())
            .command("cat", Vec::<String>::new())
            .build(),
        Pipeline::builder()
            .command("yes", Vec::<String>::new())
            .command("head", ["-n", "1"])
            .build(),
        (0..16).map(|_| StageSpec::new("cat")).collect(),
    ]
}

#[test]
#[serial]
fn test_descriptors_return_to_baseline() {
    let Some(baseline) = open_fd_count() else {
        return;
    };
    let executor = PipelineExecutor::default();

    for pipeline in pipelines() {
        let stdin = NamedTempFile::new().unwrap();
        let stdout = NamedTempFile::new().unwrap();
        let before = open_fd_count().unwrap();

        let io = PipelineIo::inherit()
            .with_stdin(stdin.reopen().unwrap())
            .with_stdout(stdout.reopen().unwrap());
        executor.run_with_io(&pipeline, io);

        assert_eq!(open_fd_count().unwrap(), before, "leak after: {}", pipeline);
    }

    assert_eq!(open_fd_count().unwrap(), baseline);
}

#[test]
#[serial]
fn test_no_zombies_after_any_run() {
    let executor = PipelineExecutor::default();
    for pipeline in pipelines() {
        let stdin = NamedTempFile::new().unwrap();
        let stdout = NamedTempFile::new().unwrap();
        let io = PipelineIo::inherit()
            .with_stdin(stdin.reopen().unwrap())
            .with_stdout(stdout.reopen().unwrap());
        executor.run_with_io(&pipeline, io);
        assert_no_children();
    }
}

#[test]
#[serial]
fn test_early_exit_reader_still_terminates() {
    // `head` leaves early; `yes` must see EPIPE/SIGPIPE rather than block forever
    let out = NamedTempFile::new().unwrap();
    let pipeline = Pipeline::builder()
        .command("yes", Vec::<String>::new())
        .command("head", ["-n", "3"])
        .build();

    let result = PipelineExecutor::default()
        .run_with_io(&pipeline, PipelineIo::inherit().with_stdout(out.reopen().unwrap()));

    assert_eq!(result.stages_run(), 2);
    assert!(result.reports[1].outcome.success());
    assert_eq!(std::fs::read_to_string(out.path()).unwrap(), "y\ny\ny\n");
    assert_no_children();
}

#[test]
#[serial]
fn test_invalid_stage_creates_nothing() {
    let before = open_fd_count();
    let pipeline = Pipeline::new(vec![StageSpec::new("echo"), StageSpec::new("bad\0name")]);

    let result = PipelineExecutor::default().run(&pipeline);

    assert!(!result.success());
    assert_eq!(result.stages_run(), 0);
    assert!(matches!(
        result.error,
        Some(pipeworks::ExecutorError::Config(_))
    ));
    assert_eq!(open_fd_count(), before);
    assert_no_children();
}
