/*!
 * Pipeline Executor Tests
 * End-to-end runs of real programs wired through pipes
 */

use pipeworks::pipeline::{
    ExecFailureMode, Pipeline, PipelineConfig, PipelineExecutor, PipelineIo, StageOutcome,
    StageSpec,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

/// Run `pipeline` with stdout captured into a temp file
fn run_captured(executor: &PipelineExecutor, pipeline: &Pipeline) -> (pipeworks::PipelineResult, String) {
    let out = NamedTempFile::new().unwrap();
    let io = PipelineIo::inherit().with_stdout(out.reopen().unwrap());
    let result = executor.run_with_io(pipeline, io);
    let text = std::fs::read_to_string(out.path()).unwrap();
    (result, text)
}

#[test]
#[serial]
fn test_echo_cat_sed() {
    let pipeline = Pipeline::builder()
        .command("echo", ["squalala"])
        .command("cat", Vec::<String>::new())
        .command("sed", ["s/a/b/g"])
        .build();

    let (result, output) = run_captured(&PipelineExecutor::default(), &pipeline);

    assert!(result.success());
    assert_eq!(result.exit_code(), 0);
    assert_eq!(result.stages_run(), 3);
    assert_eq!(output, "squblblb\n");
}

#[test]
#[serial]
fn test_single_stage() {
    let pipeline = Pipeline::new(vec![StageSpec::new("echo").arg("alone")]);
    let (result, output) = run_captured(&PipelineExecutor::default(), &pipeline);

    assert!(result.success());
    assert_eq!(output, "alone\n");
}

#[test]
#[serial]
fn test_failing_middle_stage_does_not_short_circuit() {
    let pipeline = Pipeline::builder()
        .command("echo", ["abc"])
        .command("false", Vec::<String>::new())
        .command("echo", ["downstream"])
        .build();

    let (result, output) = run_captured(&PipelineExecutor::default(), &pipeline);

    assert!(!result.success());
    assert_eq!(result.exit_code(), 1);
    assert_eq!(result.stages_run(), 3);
    assert_eq!(result.reports[1].outcome, StageOutcome::ExitedWithCode(1));
    assert_eq!(result.reports[2].outcome, StageOutcome::ExitedWithCode(0));
    assert_eq!(output, "downstream\n");
}

#[test]
#[serial]
fn test_missing_program_returns_failure() {
    let pipeline = Pipeline::builder()
        .command("echo", ["hello"])
        .command("pipeworks-no-such-program", Vec::<String>::new())
        .build();

    let result = PipelineExecutor::default().run(&pipeline);

    assert!(!result.success());
    assert_eq!(result.stages_run(), 2);
    // Legacy mapping: indistinguishable from a program exiting 1
    assert_eq!(result.reports[1].outcome, StageOutcome::ExitedWithCode(1));
    assert_eq!(result.first_failure().map(|r| r.index), Some(1));
}

#[test]
#[serial]
fn test_distinct_exec_failure_mode() {
    let executor = PipelineExecutor::new(
        PipelineConfig::new().with_exec_failure(ExecFailureMode::Distinct),
    );
    let pipeline = Pipeline::builder()
        .command("true", Vec::<String>::new())
        .command("pipeworks-no-such-program", Vec::<String>::new())
        .build();

    let result = executor.run(&pipeline);

    assert!(matches!(
        result.reports[1].outcome,
        StageOutcome::ExecFailed { .. }
    ));
    assert!(matches!(
        result.into_result(),
        Err(pipeworks::ExecutorError::Exec { .. })
    ));
}

#[test]
#[serial]
fn test_custom_exec_failure_code() {
    let executor = PipelineExecutor::new(PipelineConfig::new().with_exec_failure_code(127));
    let pipeline = Pipeline::new(vec![StageSpec::new("pipeworks-no-such-program")]);

    let result = executor.run(&pipeline);
    assert_eq!(result.reports[0].outcome, StageOutcome::ExitedWithCode(127));
}

#[test]
#[serial]
fn test_unusable_exec_failure_code_never_reads_as_success() {
    let pipeline = Pipeline::new(vec![StageSpec::new("pipeworks-no-such-program")]);

    for code in [0, 256] {
        let executor = PipelineExecutor::new(PipelineConfig::new().with_exec_failure_code(code));
        let result = executor.run(&pipeline);

        assert!(!result.success(), "code {} read as success", code);
        assert_eq!(result.stages_run(), 0);
        assert!(matches!(
            result.into_result(),
            Err(pipeworks::ExecutorError::Config(_))
        ));
    }
}

#[test]
#[serial]
fn test_stdin_override_feeds_first_stage() {
    let mut input = NamedTempFile::new().unwrap();
    input.write_all(b"one\ntwo\nthree\n").unwrap();

    let out = NamedTempFile::new().unwrap();
    let io = PipelineIo::inherit()
        .with_stdin(std::fs::File::open(input.path()).unwrap())
        .with_stdout(out.reopen().unwrap());
    let pipeline = Pipeline::builder()
        .command("grep", ["t"])
        .command("sort", Vec::<String>::new())
        .build();

    let result = PipelineExecutor::default().run_with_io(&pipeline, io);

    assert!(result.success());
    assert_eq!(std::fs::read_to_string(out.path()).unwrap(), "three\ntwo\n");
}

#[test]
#[serial]
fn test_large_stream_backpressure() {
    // Far beyond a pipe buffer, so every stage blocks on its neighbours
    let pipeline = Pipeline::builder()
        .command("head", ["-c", "4194304", "/dev/zero"])
        .command("cat", Vec::<String>::new())
        .command("cat", Vec::<String>::new())
        .command("wc", ["-c"])
        .build();

    let (result, output) = run_captured(&PipelineExecutor::default(), &pipeline);

    assert!(result.success());
    assert_eq!(output.trim(), "4194304");
}

#[test]
#[serial]
fn test_repeat_runs_agree() {
    let pipeline = Pipeline::builder()
        .command("echo", ["x"])
        .command("grep", ["y"])
        .build();
    let executor = PipelineExecutor::default();

    let first = executor.run(&pipeline);
    let second = executor.run(&pipeline);

    let outcomes = |r: &pipeworks::PipelineResult| {
        r.reports.iter().map(|s| s.outcome).collect::<Vec<_>>()
    };
    assert_eq!(outcomes(&first), outcomes(&second));
    assert_eq!(first.success(), second.success());
    assert!(!first.success());
}

#[test]
#[serial]
fn test_chain_of_cats_is_identity() {
    let mut runner = TestRunner::new(Config::with_cases(8));
    let strategy = (1usize..10, proptest::collection::vec(any::<u8>(), 0..8192));

    runner
        .run(&strategy, |(n, bytes)| {
            let mut input = NamedTempFile::new().unwrap();
            input.write_all(&bytes).unwrap();
            let out = NamedTempFile::new().unwrap();

            let pipeline: Pipeline = (0..n).map(|_| StageSpec::new("cat")).collect();
            let io = PipelineIo::inherit()
                .with_stdin(std::fs::File::open(input.path()).unwrap())
                .with_stdout(out.reopen().unwrap());
            let result = PipelineExecutor::default().run_with_io(&pipeline, io);

            prop_assert!(result.success());
            prop_assert_eq!(result.stages_run(), n);
            prop_assert_eq!(std::fs::read(out.path()).unwrap(), bytes);
            Ok(())
        })
        .unwrap();
}
