/*!
 * Pipeline Executor
 * Spawns N stages joined by pipes, waits for all of them, aggregates
 *
 * Descriptor discipline:
 * - The parent holds at most one previous read end and one current link
 * - Each child keeps only the ends moved onto its stdin/stdout
 * - Every parent copy is an `OwnedFd`, closed exactly once when dropped
 */

use super::link::PipeLink;
use super::types::{
    ExecFailureMode, Pipeline, PipelineConfig, PipelineIo, PipelineResult, StageOutcome,
    StageReport,
};
use crate::core::errors::ExecutorError;
use crate::core::guard::ChildGuard;
use crate::monitoring::{AtomicExecutorStats, RunSpan};
use crate::process::fd::lift;
use crate::process::spawn::{spawn_program, ExecCommand, StdioPlan};
use crate::process::types::ProcessError;
use nix::errno::Errno;
use std::os::fd::{AsRawFd, OwnedFd};
use std::sync::Arc;
use tracing::{info, warn};

/// A spawned stage awaiting its reap
struct RunningStage {
    index: usize,
    program: String,
    guard: ChildGuard,
    exec_errno: Option<Errno>,
}

/// Runs pipelines with shell pipe semantics
///
/// # Example
///
/// ```ignore
/// let pipeline = Pipeline::builder()
///     .command("echo", ["squalala"])
///     .command("sed", ["s/a/b/g"])
///     .build();
/// let result = PipelineExecutor::default().run(&pipeline);
/// assert!(result.success());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PipelineExecutor {
    config: PipelineConfig,
    stats: Arc<AtomicExecutorStats>,
}

impl PipelineExecutor {
    pub fn new(config: PipelineConfig) -> Self {
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

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> &Arc<AtomicExecutorStats> {
        &self.stats
    }

    /// Run with stdin and stdout inherited from the caller
    pub fn run(&self, pipeline: &Pipeline) -> PipelineResult {
        self.run_with_io(pipeline, PipelineIo::inherit())
    }

    /// Run with optional caller-supplied outer endpoints
    ///
    /// Never fails outright: setup errors end stage creation, every stage
    /// already spawned is still reaped, and the error is carried in the
    /// returned result.
    pub fn run_with_io(&self, pipeline: &Pipeline, io: PipelineIo) -> PipelineResult {
        let n = pipeline.len();
        if n == 0 {
            return PipelineResult::empty();
        }

        let span = RunSpan::new("pipeline", n);
        let _entered = span.enter();
        self.stats.inc_pipelines();

        if let Err(e) = self.config.validate() {
            warn!(error = %e, "Rejected pipeline configuration");
            self.stats.inc_setup_failures();
            span.record_result("config_error");
            return PipelineResult::not_started(n, e);
        }

        let commands = match pipeline
            .stages()
            .iter()
            .map(|stage| stage.to_command())
            .collect::<Result<Vec<ExecCommand>, ProcessError>>()
        {
            Ok(commands) => commands,
            Err(e) => {
                warn!(error = %e, "Rejected pipeline before spawning");
                self.stats.inc_setup_failures();
                span.record_result("config_error");
                return PipelineResult::not_started(n, e.into());
            }
        };

        let (first_stdin, final_stdout) = match lift_io(io) {
            Ok(ends) => ends,
            Err(errno) => {
                warn!(%errno, "Could not take over pipeline endpoints");
                self.stats.inc_setup_failures();
                span.record_result("resource_error");
                return PipelineResult::not_started(n, ProcessError::Pipe(errno).into());
            }
        };

        // Declared before the descriptors so the fds close before any guard reaps on drop
        let mut running: Vec<RunningStage> = Vec::with_capacity(n);
        let mut prev_read: Option<OwnedFd> = first_stdin;
        let mut final_stdout = final_stdout;
        let mut setup_error: Option<ExecutorError> = None;

        for (index, command) in commands.iter().enumerate() {
            let last = index + 1 == n;

            let link = if last {
                None
            } else {
                match PipeLink::open() {
                    Ok(link) => Some(link),
                    Err(e) => {
                        warn!(stage = index, error = %e, "Pipe creation failed");
                        setup_error = Some(e.into());
                        break;
                    }
                }
            };

            let mut plan = StdioPlan {
                stdin: prev_read.as_ref().map(|fd| fd.as_raw_fd()),
                stdout: match &link {
                    Some(link) => Some(link.write_fd()),
                    None => final_stdout.as_ref().map(|fd| fd.as_raw_fd()),
                },
                close: Vec::new(),
            };
            if let Some(link) = &link {
                plan.close.push(link.read_fd());
                if let Some(fd) = &final_stdout {
                    plan.close.push(fd.as_raw_fd());
                }
            }

            let spawned =
                match spawn_program(command, &plan, self.config.exec_failure_code) {
                    Ok(spawned) => spawned,
                    Err(e) => {
                        warn!(stage = index, error = %e, "Stage spawn failed");
                        setup_error = Some(e.into());
                        break;
                    }
                };

            self.stats.inc_stages_spawned();
            let program = pipeline.stages()[index].program().to_string();
            running.push(RunningStage {
                index,
                guard: ChildGuard::new(spawned.pid, program.clone()),
                program,
                exec_errno: spawned.exec_errno,
            });

            // The child has its duplicates; the parent keeps only the next read end
            prev_read = link.map(PipeLink::into_read_end);
            if last {
                final_stdout = None;
            }
        }

        drop(prev_read);
        drop(final_stdout);

        if setup_error.is_some() {
            self.stats.inc_setup_failures();
        }

        let mut error = setup_error;
        let mut reports = Vec::with_capacity(running.len());
        for mut stage in running {
            match stage.guard.reap() {
                Ok(termination) => {
                    let outcome = self.classify(&stage, StageOutcome::from_termination(termination));
                    if matches!(outcome, StageOutcome::KilledBySignal { .. }) {
                        self.stats.inc_signal_deaths();
                    }
                    reports.push(StageReport {
                        index: stage.index,
                        program: stage.program,
                        pid: stage.guard.pid().as_raw(),
                        outcome,
                    });
                }
                Err(e) => {
                    if error.is_none() {
                        error = Some(e.into());
                    }
                }
            }
        }

        let result = PipelineResult {
            stages_requested: n,
            reports,
            error,
        };

        span.record_result(if result.success() { "success" } else { "failure" });
        info!(
            stages = n,
            spawned = result.stages_run(),
            success = result.success(),
            "Pipeline finished"
        );
        result
    }

    fn classify(&self, stage: &RunningStage, outcome: StageOutcome) -> StageOutcome {
        let Some(errno) = stage.exec_errno else {
            return outcome;
        };

        warn!(
            stage = stage.index,
            program = %stage.program,
            %errno,
            "Stage could not execute its program"
        );
        self.stats.inc_exec_failures();

        match self.config.exec_failure {
            ExecFailureMode::Legacy => outcome,
            ExecFailureMode::Distinct => StageOutcome::ExecFailed {
                errno: errno as i32,
            },
        }
    }
}

/// Move caller endpoints above stdio so redirection cannot clobber them
fn lift_io(io: PipelineIo) -> Result<(Option<OwnedFd>, Option<OwnedFd>), Errno> {
    let stdin = io.stdin.map(lift).transpose()?;
    let stdout = io.stdout.map(lift).transpose()?;
    Ok((stdin, stdout))
}
