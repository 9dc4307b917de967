/*!
 * Pipeline Types
 * Stage specifications, per-stage outcomes and the aggregate result
 */

use crate::core::errors::{ExecutorError, ExecutorResult};
use crate::core::limits::{DEFAULT_EXEC_FAILURE_CODE, EXEC_FAILURE_CODES};
use crate::core::serde::{is_none, signal_name};
use crate::process::types::{describe_signal, OsPid, ProcessResult, Termination};
use crate::process::ExecCommand;
use nix::errno::Errno;
use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::os::fd::OwnedFd;

/// One external program in a pipeline
///
/// `argv` includes the program name as argument zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StageSpec {
    program: String,
    argv: Vec<String>,
}

impl StageSpec {
    /// Stage running `program` with argument zero set to the program name
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        Self {
            argv: vec![program.clone()],
            program,
        }
    }

    /// Stage with an explicit argument vector
    pub fn with_argv(program: impl Into<String>, argv: Vec<String>) -> Self {
        Self {
            program: program.into(),
            argv,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.argv.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub(crate) fn to_command(&self) -> ProcessResult<ExecCommand> {
        ExecCommand::new(&self.program, &self.argv)
    }
}

impl fmt::Display for StageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv.join(" "))
    }
}

/// Ordered sequence of stages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    stages: Vec<StageSpec>,
}

impl Pipeline {
    pub fn new(stages: Vec<StageSpec>) -> Self {
        Self { stages }
    }

    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl FromIterator<StageSpec> for Pipeline {
    fn from_iter<I: IntoIterator<Item = StageSpec>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.stages.iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join(" | "))
    }
}

/// Fluent builder for pipelines
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    stages: Vec<StageSpec>,
}

impl PipelineBuilder {
    pub fn stage(mut self, stage: StageSpec) -> Self {
        self.stages.push(stage);
        self
    }

    /// Append `program` with the given arguments (argument zero added)
    pub fn command<I, S>(self, program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stage(StageSpec::new(program).args(args))
    }

    pub fn build(self) -> Pipeline {
        Pipeline::new(self.stages)
    }
}

/// How a stage whose program could not be executed is reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecFailureMode {
    /// Report as `ExitedWithCode(exec_failure_code)`, indistinguishable from
    /// a program that ran and exited with that status
    #[default]
    Legacy,
    /// Report as `ExecFailed { errno }`
    Distinct,
}

/// Configuration for pipeline execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    pub exec_failure: ExecFailureMode,
    pub exec_failure_code: i32,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self {
            exec_failure: ExecFailureMode::Legacy,
            exec_failure_code: DEFAULT_EXEC_FAILURE_CODE,
        }
    }

    pub fn with_exec_failure(mut self, mode: ExecFailureMode) -> Self {
        self.exec_failure = mode;
        self
    }

    /// Status reported for an unexecutable program; checked by [`validate`](Self::validate)
    pub fn with_exec_failure_code(mut self, code: i32) -> Self {
        self.exec_failure_code = code;
        self
    }

    /// Reject an exec-failure code that a child could not exit with distinctly
    pub fn validate(&self) -> ExecutorResult<()> {
        if !EXEC_FAILURE_CODES.contains(&self.exec_failure_code) {
            return Err(ExecutorError::Config(format!(
                "exec failure code {} outside {}..={}",
                self.exec_failure_code,
                EXEC_FAILURE_CODES.start(),
                EXEC_FAILURE_CODES.end()
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Optional replacements for the pipeline's outer endpoints
///
/// `stdin` feeds the first stage, `stdout` receives the last stage's output.
/// Unset endpoints are inherited from the caller. The executor takes
/// ownership and closes its copies once the owning stage is spawned.
#[derive(Debug, Default)]
pub struct PipelineIo {
    pub stdin: Option<OwnedFd>,
    pub stdout: Option<OwnedFd>,
}

impl PipelineIo {
    /// Inherit both endpoints from the caller
    pub fn inherit() -> Self {
        Self::default()
    }

    pub fn with_stdin(mut self, fd: impl Into<OwnedFd>) -> Self {
        self.stdin = Some(fd.into());
        self
    }

    pub fn with_stdout(mut self, fd: impl Into<OwnedFd>) -> Self {
        self.stdout = Some(fd.into());
        self
    }
}

/// Per-stage result, derived after reaping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum StageOutcome {
    ExitedWithCode(i32),
    KilledBySignal {
        #[serde(with = "signal_name")]
        signal: Signal,
    },
    /// Only produced under `ExecFailureMode::Distinct`
    ExecFailed { errno: i32 },
}

impl StageOutcome {
    #[inline]
    pub fn success(&self) -> bool {
        matches!(self, Self::ExitedWithCode(0))
    }

    pub(crate) fn from_termination(termination: Termination) -> Self {
        match termination {
            Termination::Exited { code } => Self::ExitedWithCode(code),
            Termination::Signaled { signal } => Self::KilledBySignal { signal },
        }
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExitedWithCode(code) => write!(f, "exited with code {}", code),
            Self::KilledBySignal { signal } => {
                write!(f, "killed by {} ({})", signal, describe_signal(*signal))
            }
            Self::ExecFailed { errno } => {
                write!(f, "could not execute: {}", Errno::from_raw(*errno).desc())
            }
        }
    }
}

/// Outcome of one spawned stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StageReport {
    pub index: usize,
    pub program: String,
    pub pid: OsPid,
    pub outcome: StageOutcome,
}

/// Aggregate result of a pipeline run
///
/// Success iff no setup or wait error occurred and every requested stage
/// was spawned and exited with status 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineResult {
    pub stages_requested: usize,
    pub reports: Vec<StageReport>,
    #[serde(skip_serializing_if = "is_none", default)]
    pub error: Option<ExecutorError>,
}

impl PipelineResult {
    /// Result of running zero stages
    pub fn empty() -> Self {
        Self {
            stages_requested: 0,
            reports: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn not_started(stages_requested: usize, error: ExecutorError) -> Self {
        Self {
            stages_requested,
            reports: Vec::new(),
            error: Some(error),
        }
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
            && self.reports.len() == self.stages_requested
            && self.reports.iter().all(|r| r.outcome.success())
    }

    /// Shell-style aggregate status: 0 on success, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.success() {
            0
        } else {
            1
        }
    }

    /// Number of stages that were actually spawned
    pub fn stages_run(&self) -> usize {
        self.reports.len()
    }

    /// First stage (in pipeline order) that did not succeed
    pub fn first_failure(&self) -> Option<&StageReport> {
        self.reports.iter().find(|r| !r.outcome.success())
    }

    /// Convert into a `Result`, naming the first thing that went wrong
    pub fn into_result(mut self) -> ExecutorResult<()> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        match self.first_failure() {
            None if self.reports.len() == self.stages_requested => Ok(()),
            None => Err(ExecutorError::Resource(format!(
                "only {} of {} stages were spawned",
                self.reports.len(),
                self.stages_requested
            ))),
            Some(report) => Err(match report.outcome {
                StageOutcome::ExecFailed { errno } => ExecutorError::Exec {
                    program: report.program.clone(),
                    reason: Errno::from_raw(errno).desc().to_string(),
                },
                outcome => ExecutorError::StageFailed {
                    index: report.index,
                    program: report.program.clone(),
                    detail: outcome.to_string(),
                },
            }),
        }
    }
}
