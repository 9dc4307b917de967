/*!
 * Sandbox Types
 * Bounded tasks, their classified outcomes and executor defaults
 */

use crate::core::errors::ExecutorError;
use crate::core::serde::{duration_secs, is_false, signal_name};
use crate::process::types::{describe_signal, Termination};
use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A unit of work to run in an isolated child process
///
/// Unset `deadline`/`verbose` fall back to the executor's `SandboxConfig`.
/// A deadline of zero means unbounded.
pub struct BoundedTask<F> {
    action: Option<F>,
    deadline: Option<Duration>,
    verbose: Option<bool>,
}

impl<F: FnOnce()> BoundedTask<F> {
    pub fn new(action: F) -> Self {
        Self::from_option(Some(action))
    }

    /// Task whose action may be absent; running an absent task is a
    /// `SystemError`, not a no-op
    pub fn from_option(action: Option<F>) -> Self {
        Self {
            action,
            deadline: None,
            verbose: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn verbose(&self) -> Option<bool> {
        self.verbose
    }

    pub fn is_absent(&self) -> bool {
        self.action.is_none()
    }

    pub(crate) fn take_action(&mut self) -> Option<F> {
        self.action.take()
    }
}

impl<F> fmt::Debug for BoundedTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedTask")
            .field("action", &self.action.as_ref().map(|_| "<fn>"))
            .field("deadline", &self.deadline)
            .field("verbose", &self.verbose)
            .finish()
    }
}

/// How a bounded task ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum TaskOutcome {
    Success,
    ApplicationFailure(i32),
    KilledBySignal {
        #[serde(with = "signal_name")]
        signal: Signal,
    },
    TimedOut {
        #[serde(with = "duration_secs")]
        deadline: Duration,
    },
    SystemError(ExecutorError),
}

impl TaskOutcome {
    pub(crate) fn from_termination(termination: Termination) -> Self {
        match termination {
            Termination::Exited { code: 0 } => Self::Success,
            Termination::Exited { code } => Self::ApplicationFailure(code),
            Termination::Signaled { signal } => Self::KilledBySignal { signal },
        }
    }

    #[inline]
    pub fn success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Short machine-readable class name
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::ApplicationFailure(_) => "application_failure",
            Self::KilledBySignal { .. } => "killed_by_signal",
            Self::TimedOut { .. } => "timed_out",
            Self::SystemError(_) => "system_error",
        }
    }

    /// Tri-state verdict: 1 good, 0 bad, -1 the sandbox itself failed
    pub fn verdict(&self) -> i32 {
        match self {
            Self::Success => 1,
            Self::SystemError(_) => -1,
            _ => 0,
        }
    }

    /// Human-readable diagnostic line printed in verbose mode
    pub fn describe(&self) -> String {
        match self {
            Self::Success => "Nice function!".to_string(),
            Self::ApplicationFailure(code) => format!("Bad function: exited with code {}", code),
            Self::KilledBySignal { signal } => {
                format!("Bad function: {}", describe_signal(*signal))
            }
            Self::TimedOut { deadline } => {
                format!("Bad function: timed out after {} seconds", format_secs(*deadline))
            }
            Self::SystemError(e) => format!("Sandbox error: {}", e),
        }
    }

    /// Convert into a `Result`, mapping every non-success outcome to an error
    pub fn into_result(self) -> Result<(), ExecutorError> {
        match self {
            Self::Success => Ok(()),
            Self::TimedOut { deadline } => Err(ExecutorError::Timeout { deadline }),
            Self::SystemError(e) => Err(e),
            other => Err(ExecutorError::StageFailed {
                index: 0,
                program: "task".to_string(),
                detail: other.describe(),
            }),
        }
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

fn format_secs(duration: Duration) -> String {
    if duration.subsec_nanos() == 0 {
        duration.as_secs().to_string()
    } else {
        format!("{:.3}", duration.as_secs_f64())
    }
}

/// Defaults applied to tasks that leave them unset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SandboxConfig {
    /// Zero means unbounded
    #[serde(with = "duration_secs", default)]
    pub default_deadline: Duration,
    #[serde(skip_serializing_if = "is_false", default)]
    pub verbose: bool,
}

impl SandboxConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.default_deadline = deadline;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
