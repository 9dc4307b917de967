/*!
 * Harness Configuration
 * Executor defaults loaded from `PIPEWORKS_*` environment variables
 */

use crate::core::errors::{ExecutorError, ExecutorResult};
use crate::core::serde::is_false;
use crate::pipeline::{ExecFailureMode, PipelineConfig};
use crate::sandbox::SandboxConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_EXEC_FAILURE: &str = "PIPEWORKS_EXEC_FAILURE";
pub const ENV_EXEC_FAILURE_CODE: &str = "PIPEWORKS_EXEC_FAILURE_CODE";
pub const ENV_DEADLINE_SECS: &str = "PIPEWORKS_DEADLINE_SECS";
pub const ENV_VERBOSE: &str = "PIPEWORKS_VERBOSE";
pub const ENV_TRACE_JSON: &str = "PIPEWORKS_TRACE_JSON";

/// Configuration for both executors and the log output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HarnessConfig {
    pub pipeline: PipelineConfig,
    pub sandbox: SandboxConfig,
    #[serde(skip_serializing_if = "is_false", default)]
    pub trace_json: bool,
}

impl HarnessConfig {
    /// Load from the process environment
    pub fn from_env() -> ExecutorResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the environment
    ///
    /// Unset variables keep their defaults; malformed ones are a
    /// `Config` error naming the variable.
    pub fn from_lookup<L>(lookup: L) -> ExecutorResult<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_EXEC_FAILURE) {
            config.pipeline.exec_failure = match value.trim().to_ascii_lowercase().as_str() {
                "legacy" => ExecFailureMode::Legacy,
                "distinct" => ExecFailureMode::Distinct,
                _ => return Err(invalid(ENV_EXEC_FAILURE, &value, "expected legacy or distinct")),
            };
        }

        if let Some(value) = lookup(ENV_EXEC_FAILURE_CODE) {
            let code: i32 = value
                .trim()
                .parse()
                .map_err(|_| invalid(ENV_EXEC_FAILURE_CODE, &value, "expected an integer"))?;
            config.pipeline.exec_failure_code = code;
            config
                .pipeline
                .validate()
                .map_err(|e| invalid(ENV_EXEC_FAILURE_CODE, &value, &e.to_string()))?;
        }

        if let Some(value) = lookup(ENV_DEADLINE_SECS) {
            let secs: f64 = value
                .trim()
                .parse()
                .map_err(|_| invalid(ENV_DEADLINE_SECS, &value, "expected seconds"))?;
            config.sandbox.default_deadline = Duration::try_from_secs_f64(secs)
                .map_err(|_| invalid(ENV_DEADLINE_SECS, &value, "expected non-negative seconds"))?;
        }

        if let Some(value) = lookup(ENV_VERBOSE) {
            config.sandbox.verbose = parse_flag(ENV_VERBOSE, &value)?;
        }

        if let Some(value) = lookup(ENV_TRACE_JSON) {
            config.trace_json = parse_flag(ENV_TRACE_JSON, &value)?;
        }

        Ok(config)
    }
}

fn parse_flag(key: &str, value: &str) -> ExecutorResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid(key, value, "expected a boolean")),
    }
}

fn invalid(key: &str, value: &str, expected: &str) -> ExecutorError {
    ExecutorError::Config(format!("{}={:?}: {}", key, value, expected))
}
