/*!
 * Pipeworks Library
 * Shell-style process pipelines and deadline-bounded sandboxed tasks
 */

pub mod config;
pub mod core;
pub mod monitoring;
pub mod pipeline;
pub mod process;
pub mod sandbox;

// Re-exports
pub use config::HarnessConfig;
pub use crate::core::errors::{ExecutorError, ExecutorResult};
pub use monitoring::{init_tracing, AtomicExecutorStats, ExecutorStats};
pub use pipeline::{
    ExecFailureMode, Pipeline, PipelineConfig, PipelineExecutor, PipelineIo, PipelineResult,
    StageOutcome, StageReport, StageSpec,
};
pub use process::{ProcessError, Termination};
pub use sandbox::{sandbox, BoundedExecutor, BoundedTask, SandboxConfig, TaskOutcome};
