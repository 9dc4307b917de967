/*!
 * Pipeline Module
 * Shell-style chains of external programs connected by pipes
 */

pub mod executor;
pub mod link;
pub mod types;

// Re-export for convenience
pub use executor::PipelineExecutor;
pub use link::PipeLink;
pub use types::{
    ExecFailureMode, Pipeline, PipelineBuilder, PipelineConfig, PipelineIo, PipelineResult,
    StageOutcome, StageReport, StageSpec,
};
