/*!
 * Process Module
 * Spawning, descriptor handling and reaping of OS child processes
 */

pub mod fd;
pub mod spawn;
pub mod types;
pub mod wait;

// Re-export for convenience
pub use spawn::{spawn_action, spawn_program, ExecCommand, SpawnedProgram, StdioPlan};
pub use types::{describe_signal, OsPid, ProcessError, ProcessResult, Termination};
