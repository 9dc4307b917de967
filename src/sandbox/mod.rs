/*!
 * Sandbox Module
 * Isolated, deadline-bounded execution of in-process tasks
 */

pub mod executor;
pub mod types;
pub mod watchdog;

// Re-export for convenience
pub use executor::{sandbox, BoundedExecutor};
pub use types::{BoundedTask, SandboxConfig, TaskOutcome};
pub use watchdog::Watchdog;
