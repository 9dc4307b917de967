/*!
 * Core Module
 * Fundamental types, constants and error handling
 */

pub mod errors;
pub mod guard;
pub mod limits;
pub mod serde;

// Re-export for convenience
pub use errors::*;
pub use guard::{ChildGuard, Guard, GuardDrop, GuardError, GuardResult};
