/*!
 * Monitoring
 * Run tracing and executor counters
 */

mod stats;
mod tracer;

pub use stats::{AtomicExecutorStats, ExecutorStats};
pub use tracer::{generate_trace_id, init_tracing, json_requested, RunSpan};
