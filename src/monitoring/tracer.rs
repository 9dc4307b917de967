/*!
 * Run Tracing
 * Structured tracing for pipeline and sandbox runs using the tracing crate
 *
 * Features:
 * - Trace ID per run for correlating spawn/reap events
 * - JSON-formatted logs for structured parsing
 * - Duration and result recorded when the run span closes
 */

use std::time::Instant;
use tracing::{debug, info, span, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - PIPEWORKS_TRACE_JSON: Enable JSON output (default: false)
///
/// `log` records from the process layer are forwarded into the same
/// subscriber. Calling this more than once is a no-op.
pub fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    let initialized = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
    };

    if initialized.is_ok() {
        info!(json, "Structured tracing initialized");
    }
}

/// Whether `PIPEWORKS_TRACE_JSON` asks for JSON output
pub fn json_requested() -> bool {
    std::env::var("PIPEWORKS_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false)
}

/// Generate a unique trace ID for run correlation
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one executor run
///
/// Records the run's duration and result when dropped.
pub struct RunSpan {
    span: tracing::Span,
    start: Instant,
    kind: &'static str,
    trace_id: String,
}

impl RunSpan {
    pub fn new(kind: &'static str, units: usize) -> Self {
        let trace_id = generate_trace_id();
        let span = span!(
            Level::INFO,
            "run",
            kind = kind,
            trace_id = %trace_id,
            units = units,
            result = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            kind,
            trace_id,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    /// Record the run result
    pub fn record_result(&self, result: &str) {
        self.span.record("result", result);
    }
}

impl Drop for RunSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        self.span.record("duration_ms", duration.as_millis() as u64);
        let _entered = self.span.enter();
        debug!(
            trace_id = %self.trace_id,
            kind = self.kind,
            duration_ms = duration.as_millis() as u64,
            "run completed"
        );
    }
}
