/*!
 * Structured Tracing
 * Subscriber setup and spawn spans using the tracing crate
 */

use std::time::Instant;
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Spawns slower than this are reported at warn level
const SLOW_SPAWN_MILLIS: u128 = 50;

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - SUBPROCESS_TRACE_JSON: Enable JSON output (default: false)
///
/// Calling this more than once is harmless; only the first subscriber is installed.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("SUBPROCESS_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_file(true)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "Structured tracing initialized");
    }
}

/// Span covering one process creation
pub struct SpawnSpan {
    span: tracing::Span,
    start: Instant,
    program: String,
}

impl SpawnSpan {
    pub fn new(program: &str) -> Self {
        let span = span!(
            Level::DEBUG,
            "spawn",
            program = program,
            pid = tracing::field::Empty,
            result = tracing::field::Empty,
            stage = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            program: program.to_string(),
        }
    }

    /// Record the pid of the created child
    pub fn record_pid(&self, pid: u32) {
        self.span.record("pid", pid);
        self.span.record("result", "success");
    }

    /// Record a launch failure
    pub fn record_failure(&self, stage: &str) {
        self.span.record("stage", stage);
        self.span.record("result", "error");
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for SpawnSpan {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let _entered = self.span.enter();

        if elapsed.as_millis() > SLOW_SPAWN_MILLIS {
            warn!(
                program = %self.program,
                duration_ms = elapsed.as_millis() as u64,
                slow = true,
                "slow spawn detected"
            );
        } else {
            debug!(
                program = %self.program,
                duration_us = elapsed.as_micros() as u64,
                "spawn completed"
            );
        }
    }
}

/// Create a span for one `exec`
pub fn spawn_span(program: &str) -> SpawnSpan {
    SpawnSpan::new(program)
}
