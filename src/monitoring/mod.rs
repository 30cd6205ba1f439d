/*!
 * Monitoring
 * Structured tracing for process creation and lifecycle
 */

mod tracer;

pub use tracer::{init_tracing, spawn_span, SpawnSpan};
