/*!
 * Monitoring
 * Structured logging setup for the supervisor
 */

mod tracer;

pub use tracer::{init_tracing, span_cycle, TRACE_JSON_ENV};
