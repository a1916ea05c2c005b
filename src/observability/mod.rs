//! Observability: structured logging via `tracing`.
//!
//! The subscriber is installed once at startup from `[observability.logging]`.
//! HTTP request spans come from the tower-http `TraceLayer` in the router.

mod tracing_init;

pub use tracing_init::*;
