//! Observability setup for SessionVault: tracing subscriber with optional
//! OpenTelemetry export.

pub mod tracing_setup;
