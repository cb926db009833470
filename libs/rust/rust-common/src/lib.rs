//! Shared library for cross-cutting concerns in auth-platform Rust services.
//!
//! This crate currently provides the tracing subscriber setup used by
//! every service binary and library test harness.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod tracing_config;

pub use tracing_config::{init_tracing, TracingConfig};
