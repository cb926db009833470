//! Shared test utilities for auth-platform Rust libraries.
//!
//! This crate provides:
//! - Proptest generators for nonce subjects, actions, secrets and URLs
//! - Test fixtures with sample forms and option payloads

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

pub use generators::*;
