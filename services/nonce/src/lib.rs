//! Nonce Service library.
//!
//! Issues short-lived, context-bound anti-replay tokens ("nonces") for CSRF
//! protection, embeds them in URLs and hidden form fields, and verifies them
//! statelessly with tolerance for one prior rotation window.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod action;
pub mod clock;
pub mod config;
pub mod derive;
pub mod error;
pub mod metrics;
pub mod secret;
pub mod service;
pub mod transport;
pub mod verification;

// Re-exports for convenience
pub use action::Action;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{NonceOptions, NonceOptionsPatch, NonceServiceConfig};
pub use error::NonceError;
pub use secret::{EnvSecretStore, NonceSecret, SecretStore, StaticSecretStore};
pub use service::{NonceService, NonceServiceBuilder};
pub use transport::{CompanionField, FormField};
pub use verification::Verification;
