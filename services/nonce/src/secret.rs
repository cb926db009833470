//! Secret loading for nonce key derivation.
//!
//! The secret is held in a zeroizing container and only exposed to build the
//! HMAC key. It is never logged, serialized or returned to callers.

use crate::error::NonceError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretBox};
use std::env;
use tracing::warn;

/// Minimum accepted secret length in bytes.
pub const MIN_SECRET_LEN: usize = 16;

/// Length of a generated development secret.
const GENERATED_SECRET_LEN: usize = 32;

/// Default environment variable holding the base64 secret.
pub const SECRET_ENV_VAR: &str = "NONCE_SECRET";

/// Process-wide nonce secret.
pub struct NonceSecret(SecretBox<[u8]>);

impl NonceSecret {
    /// Wrap raw secret bytes.
    ///
    /// # Errors
    ///
    /// Returns [`NonceError::InvalidSecret`] when shorter than [`MIN_SECRET_LEN`].
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, NonceError> {
        let bytes = bytes.into();
        if bytes.len() < MIN_SECRET_LEN {
            return Err(NonceError::InvalidSecret(format!(
                "secret must be at least {MIN_SECRET_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(SecretBox::new(bytes.into_boxed_slice())))
    }

    /// Generate a random secret.
    #[must_use]
    pub fn random() -> Self {
        let mut bytes = vec![0u8; GENERATED_SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(SecretBox::new(bytes.into_boxed_slice()))
    }

    pub(crate) fn expose(&self) -> &[u8] {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for NonceSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("NonceSecret([REDACTED])")
    }
}

/// Supplies the long-lived secret at service construction.
pub trait SecretStore {
    /// Load the secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is missing, malformed or too short.
    fn load(&self) -> Result<NonceSecret, NonceError>;
}

/// Secret supplied directly by the embedding application.
pub struct StaticSecretStore {
    bytes: SecretBox<[u8]>,
}

impl StaticSecretStore {
    /// Create a store over the given bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: SecretBox::new(bytes.into().into_boxed_slice()),
        }
    }
}

impl SecretStore for StaticSecretStore {
    fn load(&self) -> Result<NonceSecret, NonceError> {
        NonceSecret::new(self.bytes.expose_secret().to_vec())
    }
}

/// Secret read from a base64-encoded environment variable.
///
/// When the variable is unset a random secret is generated, so tokens do not
/// survive a restart. That fallback is meant for development only.
#[derive(Debug, Clone)]
pub struct EnvSecretStore {
    var: String,
}

impl EnvSecretStore {
    /// Read from a custom variable name.
    #[must_use]
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvSecretStore {
    fn default() -> Self {
        Self::new(SECRET_ENV_VAR)
    }
}

impl SecretStore for EnvSecretStore {
    fn load(&self) -> Result<NonceSecret, NonceError> {
        match env::var(&self.var) {
            Ok(encoded) => {
                let bytes = STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| NonceError::InvalidSecret(format!("{}: {e}", self.var)))?;
                NonceSecret::new(bytes)
            }
            Err(_) => {
                warn!(
                    variable = %self.var,
                    "Nonce secret not configured, generating an ephemeral one"
                );
                Ok(NonceSecret::random())
            }
        }
    }
}
