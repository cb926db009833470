//! Error types for the Nonce Service.

use thiserror::Error;

/// Errors raised by nonce issuance, URL decoration and configuration.
///
/// Verification never produces an error; it reports
/// [`Verification::Invalid`](crate::Verification::Invalid) instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NonceError {
    /// The subject was empty.
    #[error("Nonce subject must not be empty")]
    InvalidSubject,

    /// The base URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The configuration key is not one of the recognized options.
    #[error("Unrecognized configuration key: {0}")]
    InvalidConfigKey(String),

    /// The configuration value is ill-typed or out of range.
    #[error("Invalid value for {key}: {reason}")]
    InvalidConfigValue {
        /// Option name
        key: String,
        /// Why the value was refused
        reason: String,
    },

    /// The secret could not be loaded or is too weak.
    #[error("Invalid secret: {0}")]
    InvalidSecret(String),

    /// Environment configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl NonceError {
    /// Create an invalid configuration value error.
    #[must_use]
    pub fn invalid_value(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stable error code for API responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidSubject => NONCE_INVALID_SUBJECT,
            Self::InvalidUrl(_) => NONCE_INVALID_URL,
            Self::InvalidConfigKey(_) => NONCE_INVALID_CONFIG_KEY,
            Self::InvalidConfigValue { .. } => NONCE_INVALID_CONFIG_VALUE,
            Self::InvalidSecret(_) => NONCE_INVALID_SECRET,
            Self::Config(_) => NONCE_CONFIG_ERROR,
        }
    }
}

impl From<url::ParseError> for NonceError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

// Error codes for API responses
/// Code for [`NonceError::InvalidSubject`].
pub const NONCE_INVALID_SUBJECT: &str = "NONCE_INVALID_SUBJECT";
/// Code for [`NonceError::InvalidUrl`].
pub const NONCE_INVALID_URL: &str = "NONCE_INVALID_URL";
/// Code for [`NonceError::InvalidConfigKey`].
pub const NONCE_INVALID_CONFIG_KEY: &str = "NONCE_INVALID_CONFIG_KEY";
/// Code for [`NonceError::InvalidConfigValue`].
pub const NONCE_INVALID_CONFIG_VALUE: &str = "NONCE_INVALID_CONFIG_VALUE";
/// Code for [`NonceError::InvalidSecret`].
pub const NONCE_INVALID_SECRET: &str = "NONCE_INVALID_SECRET";
/// Code for [`NonceError::Config`].
pub const NONCE_CONFIG_ERROR: &str = "NONCE_CONFIG_ERROR";
