//! Nonce Service configuration.
//!
//! Runtime options ([`NonceOptions`]) are a fixed set of recognized keys.
//! Updates arrive as a [`NonceOptionsPatch`] and are validated as a whole
//! before being applied. [`NonceServiceConfig`] loads the initial options and
//! process settings from the environment.

use crate::error::NonceError;
use rust_common::TracingConfig;
use serde::Serialize;
use std::env;
use std::fmt;
use std::str::FromStr;

/// Default query/form field name carrying the nonce.
pub const DEFAULT_TOKEN_NAME: &str = "_nonce";

/// Default action when the caller supplies none.
pub const DEFAULT_ACTION: &str = "-1";

/// Default window length in seconds (12 hours).
pub const DEFAULT_LIFETIME_SECONDS: u64 = 43_200;

/// Default length of the encoded token.
pub const DEFAULT_TOKEN_LENGTH: usize = 10;

/// Runtime options of the Nonce Service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NonceOptions {
    /// Field name used in URLs and forms
    pub token_name: String,
    /// Action used when the caller supplies none
    pub default_action: String,
    /// Window length in seconds
    pub lifetime_seconds: u64,
}

impl Default for NonceOptions {
    fn default() -> Self {
        Self {
            token_name: DEFAULT_TOKEN_NAME.to_string(),
            default_action: DEFAULT_ACTION.to_string(),
            lifetime_seconds: DEFAULT_LIFETIME_SECONDS,
        }
    }
}

impl NonceOptions {
    /// Check every field against the rules applied to updates.
    ///
    /// # Errors
    ///
    /// [`NonceError::InvalidConfigValue`] for the first offending field.
    pub fn validated(self) -> Result<Self, NonceError> {
        NonceOptionsPatch::from(self).apply(&Self::default())
    }
}

/// Recognized configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    /// `token_name`
    TokenName,
    /// `default_action`
    DefaultAction,
    /// `lifetime_seconds`
    LifetimeSeconds,
}

impl ConfigKey {
    /// Key name as accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TokenName => "token_name",
            Self::DefaultAction => "default_action",
            Self::LifetimeSeconds => "lifetime_seconds",
        }
    }
}

impl FromStr for ConfigKey {
    type Err = NonceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "token_name" => Ok(Self::TokenName),
            "default_action" => Ok(Self::DefaultAction),
            "lifetime_seconds" => Ok(Self::LifetimeSeconds),
            other => Err(NonceError::InvalidConfigKey(other.to_string())),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Untyped value for a single-key update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// String value
    Text(String),
    /// Integer value
    Integer(i64),
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for OptionValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<u32> for OptionValue {
    fn from(n: u32) -> Self {
        Self::Integer(i64::from(n))
    }
}

/// Partial update of [`NonceOptions`]. Unset fields keep their prior value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NonceOptionsPatch {
    /// New field name
    pub token_name: Option<String>,
    /// New default action
    pub default_action: Option<String>,
    /// New window length
    pub lifetime_seconds: Option<u64>,
}

impl NonceOptionsPatch {
    /// Set the field name.
    #[must_use]
    pub fn with_token_name(mut self, name: impl Into<String>) -> Self {
        self.token_name = Some(name.into());
        self
    }

    /// Set the default action.
    #[must_use]
    pub fn with_default_action(mut self, action: impl Into<String>) -> Self {
        self.default_action = Some(action.into());
        self
    }

    /// Set the window length.
    #[must_use]
    pub const fn with_lifetime_seconds(mut self, secs: u64) -> Self {
        self.lifetime_seconds = Some(secs);
        self
    }

    /// Add one key/value pair, checking the key and the value type.
    ///
    /// # Errors
    ///
    /// [`NonceError::InvalidConfigKey`] for unknown keys and
    /// [`NonceError::InvalidConfigValue`] for a value of the wrong type.
    pub fn set(mut self, key: &str, value: impl Into<OptionValue>) -> Result<Self, NonceError> {
        let key = ConfigKey::from_str(key)?;
        match (key, value.into()) {
            (ConfigKey::TokenName, OptionValue::Text(s)) => self.token_name = Some(s),
            (ConfigKey::DefaultAction, OptionValue::Text(s)) => self.default_action = Some(s),
            (ConfigKey::LifetimeSeconds, OptionValue::Integer(n)) => {
                let secs = u64::try_from(n)
                    .map_err(|_| NonceError::invalid_value(key.as_str(), "must be positive"))?;
                self.lifetime_seconds = Some(secs);
            }
            (ConfigKey::LifetimeSeconds, OptionValue::Text(_)) => {
                return Err(NonceError::invalid_value(key.as_str(), "expected an integer"));
            }
            (_, OptionValue::Integer(_)) => {
                return Err(NonceError::invalid_value(key.as_str(), "expected a string"));
            }
        }
        Ok(self)
    }

    /// Build a patch from a JSON object such as `{"lifetime_seconds": 60}`.
    ///
    /// # Errors
    ///
    /// Fails on a non-object input, an unknown key, or a value of the wrong type.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, NonceError> {
        let map = value
            .as_object()
            .ok_or_else(|| NonceError::config("configuration must be a JSON object"))?;

        map.iter().try_fold(Self::default(), |patch, (key, value)| {
            // Unknown keys are reported before bad values.
            ConfigKey::from_str(key)?;
            let value = match value {
                serde_json::Value::String(s) => OptionValue::Text(s.clone()),
                serde_json::Value::Number(n) => n
                    .as_i64()
                    .map(OptionValue::Integer)
                    .ok_or_else(|| NonceError::invalid_value(key, "expected an integer"))?,
                _ => return Err(NonceError::invalid_value(key, "expected a string or integer")),
            };
            patch.set(key, value)
        })
    }

    /// Whether the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.token_name.is_none() && self.default_action.is_none() && self.lifetime_seconds.is_none()
    }

    /// Produce the merged options, validating every field that is set.
    ///
    /// # Errors
    ///
    /// [`NonceError::InvalidConfigValue`] for an empty name or action, or a
    /// zero lifetime.
    pub fn apply(&self, base: &NonceOptions) -> Result<NonceOptions, NonceError> {
        let mut merged = base.clone();

        if let Some(name) = &self.token_name {
            if name.trim().is_empty() {
                return Err(NonceError::invalid_value("token_name", "must not be empty"));
            }
            merged.token_name.clone_from(name);
        }
        if let Some(action) = &self.default_action {
            if action.is_empty() {
                return Err(NonceError::invalid_value("default_action", "must not be empty"));
            }
            merged.default_action.clone_from(action);
        }
        if let Some(secs) = self.lifetime_seconds {
            if secs == 0 {
                return Err(NonceError::invalid_value("lifetime_seconds", "must be positive"));
            }
            merged.lifetime_seconds = secs;
        }

        Ok(merged)
    }
}

impl From<NonceOptions> for NonceOptionsPatch {
    fn from(options: NonceOptions) -> Self {
        Self {
            token_name: Some(options.token_name),
            default_action: Some(options.default_action),
            lifetime_seconds: Some(options.lifetime_seconds),
        }
    }
}

/// Process-level configuration loaded at startup.
#[derive(Debug, Clone)]
pub struct NonceServiceConfig {
    /// Initial runtime options
    pub options: NonceOptions,
    /// Encoded token length
    pub token_length: usize,
    /// Logging setup
    pub tracing: TracingConfig,
}

impl Default for NonceServiceConfig {
    fn default() -> Self {
        Self {
            options: NonceOptions::default(),
            token_length: DEFAULT_TOKEN_LENGTH,
            tracing: TracingConfig::default().with_service_name("nonce-service"),
        }
    }
}

impl NonceServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_env() -> Result<Self, NonceError> {
        dotenvy::dotenv().ok();

        let patch = NonceOptionsPatch {
            token_name: env::var("NONCE_TOKEN_NAME").ok(),
            default_action: env::var("NONCE_DEFAULT_ACTION").ok(),
            lifetime_seconds: Some(parse_env("NONCE_LIFETIME", DEFAULT_LIFETIME_SECONDS)?),
        };
        let options = patch
            .apply(&NonceOptions::default())
            .map_err(|e| NonceError::config(e.to_string()))?;

        let token_length = parse_env("NONCE_TOKEN_LENGTH", DEFAULT_TOKEN_LENGTH)?;

        Ok(Self {
            options,
            token_length,
            tracing: TracingConfig::from_env("nonce-service"),
        })
    }
}

/// Serializes tests that mutate process environment variables.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Parse environment variable with default value.
fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T, NonceError>
where
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map_err(|e| NonceError::config(format!("Invalid {name}: {e}"))),
        Err(_) => Ok(default),
    }
}
