//! Verification outcomes.

use serde::Serialize;
use std::fmt;

/// Result of checking a presented nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    /// Matches the current window.
    Fresh,
    /// Matches only the previous window. Acceptable for idempotent requests;
    /// state-changing requests should ask for a new nonce.
    Stale,
    /// Matches neither window.
    Invalid,
}

impl Verification {
    /// `Fresh` or `Stale`.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Fresh | Self::Stale)
    }

    /// `Fresh` only.
    #[must_use]
    pub const fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh)
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
