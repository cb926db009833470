//! Nonce action names.
//!
//! An action names the operation a nonce authorizes. Callers may pass a single
//! string or an ordered list of parts such as `["delete-post", "42"]`; parts
//! are joined with `-`. An empty action means "use the configured default".

use std::fmt;

/// Delimiter used to join multi-part actions.
pub const ACTION_DELIMITER: &str = "-";

/// A resolved-or-unspecified nonce action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Action(String);

impl Action {
    /// Action that defers to the configured default.
    #[must_use]
    pub const fn unspecified() -> Self {
        Self(String::new())
    }

    /// Build an action from ordered parts.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = parts
            .into_iter()
            .map(|p| p.as_ref().to_owned())
            .collect::<Vec<_>>()
            .join(ACTION_DELIMITER);
        Self(joined)
    }

    /// Whether the caller left the action unspecified.
    #[must_use]
    pub fn is_unspecified(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve against the configured default action.
    #[must_use]
    pub fn resolve<'a>(&'a self, default_action: &'a str) -> &'a str {
        if self.is_unspecified() {
            default_action
        } else {
            &self.0
        }
    }

    /// The joined action string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&String> for Action {
    fn from(s: &String) -> Self {
        Self(s.clone())
    }
}

impl From<Option<&str>> for Action {
    fn from(s: Option<&str>) -> Self {
        s.map_or_else(Self::unspecified, Self::from)
    }
}

impl From<&Action> for Action {
    fn from(a: &Action) -> Self {
        a.clone()
    }
}

impl From<&[&str]> for Action {
    fn from(parts: &[&str]) -> Self {
        Self::from_parts(parts)
    }
}

impl<const N: usize> From<[&str; N]> for Action {
    fn from(parts: [&str; N]) -> Self {
        Self::from_parts(parts)
    }
}

impl From<Vec<String>> for Action {
    fn from(parts: Vec<String>) -> Self {
        Self::from_parts(parts)
    }
}

impl From<Vec<&str>> for Action {
    fn from(parts: Vec<&str>) -> Self {
        Self::from_parts(parts)
    }
}
