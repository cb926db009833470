//! Carrying nonces over HTTP: URL query decoration, hidden form field
//! payloads, and lookup of a presented nonce among request parameters.

use crate::error::NonceError;
use serde::Serialize;
use url::{form_urlencoded, Url};

/// Name of the companion field carrying the requesting page's URL.
pub const REFERER_FIELD_NAME: &str = "_http_referer";

/// Fallback parameter consulted for script-originated requests.
pub const AJAX_FIELD_NAME: &str = "_ajax_nonce";

/// Hidden form field payload. Markup is left to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormField {
    /// Input name
    pub field_name: String,
    /// Nonce value
    pub field_value: String,
    /// Referer field, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub companion: Option<CompanionField>,
}

/// Auxiliary hidden field. Its value is carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanionField {
    /// Input name
    pub field_name: String,
    /// Requesting page URL
    pub field_value: String,
}

impl CompanionField {
    /// Referer field for `url`.
    #[must_use]
    pub fn referer(url: impl Into<String>) -> Self {
        Self {
            field_name: REFERER_FIELD_NAME.to_string(),
            field_value: url.into(),
        }
    }
}

/// Set `name=token` on `base_url`.
///
/// Existing pairs are preserved byte-for-byte unless one already uses `name`,
/// in which case those pairs are dropped so the result carries exactly one.
///
/// # Errors
///
/// [`NonceError::InvalidUrl`] when `base_url` is not an absolute URL.
pub fn append_token(base_url: &str, name: &str, token: &str) -> Result<String, NonceError> {
    let mut url = Url::parse(base_url)?;
    set_token(&mut url, name, token);
    Ok(url.into())
}

/// In-place form of [`append_token`] for an already parsed URL.
pub fn set_token(url: &mut Url, name: &str, token: &str) {
    if url.query_pairs().any(|(k, _)| k == name) {
        // Drop matching segments from the raw query; the rest keep their encoding.
        let kept = url
            .query()
            .unwrap_or_default()
            .split('&')
            .filter(|segment| !segment_named(segment, name))
            .collect::<Vec<_>>()
            .join("&");
        url.set_query((!kept.is_empty()).then_some(kept.as_str()));
    }
    url.query_pairs_mut().append_pair(name, token);
}

fn segment_named(segment: &str, name: &str) -> bool {
    form_urlencoded::parse(segment.as_bytes())
        .next()
        .is_some_and(|(k, _)| k == name)
}

/// Find the first parameter matching one of `names`, in priority order.
pub fn find_token<I, K, V>(params: I, names: &[&str]) -> Option<String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut found: Vec<Option<String>> = vec![None; names.len()];
    for (key, value) in params {
        if let Some(idx) = names.iter().position(|n| *n == key.as_ref()) {
            if found[idx].is_none() {
                found[idx] = Some(value.as_ref().to_string());
            }
        }
    }
    found.into_iter().flatten().next()
}

/// Query pairs of `url`, or `None` when it does not parse.
pub fn query_pairs(url: &str) -> Option<Vec<(String, String)>> {
    let url = Url::parse(url).ok()?;
    Some(
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
    )
}
