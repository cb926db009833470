//! Nonce key derivation.
//!
//! A nonce is `base64url(HMAC-SHA256(secret, tag ‖ window ‖ action ‖ subject))`
//! truncated to a fixed length. Every field is length-prefixed so that no two
//! distinct (window, action, subject) triples share an HMAC input.

use crate::secret::NonceSecret;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::hmac;
use subtle::{Choice, ConstantTimeEq};

/// Domain separation tag mixed into every derivation.
const DERIVATION_TAG: &[u8] = b"nonce-v1";

/// Shortest token length accepted by the builder.
pub const MIN_TOKEN_LENGTH: usize = 4;

/// Unpadded base64url length of a SHA-256 digest.
pub const MAX_TOKEN_LENGTH: usize = 43;

/// Window index for `now` given a window length in seconds.
#[must_use]
pub fn window_for(now: i64, lifetime_seconds: u64) -> i64 {
    let lifetime = i64::try_from(lifetime_seconds.max(1)).unwrap_or(i64::MAX);
    now.div_euclid(lifetime)
}

/// HMAC key derived once from the process secret.
#[derive(Debug, Clone)]
pub struct NonceKey {
    key: hmac::Key,
    token_length: usize,
}

impl NonceKey {
    /// Build the key. `token_length` is clamped to
    /// [`MIN_TOKEN_LENGTH`]..=[`MAX_TOKEN_LENGTH`].
    #[must_use]
    pub fn new(secret: &NonceSecret, token_length: usize) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.expose()),
            token_length: token_length.clamp(MIN_TOKEN_LENGTH, MAX_TOKEN_LENGTH),
        }
    }

    /// Encoded token length.
    #[must_use]
    pub const fn token_length(&self) -> usize {
        self.token_length
    }

    /// Derive the token for a (subject, action, window) triple.
    #[must_use]
    pub fn derive(&self, subject: &str, action: &str, window: i64) -> String {
        let mut ctx = hmac::Context::with_key(&self.key);
        ctx.update(DERIVATION_TAG);
        ctx.update(&window.to_be_bytes());
        update_prefixed(&mut ctx, action.as_bytes());
        update_prefixed(&mut ctx, subject.as_bytes());
        let tag = ctx.sign();

        let mut encoded = URL_SAFE_NO_PAD.encode(tag.as_ref());
        encoded.truncate(self.token_length);
        encoded
    }

    /// Compare a presented token against a candidate without early exit on
    /// the first differing byte.
    #[must_use]
    pub fn matches(candidate: &str, presented: &str) -> Choice {
        candidate.as_bytes().ct_eq(presented.as_bytes())
    }
}

fn update_prefixed(ctx: &mut hmac::Context, field: &[u8]) {
    ctx.update(&(field.len() as u64).to_be_bytes());
    ctx.update(field);
}
