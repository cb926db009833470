//! Shared proptest generators for nonce tests.

use proptest::prelude::*;

/// Generate subject identifiers (session ids, user ids, visitor ids).
pub fn subject_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-f0-9]{32}",
        "user-[0-9]{1,8}",
        "anon-[a-zA-Z0-9_-]{8,24}",
    ]
}

/// Generate single-string action names.
pub fn action_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{2,30}"
}

/// Generate multi-part actions such as `["delete-post", "42"]`.
pub fn action_parts_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z0-9_]{1,12}", 1..4)
}

/// Generate secrets of acceptable length (16 to 64 bytes).
pub fn secret_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 16..64)
}

/// Generate window lengths (1 minute to 2 days).
pub fn lifetime_strategy() -> impl Strategy<Value = u64> {
    60u64..172_800
}

/// Generate Unix timestamps between 2001 and 2100.
pub fn timestamp_strategy() -> impl Strategy<Value = i64> {
    1_000_000_000i64..4_102_444_800
}

/// Generate field names for the nonce parameter.
pub fn token_name_strategy() -> impl Strategy<Value = String> {
    "_[a-z]{3,12}"
}

/// Generate absolute base URLs, with or without an existing query.
pub fn base_url_strategy() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("http"), Just("https")],
        "[a-z]{3,10}",
        "(/[a-z0-9-]{1,10}){0,3}",
        prop::option::of(("[a-z]{1,6}", "[a-z0-9]{1,6}")),
    )
        .prop_map(|(scheme, host, path, query)| match query {
            Some((k, v)) => format!("{scheme}://{host}.test{path}?{k}={v}"),
            None => format!("{scheme}://{host}.test{path}"),
        })
}
