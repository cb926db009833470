//! Test fixtures with sample data.

use serde::{Deserialize, Serialize};

/// 32-byte secret shared by tests that need reproducible tokens.
pub const TEST_SECRET: &[u8; 32] = b"test-fixture-secret-0123456789ab";

/// Start of a window for the default 12 hour lifetime (2024-10-04T00:00:00Z).
pub const WINDOW_ALIGNED_EPOCH: i64 = 1_728_000_000;

/// A form page and the action URL it posts to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SampleForm {
    /// Page hosting the form, used as the referer
    pub page_url: String,
    /// Form action URL
    pub action_url: String,
    /// Nonce action
    pub action: String,
    /// Session id of the visitor
    pub subject: String,
}

impl SampleForm {
    /// Post edit form.
    #[must_use]
    pub fn edit_post() -> Self {
        Self {
            page_url: "https://blog.test/admin/post?id=42&view=edit".to_string(),
            action_url: "https://blog.test/admin/post?id=42".to_string(),
            action: "update-post-42".to_string(),
            subject: "5f2b9c0e8d7a4e3fb1c6a9d0e2f4b7c8".to_string(),
        }
    }

    /// Account deletion form.
    #[must_use]
    pub fn delete_account() -> Self {
        Self {
            page_url: "https://app.test/settings/account".to_string(),
            action_url: "https://app.test/settings/account/delete".to_string(),
            action: "delete-account".to_string(),
            subject: "user-1007".to_string(),
        }
    }
}

/// Options update accepted by the service.
#[must_use]
pub fn sample_options_json() -> serde_json::Value {
    serde_json::json!({
        "token_name": "_csrf",
        "default_action": "generic",
        "lifetime_seconds": 3600
    })
}

/// Options update using keys the service does not recognize.
#[must_use]
pub fn unknown_options_json() -> serde_json::Value {
    serde_json::json!({
        "nonce_life": 3600,
        "nonce_name": "_wpnonce"
    })
}
