//! The Nonce Service: issuance, verification and transport of
//! context-bound anti-replay tokens.
//!
//! Tokens are never stored. Verification recomputes the expected token for
//! the current and the previous window and compares both in constant time.
//!
//! Runtime options are an immutable snapshot swapped under a write lock, so
//! concurrent readers always see a complete configuration. The last issued
//! token is cached in an [`ArcSwap`], so issuers never wait on each other.

use crate::action::Action;
use crate::clock::{Clock, SystemClock};
use crate::config::{
    NonceOptions, NonceOptionsPatch, NonceServiceConfig, OptionValue, DEFAULT_TOKEN_LENGTH,
};
use crate::derive::{window_for, NonceKey};
use crate::error::NonceError;
use crate::metrics;
use crate::secret::{EnvSecretStore, NonceSecret, SecretStore};
use crate::transport::{self, CompanionField, FormField, AJAX_FIELD_NAME};
use crate::verification::Verification;
use arc_swap::ArcSwap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Issues and verifies nonces.
pub struct NonceService {
    key: NonceKey,
    clock: Arc<dyn Clock>,
    options: RwLock<Arc<NonceOptions>>,
    last_issued: ArcSwap<Option<String>>,
}

/// Builder for [`NonceService`].
pub struct NonceServiceBuilder {
    secret: NonceSecret,
    clock: Arc<dyn Clock>,
    options: NonceOptions,
    token_length: usize,
}

impl NonceServiceBuilder {
    /// Use a custom clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Initial options. [`NonceService::reset`] still restores the defaults.
    #[must_use]
    pub fn options(mut self, options: NonceOptions) -> Self {
        self.options = options;
        self
    }

    /// Encoded token length, clamped to the supported range.
    #[must_use]
    pub const fn token_length(mut self, length: usize) -> Self {
        self.token_length = length;
        self
    }

    /// Build the service.
    ///
    /// # Errors
    ///
    /// [`NonceError::InvalidConfigValue`] if the initial options are invalid.
    pub fn build(self) -> Result<NonceService, NonceError> {
        let options = self.options.validated()?;
        let key = NonceKey::new(&self.secret, self.token_length);

        debug!(
            token_length = key.token_length(),
            lifetime_seconds = options.lifetime_seconds,
            "Nonce service built"
        );

        Ok(NonceService {
            key,
            clock: self.clock,
            options: RwLock::new(Arc::new(options)),
            last_issued: ArcSwap::new(Arc::new(None)),
        })
    }
}

impl NonceService {
    /// Start building a service around `secret`.
    #[must_use]
    pub fn builder(secret: NonceSecret) -> NonceServiceBuilder {
        NonceServiceBuilder {
            secret,
            clock: Arc::new(SystemClock),
            options: NonceOptions::default(),
            token_length: DEFAULT_TOKEN_LENGTH,
        }
    }

    /// Service with default options and the system clock.
    ///
    /// # Errors
    ///
    /// Propagates secret loading failures.
    pub fn from_store(store: &impl SecretStore) -> Result<Self, NonceError> {
        Self::builder(store.load()?).build()
    }

    /// Service configured from the environment (see [`NonceServiceConfig`]).
    ///
    /// Also installs the global tracing subscriber described by `LOG_LEVEL`
    /// and `LOG_JSON`, unless one is already installed.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration or the secret is invalid.
    pub fn from_env() -> Result<Self, NonceError> {
        let config = NonceServiceConfig::from_env()?;
        if !rust_common::init_tracing(&config.tracing) {
            debug!("Tracing subscriber already installed");
        }
        let secret = EnvSecretStore::default().load()?;
        Self::builder(secret)
            .options(config.options)
            .token_length(config.token_length)
            .build()
    }

    /// Current options snapshot.
    #[must_use]
    pub fn options(&self) -> Arc<NonceOptions> {
        Arc::clone(&self.options.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// The most recently issued token, if any.
    #[must_use]
    pub fn last_issued(&self) -> Option<String> {
        Option::clone(&self.last_issued.load())
    }

    /// Merge a partial update into the options. A rejected update changes
    /// nothing.
    ///
    /// # Errors
    ///
    /// [`NonceError::InvalidConfigValue`] when a value fails validation.
    #[instrument(skip_all)]
    pub fn configure(&self, patch: &NonceOptionsPatch) -> Result<(), NonceError> {
        let mut guard = self.options.write().unwrap_or_else(PoisonError::into_inner);
        let merged = patch.apply(&guard)?;
        *guard = Arc::new(merged);
        drop(guard);

        metrics::record_config_change("configure");
        info!(
            token_name = patch.token_name.is_some(),
            default_action = patch.default_action.is_some(),
            lifetime_seconds = ?patch.lifetime_seconds,
            "Nonce options updated"
        );
        Ok(())
    }

    /// Set a single option by name.
    ///
    /// # Errors
    ///
    /// [`NonceError::InvalidConfigKey`] for unknown keys,
    /// [`NonceError::InvalidConfigValue`] for bad values.
    pub fn set_option(&self, key: &str, value: impl Into<OptionValue>) -> Result<(), NonceError> {
        self.configure(&NonceOptionsPatch::default().set(key, value)?)
    }

    /// Merge options from a JSON object.
    ///
    /// # Errors
    ///
    /// Same as [`NonceOptionsPatch::from_json`] and [`Self::configure`].
    pub fn configure_json(&self, value: &serde_json::Value) -> Result<(), NonceError> {
        self.configure(&NonceOptionsPatch::from_json(value)?)
    }

    /// Restore the default options and forget the last issued token.
    #[instrument(skip_all)]
    pub fn reset(&self) {
        *self.options.write().unwrap_or_else(PoisonError::into_inner) =
            Arc::new(NonceOptions::default());
        self.last_issued.store(Arc::new(None));

        metrics::record_config_change("reset");
        info!("Nonce options reset");
    }

    /// Issue a nonce for `action` bound to `subject`.
    ///
    /// # Errors
    ///
    /// [`NonceError::InvalidSubject`] when `subject` is empty.
    pub fn issue(&self, action: impl Into<Action>, subject: &str) -> Result<String, NonceError> {
        let options = self.options();
        self.issue_with(&options, &action.into(), subject)
    }

    /// Check `token` for `action` and `subject`. When `token` is `None` or
    /// empty, the last issued token is checked instead.
    pub fn verify(
        &self,
        token: Option<&str>,
        action: impl Into<Action>,
        subject: &str,
    ) -> Verification {
        let options = self.options();
        let presented = match token {
            Some(t) if !t.is_empty() => t.to_owned(),
            _ => self.last_issued().unwrap_or_default(),
        };
        self.check(&options, &presented, &action.into(), subject)
    }

    /// Return `base_url` with a freshly issued nonce in its query string.
    ///
    /// # Errors
    ///
    /// [`NonceError::InvalidUrl`] for an unparseable URL,
    /// [`NonceError::InvalidSubject`] for an empty subject.
    pub fn decorate_url(
        &self,
        base_url: &str,
        action: impl Into<Action>,
        subject: &str,
        token_name: Option<&str>,
    ) -> Result<String, NonceError> {
        let mut url = Url::parse(base_url)?;
        let options = self.options();
        let token = self.issue_with(&options, &action.into(), subject)?;
        let name = field_name(&options, token_name);

        transport::set_token(&mut url, name, &token);
        Ok(url.into())
    }

    /// Hidden-field payload carrying a fresh nonce. When `referer` is given
    /// it is included unchanged as the companion field.
    ///
    /// # Errors
    ///
    /// [`NonceError::InvalidSubject`] for an empty subject.
    pub fn render_field(
        &self,
        action: impl Into<Action>,
        subject: &str,
        token_name: Option<&str>,
        referer: Option<&str>,
    ) -> Result<FormField, NonceError> {
        let options = self.options();
        let token = self.issue_with(&options, &action.into(), subject)?;

        Ok(FormField {
            field_name: field_name(&options, token_name).to_owned(),
            field_value: token,
            companion: referer.map(CompanionField::referer),
        })
    }

    /// Verify the nonce carried in request parameters.
    ///
    /// With `field` set, only that parameter is consulted. Otherwise the
    /// configured token name is tried first, then the AJAX fallback field.
    pub fn verify_params<I, K, V>(
        &self,
        params: I,
        action: impl Into<Action>,
        subject: &str,
        field: Option<&str>,
    ) -> Verification
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let options = self.options();
        let presented = match field.filter(|f| !f.is_empty()) {
            Some(name) => transport::find_token(params, &[name]),
            None => transport::find_token(params, &[options.token_name.as_str(), AJAX_FIELD_NAME]),
        };
        self.check(
            &options,
            presented.as_deref().unwrap_or_default(),
            &action.into(),
            subject,
        )
    }

    /// Verify the nonce carried in the query string of `url`.
    pub fn verify_url(
        &self,
        url: &str,
        action: impl Into<Action>,
        subject: &str,
        field: Option<&str>,
    ) -> Verification {
        match transport::query_pairs(url) {
            Some(pairs) => self.verify_params(pairs, action, subject, field),
            None => {
                debug!("Unparseable URL presented for nonce verification");
                self.record_outcome(&self.options(), &action.into(), Verification::Invalid)
            }
        }
    }

    fn issue_with(
        &self,
        options: &NonceOptions,
        action: &Action,
        subject: &str,
    ) -> Result<String, NonceError> {
        if subject.is_empty() {
            return Err(NonceError::InvalidSubject);
        }

        let action = action.resolve(&options.default_action);
        let window = window_for(self.clock.now(), options.lifetime_seconds);
        let token = self.key.derive(subject, action, window);

        self.last_issued.store(Arc::new(Some(token.clone())));

        metrics::record_nonce_issued();
        debug!(action = %action, window, "Issued nonce");
        Ok(token)
    }

    fn check(
        &self,
        options: &NonceOptions,
        presented: &str,
        action: &Action,
        subject: &str,
    ) -> Verification {
        if subject.is_empty() {
            return self.record_outcome(options, action, Verification::Invalid);
        }

        let resolved = action.resolve(&options.default_action);
        let window = window_for(self.clock.now(), options.lifetime_seconds);
        let current = self.key.derive(subject, resolved, window);
        let previous = self.key.derive(subject, resolved, window.saturating_sub(1));

        // Both comparisons always run; only their combined result branches.
        let fresh = NonceKey::matches(&current, presented);
        let stale = NonceKey::matches(&previous, presented) & !fresh;

        let outcome = if bool::from(fresh) {
            Verification::Fresh
        } else if bool::from(stale) {
            Verification::Stale
        } else {
            Verification::Invalid
        };
        self.record_outcome(options, action, outcome)
    }

    fn record_outcome(
        &self,
        options: &NonceOptions,
        action: &Action,
        outcome: Verification,
    ) -> Verification {
        metrics::record_verification(outcome.as_str());
        let action = action.resolve(&options.default_action);
        match outcome {
            Verification::Invalid => warn!(action = %action, "Nonce verification failed"),
            _ => debug!(action = %action, outcome = %outcome, "Nonce verified"),
        }
        outcome
    }
}

impl std::fmt::Debug for NonceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceService")
            .field("token_length", &self.key.token_length())
            .field("options", &self.options())
            .finish_non_exhaustive()
    }
}

fn field_name<'a>(options: &'a NonceOptions, explicit: Option<&'a str>) -> &'a str {
    explicit
        .filter(|n| !n.is_empty())
        .unwrap_or(&options.token_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{DEFAULT_LIFETIME_SECONDS, ENV_LOCK};
    use std::env;

    const LIFETIME: i64 = DEFAULT_LIFETIME_SECONDS as i64;
    // Start of window 40_000.
    const T0: i64 = 40_000 * LIFETIME;

    fn service_at(now: i64) -> (NonceService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        let secret = NonceSecret::new(b"service-unit-test-secret-0123456789".to_vec()).unwrap();
        let service = NonceService::builder(secret)
            .clock(clock.clone())
            .build()
            .unwrap();
        (service, clock)
    }

    #[test]
    fn test_issue_then_verify_fresh() {
        let (service, _) = service_at(T0);
        let token = service.issue("save-post", "session-1").unwrap();
        assert_eq!(token.len(), DEFAULT_TOKEN_LENGTH);
        assert_eq!(
            service.verify(Some(token.as_str()), "save-post", "session-1"),
            Verification::Fresh
        );
    }

    #[test]
    fn test_window_progression() {
        let (service, clock) = service_at(T0 + 5);
        let token = service.issue("edit", "s").unwrap();

        clock.set(T0 + LIFETIME);
        assert_eq!(service.verify(Some(token.as_str()), "edit", "s"), Verification::Stale);

        clock.set(T0 + 2 * LIFETIME);
        assert_eq!(service.verify(Some(token.as_str()), "edit", "s"), Verification::Invalid);
    }

    #[test]
    fn test_empty_subject_rejected_on_issue() {
        let (service, _) = service_at(T0);
        assert_eq!(service.issue("edit", ""), Err(NonceError::InvalidSubject));
        assert!(service.last_issued().is_none());
    }

    #[test]
    fn test_empty_subject_is_invalid_on_verify() {
        let (service, _) = service_at(T0);
        let token = service.issue("edit", "s").unwrap();
        assert_eq!(service.verify(Some(token.as_str()), "edit", ""), Verification::Invalid);
    }

    #[test]
    fn test_default_action_fills_in() {
        let (service, _) = service_at(T0);
        let implicit = service.issue(Action::unspecified(), "s").unwrap();
        let explicit = service.issue("-1", "s").unwrap();
        assert_eq!(implicit, explicit);
        assert_eq!(service.verify(Some(implicit.as_str()), "", "s"), Verification::Fresh);
    }

    #[test]
    fn test_multipart_action_matches_joined_string() {
        let (service, _) = service_at(T0);
        let token = service.issue(["delete-post", "42"], "s").unwrap();
        assert_eq!(
            service.verify(Some(token.as_str()), "delete-post-42", "s"),
            Verification::Fresh
        );
    }

    #[test]
    fn test_verify_falls_back_to_last_issued() {
        let (service, _) = service_at(T0);
        service.issue("edit", "s").unwrap();
        assert_eq!(service.verify(None, "edit", "s"), Verification::Fresh);
        assert_eq!(service.verify(Some(""), "edit", "s"), Verification::Fresh);

        service.reset();
        assert_eq!(service.verify(None, "edit", "s"), Verification::Invalid);
    }

    #[test]
    fn test_malformed_token_is_invalid() {
        let (service, _) = service_at(T0);
        for bad in ["", "x", "%%%%%%%%%%", "a-very-long-token-that-cannot-match-anything"] {
            assert_eq!(service.verify(Some(bad), "edit", "s"), Verification::Invalid);
        }
    }

    #[test]
    fn test_configure_rejects_unknown_key_and_keeps_state() {
        let (service, _) = service_at(T0);
        let before = service.options();
        let err = service.set_option("nonce_life", 60i64).unwrap_err();
        assert_eq!(err, NonceError::InvalidConfigKey("nonce_life".into()));
        assert_eq!(service.options(), before);
    }

    #[test]
    fn test_configure_is_all_or_nothing() {
        let (service, _) = service_at(T0);
        let patch = NonceOptionsPatch::default()
            .with_token_name("_csrf")
            .with_lifetime_seconds(0);
        assert!(service.configure(&patch).is_err());
        assert_eq!(service.options().token_name, "_nonce");
    }

    #[test]
    fn test_reset_restores_defaults() {
        let (service, _) = service_at(T0);
        service.set_option("lifetime_seconds", 60i64).unwrap();
        service.set_option("token_name", "_csrf").unwrap();
        assert_eq!(service.options().lifetime_seconds, 60);

        service.reset();
        assert_eq!(*service.options(), NonceOptions::default());
    }

    #[test]
    fn test_reset_ignores_builder_options() {
        let options = NonceOptions {
            lifetime_seconds: 60,
            ..NonceOptions::default()
        };
        let secret = NonceSecret::new(b"service-unit-test-secret-0123456789".to_vec()).unwrap();
        let service = NonceService::builder(secret)
            .clock(Arc::new(ManualClock::new(T0)))
            .options(options)
            .build()
            .unwrap();
        assert_eq!(service.options().lifetime_seconds, 60);

        service.reset();
        assert_eq!(*service.options(), NonceOptions::default());
    }

    #[test]
    fn test_from_env_applies_options_and_tracing() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        for var in ["NONCE_DEFAULT_ACTION", "NONCE_TOKEN_LENGTH", "NONCE_SECRET"] {
            env::remove_var(var);
        }
        env::set_var("NONCE_LIFETIME", "600");
        env::set_var("NONCE_TOKEN_NAME", "_csrf");

        let service = NonceService::from_env();
        env::remove_var("NONCE_LIFETIME");
        env::remove_var("NONCE_TOKEN_NAME");

        let service = service.unwrap();
        assert_eq!(service.options().lifetime_seconds, 600);
        assert_eq!(service.options().token_name, "_csrf");
        // A subscriber is in place, so a second installation is refused.
        assert!(!rust_common::init_tracing(&rust_common::TracingConfig::default()));
    }

    #[test]
    fn test_unrelated_config_change_keeps_tokens_valid() {
        let (service, _) = service_at(T0);
        let token = service.issue("edit", "s").unwrap();
        service
            .configure_json(&serde_json::json!({ "token_name": "_csrf", "default_action": "x" }))
            .unwrap();
        assert_eq!(service.verify(Some(token.as_str()), "edit", "s"), Verification::Fresh);
    }

    #[test]
    fn test_decorate_url_uses_configured_name() {
        let (service, _) = service_at(T0);
        let url = service
            .decorate_url("https://x.test/a?b=1", "act", "sub", None)
            .unwrap();
        let token = service.last_issued().unwrap();
        assert_eq!(url, format!("https://x.test/a?b=1&_nonce={token}"));
    }

    #[test]
    fn test_decorate_url_invalid_url_issues_nothing() {
        let (service, _) = service_at(T0);
        let err = service.decorate_url("::not a url::", "act", "sub", None).unwrap_err();
        assert!(matches!(err, NonceError::InvalidUrl(_)));
        assert!(service.last_issued().is_none());
    }

    #[test]
    fn test_decorated_url_verifies() {
        let (service, _) = service_at(T0);
        let url = service
            .decorate_url("https://x.test/a?b=1", "act", "sub", Some("_token"))
            .unwrap();
        assert_eq!(
            service.verify_url(&url, "act", "sub", Some("_token")),
            Verification::Fresh
        );
        assert_eq!(service.verify_url(&url, "act", "sub", None), Verification::Invalid);
    }

    #[test]
    fn test_verify_url_unparseable_is_invalid() {
        let (service, _) = service_at(T0);
        let token = service.issue("act", "sub").unwrap();
        let url = format!("not a url?_nonce={token}");
        assert_eq!(service.verify_url(&url, "act", "sub", None), Verification::Invalid);
        assert_eq!(service.verify_url("", "act", "sub", None), Verification::Invalid);
    }

    #[test]
    fn test_render_field() {
        let (service, _) = service_at(T0);
        let field = service
            .render_field("save", "s", None, Some("https://x.test/form?id=3"))
            .unwrap();
        assert_eq!(field.field_name, "_nonce");
        assert_eq!(service.verify(Some(field.field_value.as_str()), "save", "s"), Verification::Fresh);

        let companion = field.companion.unwrap();
        assert_eq!(companion.field_name, "_http_referer");
        assert_eq!(companion.field_value, "https://x.test/form?id=3");

        let bare = service.render_field("save", "s", Some("_csrf"), None).unwrap();
        assert_eq!(bare.field_name, "_csrf");
        assert!(bare.companion.is_none());
    }

    #[test]
    fn test_verify_params_ajax_fallback() {
        let (service, _) = service_at(T0);
        let token = service.issue("poll", "s").unwrap();
        let params = vec![("_ajax_nonce".to_string(), token.clone())];
        assert_eq!(service.verify_params(params, "poll", "s", None), Verification::Fresh);

        let params = vec![("_ajax_nonce", token.as_str())];
        assert_eq!(
            service.verify_params(params, "poll", "s", Some("_nonce")),
            Verification::Invalid
        );
    }

    #[test]
    fn test_verify_params_missing_token_ignores_last_issued() {
        let (service, _) = service_at(T0);
        service.issue("poll", "s").unwrap();
        let params: Vec<(&str, &str)> = Vec::new();
        assert_eq!(service.verify_params(params, "poll", "s", None), Verification::Invalid);
    }

    #[test]
    fn test_lifetime_change_moves_window_boundaries() {
        let (service, clock) = service_at(T0);
        service.set_option("lifetime_seconds", 60i64).unwrap();
        let token = service.issue("edit", "s").unwrap();

        clock.advance(60);
        assert_eq!(service.verify(Some(token.as_str()), "edit", "s"), Verification::Stale);
        clock.advance(60);
        assert_eq!(service.verify(Some(token.as_str()), "edit", "s"), Verification::Invalid);
    }

    #[test]
    fn test_service_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NonceService>();
    }
}
