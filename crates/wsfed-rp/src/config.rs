//! Relying-party configuration
//!
//! [`FederationConfig`] is built once at startup and shared read-only across
//! requests (typically behind an `Arc`). Static values can be loaded from a
//! settings file through [`FederationSettings`]; validators, the replay cache
//! and dynamic resolvers are attached on the builder.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ResolverError;
use crate::replay::{MemoryReplayCache, TokenReplayCache};
use crate::signin::AuthRequest;
use crate::validator::TokenValidator;

/// Callback resolving a configuration value per request
pub trait ValueResolver: Send + Sync {
    /// Resolve the value for the given request
    ///
    /// # Errors
    ///
    /// Returns a [`ResolverError`] when no value can be produced for `request`.
    fn resolve(&self, request: &AuthRequest) -> Result<String, ResolverError>;
}

impl<F> ValueResolver for F
where
    F: Fn(&AuthRequest) -> Result<String, ResolverError> + Send + Sync,
{
    fn resolve(&self, request: &AuthRequest) -> Result<String, ResolverError> {
        self(request)
    }
}

/// Configuration value that is either fixed or resolved per request
#[derive(Clone)]
pub enum ConfigValue {
    /// Fixed value
    Static(String),
    /// Value computed from the inbound request
    Dynamic(Arc<dyn ValueResolver>),
}

impl ConfigValue {
    /// Wrap a resolver callback
    pub fn dynamic<F>(resolver: F) -> Self
    where
        F: Fn(&AuthRequest) -> Result<String, ResolverError> + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(resolver))
    }

    /// Resolve the value for `request`
    ///
    /// # Errors
    ///
    /// Propagates the resolver's error for [`ConfigValue::Dynamic`]; static
    /// values never fail.
    pub fn resolve(&self, request: &AuthRequest) -> Result<String, ResolverError> {
        match self {
            Self::Static(value) => Ok(value.clone()),
            Self::Dynamic(resolver) => resolver.resolve(request),
        }
    }
}

impl fmt::Debug for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(<resolver>)"),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::Static(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::Static(value)
    }
}

/// What to do with a token whose lifetime window does not contain the
/// current time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryPolicy {
    /// Log a warning and report the status on the response
    #[default]
    Warn,
    /// Fail the sign-in
    Reject,
}

/// Relying-party configuration
///
/// Use [`FederationConfig::builder`] for construction.
///
/// # Example
///
/// ```rust
/// use wsfed_rp::{ConfigValue, FederationConfig};
///
/// let config = FederationConfig::builder()
///     .realm("https://app.example.com/")
///     .issuer("https://sts.example.com/adfs/ls/")
///     .home_realm(ConfigValue::dynamic(|request| {
///         Ok(request.parameter("idp").unwrap_or_default().to_string())
///     }))
///     .build();
///
/// assert!(config.detect_replayed_tokens);
/// ```
#[derive(Debug, Clone)]
pub struct FederationConfig {
    /// Realm sent as `wtrealm`; derived from the request when unset
    pub realm: Option<String>,
    /// Identity provider sign-in URL
    pub issuer: Option<ConfigValue>,
    /// Home realm hint sent as `whr`
    pub home_realm: Option<ConfigValue>,
    /// Authentication type hint sent as `wauth`
    pub authentication_type: Option<ConfigValue>,
    /// Evaluate the asserted token lifetime
    pub detect_expired_tokens: bool,
    /// Reject token ids that were already accepted
    pub detect_replayed_tokens: bool,
    /// Handling of lifetime violations
    pub expiry_policy: ExpiryPolicy,
    /// Tolerance applied to both lifetime bounds and replay TTLs
    pub max_clock_skew: Duration,
    /// Audiences this relying party accepts (enforced by validators)
    pub audience_uris: Vec<String>,
    /// Validators in selection order
    pub token_validators: Vec<Arc<dyn TokenValidator>>,
    /// Store of accepted token ids
    pub replay_cache: Arc<dyn TokenReplayCache>,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            realm: None,
            issuer: None,
            home_realm: None,
            authentication_type: None,
            detect_expired_tokens: true,
            detect_replayed_tokens: true,
            expiry_policy: ExpiryPolicy::Warn,
            max_clock_skew: Duration::ZERO,
            audience_uris: Vec::new(),
            token_validators: Vec::new(),
            replay_cache: Arc::new(MemoryReplayCache::new()),
        }
    }
}

impl FederationConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> FederationConfigBuilder {
        FederationConfigBuilder::default()
    }

    /// Clock skew as a signed `chrono` duration
    pub(crate) fn clock_skew(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.max_clock_skew).unwrap_or(chrono::Duration::MAX)
    }
}

/// Static relying-party settings, as loaded from a configuration file
///
/// ```rust
/// use wsfed_rp::{ExpiryPolicy, FederationSettings};
///
/// let settings: FederationSettings = serde_json::from_str(
///     r#"{ "issuer": "https://sts.example.com/", "expiry_policy": "reject" }"#,
/// ).unwrap();
/// assert_eq!(settings.expiry_policy, ExpiryPolicy::Reject);
/// assert!(settings.detect_expired_tokens);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationSettings {
    /// Realm sent as `wtrealm`
    #[serde(default)]
    pub realm: Option<String>,
    /// Identity provider sign-in URL
    #[serde(default)]
    pub issuer: Option<String>,
    /// Home realm hint
    #[serde(default)]
    pub home_realm: Option<String>,
    /// Authentication type hint
    #[serde(default)]
    pub authentication_type: Option<String>,
    /// Evaluate the asserted token lifetime
    #[serde(default = "default_true")]
    pub detect_expired_tokens: bool,
    /// Reject token ids that were already accepted
    #[serde(default = "default_true")]
    pub detect_replayed_tokens: bool,
    /// Handling of lifetime violations
    #[serde(default)]
    pub expiry_policy: ExpiryPolicy,
    /// Clock skew tolerance in seconds
    #[serde(default)]
    pub max_clock_skew_secs: u64,
    /// Accepted audiences
    #[serde(default)]
    pub audience_uris: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for FederationSettings {
    fn default() -> Self {
        Self {
            realm: None,
            issuer: None,
            home_realm: None,
            authentication_type: None,
            detect_expired_tokens: true,
            detect_replayed_tokens: true,
            expiry_policy: ExpiryPolicy::Warn,
            max_clock_skew_secs: 0,
            audience_uris: Vec::new(),
        }
    }
}

/// Builder for [`FederationConfig`]
#[derive(Debug, Clone, Default)]
pub struct FederationConfigBuilder {
    realm: Option<String>,
    issuer: Option<ConfigValue>,
    home_realm: Option<ConfigValue>,
    authentication_type: Option<ConfigValue>,
    detect_expired_tokens: Option<bool>,
    detect_replayed_tokens: Option<bool>,
    expiry_policy: Option<ExpiryPolicy>,
    max_clock_skew: Option<Duration>,
    audience_uris: Vec<String>,
    token_validators: Vec<Arc<dyn TokenValidator>>,
    replay_cache: Option<Arc<dyn TokenReplayCache>>,
}

impl FederationConfigBuilder {
    /// Seed a builder from static settings
    #[must_use]
    pub fn from_settings(settings: FederationSettings) -> Self {
        Self {
            realm: settings.realm,
            issuer: settings.issuer.map(ConfigValue::Static),
            home_realm: settings.home_realm.map(ConfigValue::Static),
            authentication_type: settings.authentication_type.map(ConfigValue::Static),
            detect_expired_tokens: Some(settings.detect_expired_tokens),
            detect_replayed_tokens: Some(settings.detect_replayed_tokens),
            expiry_policy: Some(settings.expiry_policy),
            max_clock_skew: Some(Duration::from_secs(settings.max_clock_skew_secs)),
            audience_uris: settings.audience_uris,
            ..Self::default()
        }
    }

    /// Set an explicit realm
    #[must_use]
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Set the identity provider sign-in URL
    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<ConfigValue>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Set the home realm hint
    #[must_use]
    pub fn home_realm(mut self, home_realm: impl Into<ConfigValue>) -> Self {
        self.home_realm = Some(home_realm.into());
        self
    }

    /// Set the authentication type hint
    #[must_use]
    pub fn authentication_type(mut self, authentication_type: impl Into<ConfigValue>) -> Self {
        self.authentication_type = Some(authentication_type.into());
        self
    }

    /// Enable or disable lifetime evaluation
    #[must_use]
    pub fn detect_expired_tokens(mut self, enabled: bool) -> Self {
        self.detect_expired_tokens = Some(enabled);
        self
    }

    /// Enable or disable replay detection
    #[must_use]
    pub fn detect_replayed_tokens(mut self, enabled: bool) -> Self {
        self.detect_replayed_tokens = Some(enabled);
        self
    }

    /// Set the handling of lifetime violations
    #[must_use]
    pub fn expiry_policy(mut self, policy: ExpiryPolicy) -> Self {
        self.expiry_policy = Some(policy);
        self
    }

    /// Set the clock skew tolerance
    #[must_use]
    pub fn max_clock_skew(mut self, skew: Duration) -> Self {
        self.max_clock_skew = Some(skew);
        self
    }

    /// Add an accepted audience
    #[must_use]
    pub fn audience_uri(mut self, audience: impl Into<String>) -> Self {
        self.audience_uris.push(audience.into());
        self
    }

    /// Append a token validator; validators are tried in insertion order
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn TokenValidator>) -> Self {
        self.token_validators.push(validator);
        self
    }

    /// Replace the validator list
    #[must_use]
    pub fn token_validators(mut self, validators: Vec<Arc<dyn TokenValidator>>) -> Self {
        self.token_validators = validators;
        self
    }

    /// Use a specific replay cache backend
    #[must_use]
    pub fn replay_cache(mut self, cache: Arc<dyn TokenReplayCache>) -> Self {
        self.replay_cache = Some(cache);
        self
    }

    /// Build the configuration
    ///
    /// Without an explicit replay cache a fresh [`MemoryReplayCache`] is used.
    /// It drops expired token ids on its own every
    /// [`DEFAULT_PURGE_INTERVAL`](crate::replay::DEFAULT_PURGE_INTERVAL)
    /// accepted tokens.
    #[must_use]
    pub fn build(self) -> FederationConfig {
        let defaults = FederationConfig::default();
        FederationConfig {
            realm: self.realm,
            issuer: self.issuer,
            home_realm: self.home_realm,
            authentication_type: self.authentication_type,
            detect_expired_tokens: self
                .detect_expired_tokens
                .unwrap_or(defaults.detect_expired_tokens),
            detect_replayed_tokens: self
                .detect_replayed_tokens
                .unwrap_or(defaults.detect_replayed_tokens),
            expiry_policy: self.expiry_policy.unwrap_or(defaults.expiry_policy),
            max_clock_skew: self.max_clock_skew.unwrap_or(defaults.max_clock_skew),
            audience_uris: self.audience_uris,
            token_validators: self.token_validators,
            replay_cache: self.replay_cache.unwrap_or(defaults.replay_cache),
        }
    }
}
