//! Sign-in response processing
//!
//! The processor is the security boundary of the relying party: it locates the
//! issued token inside the WS-Trust response envelope, hands it to the
//! configured validator, enforces the lifetime policy and records the token id
//! so it cannot be presented twice.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::config::{ExpiryPolicy, FederationConfig};
use crate::error::FederationError;
use crate::lifetime::{Lifetime, LifetimeStatus};
use crate::protocol::{
    ACTION_SIGNIN, LIFETIME_LN, PARAM_RESULT, REQUESTED_SECURITY_TOKEN_LN, RSTR_COLLECTION_LN,
    RSTR_LN, TOKEN_TYPE_LN, is_ws_trust_namespace,
};
use crate::response::AuthResponse;
use crate::signin::{self, AuthRequest, FederationRequest};
use crate::validator;
use crate::xml::{XmlElement, parse_document};

/// Minimum time a token id is remembered by the replay cache
pub const MIN_REPLAY_TTL: Duration = Duration::from_secs(60);

/// Relying-party protocol processor
///
/// Stateless; all state lives in the [`FederationConfig`] passed to each call,
/// so one processor can serve any number of concurrent requests.
///
/// # Example
///
/// ```rust,no_run
/// use wsfed_rp::{FederationConfig, FederationProcessor, FederationRequest};
///
/// # fn handle(body: &[u8], config: &FederationConfig) -> wsfed_rp::Result<()> {
/// let request = FederationRequest::from_form_body(body)?;
/// let response = FederationProcessor::new().process_request(&request, config)?;
/// println!("signed in as {}", response.subject);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FederationProcessor;

impl FederationProcessor {
    /// Create a processor
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Dispatch a decoded identity provider POST on its `wa` action.
    ///
    /// # Errors
    ///
    /// * [`FederationError::UnsupportedAction`] for any action other than
    ///   `wsignin1.0`
    /// * [`FederationError::MissingParameter`] when a sign-in carries no
    ///   `wresult`
    /// * any error of [`process_sign_in_response`](Self::process_sign_in_response)
    pub fn process_request(
        &self,
        request: &FederationRequest,
        config: &FederationConfig,
    ) -> Result<AuthResponse> {
        debug!(action = %request.wa, has_context = request.wctx.is_some(), "Processing federation request");
        match request.wa.as_str() {
            ACTION_SIGNIN => {
                let wresult = request
                    .wresult
                    .as_deref()
                    .ok_or(FederationError::MissingParameter(PARAM_RESULT))?;
                self.process_sign_in_response(wresult.as_bytes(), config)
            }
            other => {
                warn!(action = other, "Unsupported federation action");
                Err(FederationError::UnsupportedAction(other.to_string()))
            }
        }
    }

    /// Process a sign-in response envelope against the current time.
    ///
    /// # Errors
    ///
    /// See [`process_sign_in_response_at`](Self::process_sign_in_response_at).
    pub fn process_sign_in_response(
        &self,
        body: &[u8],
        config: &FederationConfig,
    ) -> Result<AuthResponse> {
        self.process_sign_in_response_at(body, config, Utc::now())
    }

    /// Process a sign-in response envelope, evaluating lifetimes at `now`.
    ///
    /// # Errors
    ///
    /// * [`FederationError::MalformedResponse`] if the body is not well-formed XML
    /// * [`FederationError::UnexpectedElement`] if the envelope root is not a
    ///   (collection-wrapped) `RequestSecurityTokenResponse`
    /// * [`FederationError::MissingToken`] if no issued token is present
    /// * [`FederationError::TokenExpired`] / [`FederationError::TokenNotYetValid`]
    ///   under [`ExpiryPolicy::Reject`]
    /// * [`FederationError::NoValidatorAvailable`] / [`FederationError::TokenValidationFailed`]
    /// * [`FederationError::ReplayDetected`] if the token id was accepted before
    /// * [`FederationError::ReplayCacheFailure`] if the replay cache fails
    pub fn process_sign_in_response_at(
        &self,
        body: &[u8],
        config: &FederationConfig,
        now: DateTime<Utc>,
    ) -> Result<AuthResponse> {
        let root = parse_document(body).map_err(|e| {
            debug!(error = %e, "Sign-in response is not well-formed");
            FederationError::MalformedResponse {
                reason: e.to_string(),
            }
        })?;

        let rstr = locate_rstr(&root)?;
        let envelope = Envelope::read(rstr);
        let token = envelope.token.ok_or(FederationError::MissingToken)?;
        debug!(
            token = token.local_name(),
            token_type = ?envelope.token_type,
            has_lifetime = envelope.lifetime.is_some(),
            "Located issued token"
        );

        let lifetime = envelope.lifetime.and_then(Lifetime::extract);
        let lifetime_status = check_lifetime(lifetime.as_ref(), config, now)?;

        let validator =
            validator::select(&config.token_validators, envelope.token_type.as_deref(), token)
                .ok_or_else(|| {
                    warn!(token_type = ?envelope.token_type, token = token.local_name(), "No validator available for token");
                    FederationError::NoValidatorAvailable {
                        token_type: envelope.token_type.clone(),
                    }
                })?;

        let result = validator
            .validate_and_process_token(token, config)
            .map_err(|e| {
                warn!(error = %e, "Token validation failed");
                FederationError::TokenValidationFailed(e)
            })?;

        if config.detect_replayed_tokens
            && let Some(token_id) = result.unique_token_id.as_deref().filter(|id| !id.is_empty())
        {
            let expires = lifetime.and_then(|l| l.expires).or(result.expires);
            let ttl = replay_ttl(expires, now, config.clock_skew());
            if !config.replay_cache.insert_if_absent(token_id, ttl)? {
                error!(token_id, subject = %result.subject, "Replay attack with token id");
                return Err(FederationError::ReplayDetected {
                    token_id: token_id.to_string(),
                });
            }
        }

        info!(subject = %result.subject, issuer = %result.issuer, "Sign-in response accepted");
        Ok(AuthResponse::assemble(
            result,
            token.clone(),
            lifetime.and_then(|l| l.created),
            lifetime.and_then(|l| l.expires),
            lifetime_status,
        ))
    }

    /// Build the identity provider redirect URL for `request`.
    ///
    /// # Errors
    ///
    /// See [`signin::create_sign_in_request`].
    pub fn create_sign_in_request(
        &self,
        request: &AuthRequest,
        config: &FederationConfig,
    ) -> Result<String> {
        signin::create_sign_in_request(request, config)
    }
}

/// Protocol children of a `RequestSecurityTokenResponse`
#[derive(Debug, Default)]
struct Envelope<'a> {
    lifetime: Option<&'a XmlElement>,
    token: Option<&'a XmlElement>,
    token_type: Option<String>,
}

impl<'a> Envelope<'a> {
    fn read(rstr: &'a XmlElement) -> Self {
        let mut envelope = Self::default();
        for child in rstr.child_elements() {
            if !is_ws_trust_namespace(child.namespace()) {
                continue;
            }
            match child.local_name() {
                LIFETIME_LN => envelope.lifetime = Some(child),
                REQUESTED_SECURITY_TOKEN_LN => envelope.token = child.first_child_element(),
                TOKEN_TYPE_LN => {
                    let text = child.text_content();
                    let text = text.trim();
                    envelope.token_type = (!text.is_empty()).then(|| text.to_string());
                }
                _ => {}
            }
        }
        envelope
    }
}

fn locate_rstr(root: &XmlElement) -> Result<&XmlElement> {
    let rstr = if root.local_name() == RSTR_COLLECTION_LN {
        root.first_child_element()
            .ok_or_else(|| FederationError::UnexpectedElement(RSTR_COLLECTION_LN.to_string()))?
    } else {
        root
    };

    if rstr.local_name() != RSTR_LN {
        debug!(element = rstr.local_name(), "Unexpected response envelope root");
        return Err(FederationError::UnexpectedElement(
            rstr.local_name().to_string(),
        ));
    }
    Ok(rstr)
}

fn check_lifetime(
    lifetime: Option<&Lifetime>,
    config: &FederationConfig,
    now: DateTime<Utc>,
) -> Result<LifetimeStatus> {
    let Some(lifetime) = lifetime.filter(|_| config.detect_expired_tokens) else {
        return Ok(LifetimeStatus::Unchecked);
    };

    let status = lifetime.evaluate(now, config.clock_skew());
    match (status, config.expiry_policy) {
        (LifetimeStatus::Expired, policy) => {
            warn!(expires = ?lifetime.expires, now = %now, ?policy, "Token already expired");
            if policy == ExpiryPolicy::Reject
                && let Some(expires) = lifetime.expires
            {
                return Err(FederationError::TokenExpired { expires });
            }
        }
        (LifetimeStatus::NotYetValid, policy) => {
            warn!(created = ?lifetime.created, now = %now, ?policy, "Token not yet valid");
            if policy == ExpiryPolicy::Reject
                && let Some(created) = lifetime.created
            {
                return Err(FederationError::TokenNotYetValid { created });
            }
        }
        _ => {}
    }
    Ok(status)
}

/// How long a token id must be remembered: until the token expires (plus
/// skew), never less than [`MIN_REPLAY_TTL`]. `None` keeps the id forever,
/// as does a skew too large to add.
fn replay_ttl(
    expires: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    skew: chrono::Duration,
) -> Option<Duration> {
    let remaining = (expires? - now).checked_add(&skew)?;
    Some(remaining.to_std().unwrap_or(Duration::ZERO).max(MIN_REPLAY_TTL))
}
