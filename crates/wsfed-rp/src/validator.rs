//! Pluggable token validators
//!
//! A validator owns every trust decision about a token: signature and
//! certificate chain, trusted issuer, audience restriction, token schema. The
//! response processor only locates the token and hands it to the first
//! validator that claims it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::FederationConfig;
use crate::error::ValidatorError;
use crate::xml::XmlElement;

/// Token validator contract
///
/// Validators are consulted in configuration order. When the response declares
/// a `TokenType`, [`can_handle_token_type`](Self::can_handle_token_type) decides;
/// otherwise [`can_handle_token`](Self::can_handle_token) inspects the token
/// element itself.
pub trait TokenValidator: Send + Sync + std::fmt::Debug {
    /// Whether this validator handles tokens of the declared type URI
    fn can_handle_token_type(&self, token_type: &str) -> bool;

    /// Whether this validator handles the given token element
    fn can_handle_token(&self, token: &XmlElement) -> bool;

    /// Verify the token and extract the authenticated identity.
    ///
    /// # Errors
    ///
    /// Returns an error when the token is not trusted. The error is surfaced
    /// unchanged as the source of
    /// [`FederationError::TokenValidationFailed`](crate::FederationError::TokenValidationFailed).
    fn validate_and_process_token(
        &self,
        token: &XmlElement,
        config: &FederationConfig,
    ) -> Result<ValidatorResult, ValidatorError>;
}

/// Claim asserted about the subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Claim type URI
    pub claim_type: String,
    /// Issuer of this claim, if different from the token issuer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Claim values
    pub values: Vec<String>,
}

impl Claim {
    /// Create a single-valued claim
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            issuer: None,
            values: vec![value.into()],
        }
    }
}

/// Identity extracted by a validator from a trusted token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorResult {
    /// Authenticated subject (user name)
    pub subject: String,
    /// Token issuer
    pub issuer: String,
    /// Role names
    #[serde(default)]
    pub roles: Vec<String>,
    /// Remaining claims
    #[serde(default)]
    pub claims: Vec<Claim>,
    /// Audience the token was issued for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    /// Expiry stated inside the token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    /// Unique token id used for replay detection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_token_id: Option<String>,
}

/// Pick the validator for a token: declared type first, token shape otherwise.
pub(crate) fn select<'a>(
    validators: &'a [Arc<dyn TokenValidator>],
    token_type: Option<&str>,
    token: &XmlElement,
) -> Option<&'a Arc<dyn TokenValidator>> {
    validators.iter().find(|validator| match token_type {
        Some(token_type) => validator.can_handle_token_type(token_type),
        None => validator.can_handle_token(token),
    })
}
