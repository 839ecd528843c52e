//! Authentication result of a processed sign-in response

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::lifetime::LifetimeStatus;
use crate::validator::{Claim, ValidatorResult};
use crate::xml::XmlElement;

/// Identity established by a successfully processed sign-in response
///
/// The token element is the issued token itself (for example a SAML
/// `Assertion`), never the `RequestedSecurityToken` wrapper. It is excluded
/// from serialization; `token_xml` carries its exact source text instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthResponse {
    /// Authenticated subject
    pub subject: String,
    /// Token issuer
    pub issuer: String,
    /// Role names
    pub roles: Vec<String>,
    /// Remaining claims
    pub claims: Vec<Claim>,
    /// Audience the token was issued for
    pub audience: Option<String>,
    /// Start of the asserted lifetime
    pub token_created: Option<DateTime<Utc>>,
    /// End of the asserted lifetime, else the validator-reported expiry
    pub token_expires: Option<DateTime<Utc>>,
    /// Issued token element
    #[serde(skip_serializing)]
    pub token: XmlElement,
    /// Exact source text of the token element
    pub token_xml: String,
    /// Unique token id
    pub unique_token_id: Option<String>,
    /// Lifetime evaluation outcome
    pub lifetime_status: LifetimeStatus,
}

impl AuthResponse {
    pub(crate) fn assemble(
        result: ValidatorResult,
        token: XmlElement,
        token_created: Option<DateTime<Utc>>,
        token_expires: Option<DateTime<Utc>>,
        lifetime_status: LifetimeStatus,
    ) -> Self {
        let token_xml = token.outer_xml().to_string();
        Self {
            subject: result.subject,
            issuer: result.issuer,
            roles: result.roles,
            claims: result.claims,
            audience: result.audience,
            token_created,
            token_expires: token_expires.or(result.expires),
            token,
            token_xml,
            unique_token_id: result.unique_token_id,
            lifetime_status,
        }
    }

    /// Whether the subject holds `role`
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// First claim of the given type
    pub fn claim(&self, claim_type: &str) -> Option<&Claim> {
        self.claims.iter().find(|c| c.claim_type == claim_type)
    }

    /// Whether the asserted lifetime was violated (only reported under
    /// [`ExpiryPolicy::Warn`](crate::ExpiryPolicy::Warn))
    pub fn is_lifetime_violation(&self) -> bool {
        self.lifetime_status.is_violation()
    }
}
