//! Common test utilities for integration tests
//!
//! Builders for WS-Trust response envelopes and a configurable token
//! validator standing in for a real SAML validator.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use wsfed_rp::protocol::{WS_TRUST_13_NS, WS_TRUST_2005_02_NS, WSU_NS};
use wsfed_rp::{
    FederationConfig, TokenValidator, ValidatorError, ValidatorResult, XmlElement,
};

pub const SAML2_TOKEN_TYPE: &str = "urn:oasis:names:tc:SAML:2.0:assertion";
pub const SAML1_TOKEN_TYPE: &str = "urn:oasis:names:tc:SAML:1.0:assertion";
pub const SAML2_NS: &str = "urn:oasis:names:tc:SAML:2.0:assertion";

/// 2024-01-01 at the given time
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, hour, minute, 0).unwrap()
}

/// SAML 2.0 assertion carrying an id and a subject
pub fn assertion(id: &str, subject: &str) -> String {
    format!(
        r#"<saml:Assertion xmlns:saml="{SAML2_NS}" ID="{id}" Version="2.0"><saml:Issuer>https://sts.example.com/</saml:Issuer><saml:Subject><saml:NameID>{subject}</saml:NameID></saml:Subject></saml:Assertion>"#
    )
}

/// Builder for `RequestSecurityTokenResponse` documents
#[derive(Debug, Clone)]
pub struct RstrBuilder {
    namespace: &'static str,
    token_type: Option<String>,
    lifetime: Option<(String, String)>,
    token: Option<String>,
    extra_children: Vec<String>,
    collection: bool,
}

impl Default for RstrBuilder {
    fn default() -> Self {
        Self {
            namespace: WS_TRUST_13_NS,
            token_type: Some(SAML2_TOKEN_TYPE.to_string()),
            lifetime: Some((
                "2024-01-01T00:00:00Z".to_string(),
                "2024-01-01T01:00:00.000Z".to_string(),
            )),
            token: Some(assertion("_token-1", "alice")),
            extra_children: Vec::new(),
            collection: false,
        }
    }
}

impl RstrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn legacy_namespace(mut self) -> Self {
        self.namespace = WS_TRUST_2005_02_NS;
        self
    }

    pub fn token_type(mut self, token_type: Option<&str>) -> Self {
        self.token_type = token_type.map(str::to_string);
        self
    }

    pub fn lifetime(mut self, created: &str, expires: &str) -> Self {
        self.lifetime = Some((created.to_string(), expires.to_string()));
        self
    }

    pub fn without_lifetime(mut self) -> Self {
        self.lifetime = None;
        self
    }

    /// Token XML placed inside `RequestedSecurityToken`; `None` leaves the
    /// wrapper empty
    pub fn token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn child(mut self, xml: impl Into<String>) -> Self {
        self.extra_children.push(xml.into());
        self
    }

    pub fn in_collection(mut self) -> Self {
        self.collection = true;
        self
    }

    pub fn build(&self) -> String {
        let mut body = String::new();
        for extra in &self.extra_children {
            body.push_str(extra);
        }
        if let Some(token_type) = &self.token_type {
            body.push_str(&format!("<wst:TokenType>{token_type}</wst:TokenType>"));
        }
        if let Some((created, expires)) = &self.lifetime {
            body.push_str(&format!(
                "<wst:Lifetime><wsu:Created>{created}</wsu:Created><wsu:Expires>{expires}</wsu:Expires></wst:Lifetime>"
            ));
        }
        body.push_str(&format!(
            "<wst:RequestedSecurityToken>{}</wst:RequestedSecurityToken>",
            self.token.as_deref().unwrap_or("")
        ));

        let rstr = format!(
            r#"<wst:RequestSecurityTokenResponse xmlns:wst="{ns}" xmlns:wsu="{WSU_NS}">{body}</wst:RequestSecurityTokenResponse>"#,
            ns = self.namespace
        );
        if self.collection {
            format!(
                r#"<wst:RequestSecurityTokenResponseCollection xmlns:wst="{ns}">{rstr}</wst:RequestSecurityTokenResponseCollection>"#,
                ns = self.namespace
            )
        } else {
            rstr
        }
    }
}

/// What the mock validator does when asked to validate
#[derive(Debug, Clone)]
pub enum Verdict {
    /// Accept; subject taken from `NameID`, id from the `ID` attribute
    Accept,
    /// Accept with a fixed expiry and no id
    AcceptWithoutId,
    /// Reject with the given message
    Reject(&'static str),
}

/// Token validator answering for one token type and one element name
#[derive(Debug)]
pub struct MockValidator {
    pub token_type: &'static str,
    pub element: &'static str,
    pub verdict: Verdict,
    pub calls: AtomicUsize,
}

impl MockValidator {
    pub fn saml2() -> Self {
        Self::new(SAML2_TOKEN_TYPE, "Assertion", Verdict::Accept)
    }

    pub fn new(token_type: &'static str, element: &'static str, verdict: Verdict) -> Self {
        Self {
            token_type,
            element,
            verdict,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TokenValidator for MockValidator {
    fn can_handle_token_type(&self, token_type: &str) -> bool {
        token_type == self.token_type
    }

    fn can_handle_token(&self, token: &XmlElement) -> bool {
        token.local_name() == self.element
    }

    fn validate_and_process_token(
        &self,
        token: &XmlElement,
        config: &FederationConfig,
    ) -> Result<ValidatorResult, ValidatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Verdict::Reject(reason) = self.verdict {
            return Err(reason.into());
        }

        let subject = token
            .first_child_with_name(SAML2_NS, "Subject")
            .and_then(|s| s.first_child_with_name(SAML2_NS, "NameID"))
            .map(|n| n.text_content())
            .unwrap_or_default();
        let issuer = token
            .first_child_with_name(SAML2_NS, "Issuer")
            .map(|n| n.text_content())
            .unwrap_or_default();
        let unique_token_id = match self.verdict {
            Verdict::AcceptWithoutId => None,
            _ => token.attribute("ID").map(str::to_string),
        };

        Ok(ValidatorResult {
            subject,
            issuer,
            roles: vec!["user".to_string()],
            audience: config.audience_uris.first().cloned(),
            expires: Some(at(12, 0)),
            unique_token_id,
            ..ValidatorResult::default()
        })
    }
}

/// Configuration with one SAML 2.0 mock validator
pub fn config_with(validator: Arc<MockValidator>) -> FederationConfig {
    FederationConfig::builder()
        .audience_uri("https://app.example.com/")
        .with_validator(validator)
        .build()
}
