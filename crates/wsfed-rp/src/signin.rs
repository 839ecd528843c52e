//! Sign-in redirect construction and inbound request decoding

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use url::{Url, form_urlencoded};

use crate::config::{ConfigValue, FederationConfig};
use crate::error::FederationError;
use crate::protocol::{
    ACTION_SIGNIN, PARAM_ACTION, PARAM_AUTH_TYPE, PARAM_CONTEXT, PARAM_HOME_REALM, PARAM_REPLY,
    PARAM_RESULT, PARAM_TREALM,
};

/// Inbound request context handed to the request builder and to dynamic
/// configuration resolvers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Full URL of the protected resource, without query string
    pub request_url: String,
    /// Application base path (`/app`), empty when deployed at the root
    pub context_path: String,
    /// Value of the inbound `wa` parameter, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Inbound request parameters
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

impl AuthRequest {
    /// Create a request context
    pub fn new(request_url: impl Into<String>, context_path: impl Into<String>) -> Self {
        Self {
            request_url: request_url.into(),
            context_path: context_path.into(),
            action: None,
            parameters: HashMap::new(),
        }
    }

    /// Set the inbound action
    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Add an inbound request parameter
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Look up an inbound request parameter
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }
}

/// Decoded identity provider POST back to the relying party
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationRequest {
    /// Protocol action (`wa`)
    pub wa: String,
    /// Response envelope (`wresult`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wresult: Option<String>,
    /// Opaque context echoed by the identity provider (`wctx`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wctx: Option<String>,
}

impl FederationRequest {
    /// Create a sign-in request carrying `wresult`
    pub fn sign_in(wresult: impl Into<String>) -> Self {
        Self {
            wa: ACTION_SIGNIN.to_string(),
            wresult: Some(wresult.into()),
            wctx: None,
        }
    }

    /// Decode an `application/x-www-form-urlencoded` body.
    ///
    /// Unknown parameters are ignored; for repeated parameters the last value
    /// wins.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::MissingParameter`] when `wa` is absent.
    pub fn from_form_body(body: &[u8]) -> Result<Self, FederationError> {
        let mut wa = None;
        let mut wresult = None;
        let mut wctx = None;

        for (name, value) in form_urlencoded::parse(body) {
            match &*name {
                PARAM_ACTION => wa = Some(value.into_owned()),
                PARAM_RESULT => wresult = Some(value.into_owned()),
                PARAM_CONTEXT => wctx = Some(value.into_owned()),
                _ => {}
            }
        }

        Ok(Self {
            wa: wa.ok_or(FederationError::MissingParameter(PARAM_ACTION))?,
            wresult,
            wctx,
        })
    }
}

/// Build the identity provider redirect URL for an unauthenticated request.
///
/// # Errors
///
/// * [`FederationError::MissingIssuer`] when no issuer is configured or it
///   resolves to an empty string
/// * [`FederationError::RequestBuildFailed`] when a dynamic value cannot be
///   resolved or the realm cannot be derived from the request URL
pub fn create_sign_in_request(
    request: &AuthRequest,
    config: &FederationConfig,
) -> Result<String, FederationError> {
    let issuer = resolve(config.issuer.as_ref(), request, "issuer")?;
    info!(issuer = ?issuer, "Resolved issuer URL");
    let Some(issuer) = issuer else {
        error!(request_url = %request.request_url, "No issuer URL configured");
        return Err(FederationError::MissingIssuer);
    };

    let authentication_type =
        resolve(config.authentication_type.as_ref(), request, "authentication type")?;
    let home_realm = resolve(config.home_realm.as_ref(), request, "home realm")?;
    debug!(wauth = ?authentication_type, whr = ?home_realm, "Resolved sign-in hints");

    let realm = match &config.realm {
        Some(realm) => realm.clone(),
        None => derive_realm(&request.request_url, &request.context_path)?,
    };
    info!(realm = %realm, "Using realm");

    let mut query = format!(
        "{PARAM_ACTION}={ACTION_SIGNIN}&{PARAM_REPLY}={}&{PARAM_TREALM}={}",
        urlencoding::encode(&request.request_url),
        urlencoding::encode(&realm)
    );
    if let Some(wauth) = authentication_type {
        query.push_str(&format!("&{PARAM_AUTH_TYPE}={}", urlencoding::encode(&wauth)));
    }
    if let Some(whr) = home_realm {
        query.push_str(&format!("&{PARAM_HOME_REALM}={}", urlencoding::encode(&whr)));
    }

    let separator = if issuer.contains('?') { '&' } else { '?' };
    Ok(format!("{issuer}{separator}{query}"))
}

/// Derive the realm for an application from its request URL.
///
/// The URL is cut where its path begins; the context path (if any) and a
/// trailing slash are appended: `https://host/app/login` with context path
/// `/app` yields `https://host/app/`.
///
/// # Errors
///
/// Returns [`FederationError::RequestBuildFailed`] when `request_url` is not
/// an absolute hierarchical URL.
pub fn derive_realm(request_url: &str, context_path: &str) -> Result<String, FederationError> {
    let parsed = Url::parse(request_url).map_err(|e| {
        FederationError::request_build(format!("invalid request URL '{request_url}': {e}"))
    })?;
    if parsed.cannot_be_a_base() {
        return Err(FederationError::request_build(format!(
            "request URL '{request_url}' has no authority"
        )));
    }

    let without_query = request_url
        .split(['?', '#'])
        .next()
        .unwrap_or(request_url);
    let authority_start = without_query.find("://").map_or(0, |i| i + 3);
    let base = match without_query[authority_start..].find('/') {
        Some(path_start) => &without_query[..authority_start + path_start],
        None => without_query,
    };

    Ok(format!("{base}{context_path}/"))
}

fn resolve(
    value: Option<&ConfigValue>,
    request: &AuthRequest,
    name: &str,
) -> Result<Option<String>, FederationError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let resolved = value
        .resolve(request)
        .map_err(|e| FederationError::RequestBuildFailed {
            reason: format!("failed to resolve {name}"),
            source: Some(e),
        })?;
    Ok(Some(resolved).filter(|v| !v.is_empty()))
}
