//! WS-Federation and WS-Trust protocol constants
//!
//! Parameter names and action values come from the WS-Federation passive
//! requestor profile. Namespace URIs are the two WS-Trust revisions an
//! identity provider may use for the `RequestSecurityTokenResponse` envelope.

/// WS-Trust 1.3 (OASIS) namespace
pub const WS_TRUST_13_NS: &str = "http://docs.oasis-open.org/ws-sx/ws-trust/200512";

/// WS-Trust February 2005 namespace
pub const WS_TRUST_2005_02_NS: &str = "http://schemas.xmlsoap.org/ws/2005/02/trust";

/// WS-Security utility namespace (`wsu:Created`, `wsu:Expires`)
pub const WSU_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";

/// Action parameter
pub const PARAM_ACTION: &str = "wa";
/// Reply URL parameter
pub const PARAM_REPLY: &str = "wreply";
/// Token response parameter posted back by the identity provider
pub const PARAM_RESULT: &str = "wresult";
/// Opaque relying-party context parameter
pub const PARAM_CONTEXT: &str = "wctx";
/// Target realm parameter
pub const PARAM_TREALM: &str = "wtrealm";
/// Authentication type hint parameter
pub const PARAM_AUTH_TYPE: &str = "wauth";
/// Home realm parameter
pub const PARAM_HOME_REALM: &str = "whr";

/// Sign-in action value
pub const ACTION_SIGNIN: &str = "wsignin1.0";
/// Sign-out action value
pub const ACTION_SIGNOUT: &str = "wsignout1.0";

/// Local name of the collection wrapper
pub const RSTR_COLLECTION_LN: &str = "RequestSecurityTokenResponseCollection";
/// Local name of the response envelope
pub const RSTR_LN: &str = "RequestSecurityTokenResponse";
/// Local name of the token wrapper
pub const REQUESTED_SECURITY_TOKEN_LN: &str = "RequestedSecurityToken";
/// Local name of the validity window
pub const LIFETIME_LN: &str = "Lifetime";
/// Local name of the declared token type
pub const TOKEN_TYPE_LN: &str = "TokenType";
/// Local name of the lifetime start
pub const CREATED_LN: &str = "Created";
/// Local name of the lifetime end
pub const EXPIRES_LN: &str = "Expires";

/// Whether `namespace` is one of the recognized WS-Trust namespaces.
pub fn is_ws_trust_namespace(namespace: Option<&str>) -> bool {
    matches!(namespace, Some(WS_TRUST_13_NS) | Some(WS_TRUST_2005_02_NS))
}
