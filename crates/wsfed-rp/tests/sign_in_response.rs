//! Sign-in response processing tests
//!
//! Covers envelope navigation (both WS-Trust namespaces, collection wrapper,
//! foreign children), validator selection, lifetime policy and action
//! dispatch.

mod common;

use std::sync::Arc;

use common::{
    MockValidator, RstrBuilder, SAML1_TOKEN_TYPE, SAML2_TOKEN_TYPE, Verdict, assertion, at,
    config_with,
};
use pretty_assertions::assert_eq;
use wsfed_rp::{
    ExpiryPolicy, FederationConfig, FederationError, FederationProcessor, FederationRequest,
    LifetimeStatus,
};

fn process(
    body: &str,
    config: &FederationConfig,
) -> wsfed_rp::Result<wsfed_rp::AuthResponse> {
    FederationProcessor::new().process_sign_in_response_at(body.as_bytes(), config, at(0, 30))
}

#[test]
fn test_returns_nested_token_not_wrapper() {
    let config = config_with(Arc::new(MockValidator::saml2()));

    let response = process(&RstrBuilder::new().build(), &config).unwrap();

    assert_eq!(response.token.local_name(), "Assertion");
    assert_eq!(response.token_xml, assertion("_token-1", "alice"));
    assert_eq!(response.subject, "alice");
    assert_eq!(response.issuer, "https://sts.example.com/");
    assert_eq!(response.audience.as_deref(), Some("https://app.example.com/"));
    assert_eq!(response.unique_token_id.as_deref(), Some("_token-1"));
    assert_eq!(response.token_created, Some(at(0, 0)));
    assert_eq!(response.token_expires, Some(at(1, 0)));
    assert_eq!(response.lifetime_status, LifetimeStatus::Current);
    assert!(response.has_role("user"));
}

#[test]
fn test_collection_is_processed_like_bare_response() {
    let bare = process(
        &RstrBuilder::new().build(),
        &config_with(Arc::new(MockValidator::saml2())),
    )
    .unwrap();
    let wrapped = process(
        &RstrBuilder::new().in_collection().build(),
        &config_with(Arc::new(MockValidator::saml2())),
    )
    .unwrap();

    assert_eq!(bare.token_xml, wrapped.token_xml);
    assert_eq!(bare.subject, wrapped.subject);
    assert_eq!(bare.unique_token_id, wrapped.unique_token_id);
    assert_eq!(bare.token_created, wrapped.token_created);
    assert_eq!(bare.token_expires, wrapped.token_expires);
    assert_eq!(bare.lifetime_status, wrapped.lifetime_status);
}

#[test]
fn test_only_first_collection_entry_is_considered() {
    let first = RstrBuilder::new().build();
    let second = RstrBuilder::new()
        .token(Some(assertion("_token-2", "mallory")))
        .build();
    let body = format!(
        r#"<wst:RequestSecurityTokenResponseCollection xmlns:wst="{}">{first}{second}</wst:RequestSecurityTokenResponseCollection>"#,
        wsfed_rp::protocol::WS_TRUST_13_NS
    );

    let response = process(&body, &config_with(Arc::new(MockValidator::saml2()))).unwrap();
    assert_eq!(response.subject, "alice");
}

#[test]
fn test_legacy_trust_namespace_is_recognized() {
    let config = config_with(Arc::new(MockValidator::saml2()));
    let response = process(&RstrBuilder::new().legacy_namespace().build(), &config).unwrap();
    assert_eq!(response.subject, "alice");
    assert_eq!(response.token_created, Some(at(0, 0)));
}

#[test]
fn test_wrong_root_is_rejected() {
    let config = config_with(Arc::new(MockValidator::saml2()));
    let body = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"><s:Body/></s:Envelope>"#;

    let err = process(body, &config).unwrap_err();
    assert!(matches!(err, FederationError::UnexpectedElement(ref name) if name == "Envelope"));
}

#[test]
fn test_empty_requested_security_token() {
    let config = config_with(Arc::new(MockValidator::saml2()));
    let err = process(&RstrBuilder::new().token(None).build(), &config).unwrap_err();
    assert!(matches!(err, FederationError::MissingToken));
}

#[test]
fn test_malformed_body() {
    let config = config_with(Arc::new(MockValidator::saml2()));

    for body in ["", "not xml", "<wst:RequestSecurityTokenResponse>", "<a></b>"] {
        let err = process(body, &config).unwrap_err();
        assert!(
            matches!(err, FederationError::MalformedResponse { .. }),
            "expected MalformedResponse for {body:?}, got {err:?}"
        );
    }
}

#[test]
fn test_doctype_is_rejected() {
    let config = config_with(Arc::new(MockValidator::saml2()));
    let body = format!(
        r#"<!DOCTYPE r [<!ENTITY x "boom">]>{}"#,
        RstrBuilder::new().build()
    );
    assert!(matches!(
        process(&body, &config),
        Err(FederationError::MalformedResponse { .. })
    ));
}

#[test]
fn test_foreign_children_are_ignored() {
    let config = config_with(Arc::new(MockValidator::saml2()));
    let body = RstrBuilder::new()
        .child(r#"<x:TokenType xmlns:x="urn:foreign">urn:unknown</x:TokenType>"#)
        .child(r#"<x:RequestedSecurityToken xmlns:x="urn:foreign"><Decoy/></x:RequestedSecurityToken>"#)
        .child("<wst:AppliesTo><Endpoint>https://app.example.com/</Endpoint></wst:AppliesTo>")
        .child("<wst:KeyType>http://docs.oasis-open.org/ws-sx/ws-trust/200512/Bearer</wst:KeyType>")
        .build();

    let response = process(&body, &config).unwrap();
    assert_eq!(response.token.local_name(), "Assertion");
    assert_eq!(response.token_created, Some(at(0, 0)));
}

#[test]
fn test_validator_selected_by_declared_type() {
    let saml1 = Arc::new(MockValidator::new(SAML1_TOKEN_TYPE, "Assertion", Verdict::Accept));
    let saml2 = Arc::new(MockValidator::saml2());
    let config = FederationConfig::builder()
        .with_validator(saml1.clone())
        .with_validator(saml2.clone())
        .build();

    process(&RstrBuilder::new().build(), &config).unwrap();

    assert_eq!(saml1.calls(), 0);
    assert_eq!(saml2.calls(), 1);
}

#[test]
fn test_validator_selected_by_token_shape_without_type() {
    let first = Arc::new(MockValidator::new(SAML1_TOKEN_TYPE, "Assertion", Verdict::Accept));
    let second = Arc::new(MockValidator::saml2());
    let config = FederationConfig::builder()
        .with_validator(first.clone())
        .with_validator(second.clone())
        .build();

    process(&RstrBuilder::new().token_type(None).build(), &config).unwrap();
    process(
        &RstrBuilder::new()
            .token_type(Some("   "))
            .token(Some(assertion("_token-2", "bob")))
            .build(),
        &config,
    )
    .unwrap();

    assert_eq!(first.calls(), 2);
    assert_eq!(second.calls(), 0);
}

#[test]
fn test_no_validator_available() {
    let config = config_with(Arc::new(MockValidator::saml2()));

    let err = process(&RstrBuilder::new().token_type(Some("urn:jwt")).build(), &config).unwrap_err();
    assert!(matches!(
        err,
        FederationError::NoValidatorAvailable { token_type: Some(ref t) } if t == "urn:jwt"
    ));

    let err = process(
        &RstrBuilder::new()
            .token_type(None)
            .token(Some("<BinarySecurityToken/>".to_string()))
            .build(),
        &config,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        FederationError::NoValidatorAvailable { token_type: None }
    ));
}

#[test]
fn test_validator_failure_propagates_cause() {
    let validator = Arc::new(MockValidator::new(
        SAML2_TOKEN_TYPE,
        "Assertion",
        Verdict::Reject("signature does not verify"),
    ));
    let config = config_with(validator);

    let err = process(&RstrBuilder::new().build(), &config).unwrap_err();
    assert!(err.is_security_violation());
    assert_eq!(
        err.to_string(),
        "Token validation failed: signature does not verify"
    );
}

#[test]
fn test_expired_token_warns_by_default() {
    let config = config_with(Arc::new(MockValidator::saml2()));
    let body = RstrBuilder::new().build();

    let response = FederationProcessor::new()
        .process_sign_in_response_at(body.as_bytes(), &config, at(2, 0))
        .unwrap();
    assert_eq!(response.lifetime_status, LifetimeStatus::Expired);
    assert!(response.is_lifetime_violation());
}

#[test]
fn test_not_yet_valid_token_warns_by_default() {
    let config = config_with(Arc::new(MockValidator::saml2()));
    let body = RstrBuilder::new().build();
    let before = chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2023, 12, 31, 23, 0, 0).unwrap();

    let response = FederationProcessor::new()
        .process_sign_in_response_at(body.as_bytes(), &config, before)
        .unwrap();
    assert_eq!(response.lifetime_status, LifetimeStatus::NotYetValid);
}

#[test]
fn test_reject_policy_fails_expired_tokens() {
    let validator = Arc::new(MockValidator::saml2());
    let config = FederationConfig::builder()
        .expiry_policy(ExpiryPolicy::Reject)
        .with_validator(validator.clone())
        .build();
    let body = RstrBuilder::new().build();

    let err = FederationProcessor::new()
        .process_sign_in_response_at(body.as_bytes(), &config, at(2, 0))
        .unwrap_err();
    assert!(matches!(err, FederationError::TokenExpired { expires } if expires == at(1, 0)));
    assert_eq!(validator.calls(), 0, "expired token must not reach the validator");
}

#[test]
fn test_clock_skew_tolerance() {
    let config = FederationConfig::builder()
        .expiry_policy(ExpiryPolicy::Reject)
        .max_clock_skew(std::time::Duration::from_secs(300))
        .with_validator(Arc::new(MockValidator::saml2()))
        .build();
    let body = RstrBuilder::new().build();

    let response = FederationProcessor::new()
        .process_sign_in_response_at(body.as_bytes(), &config, at(1, 4))
        .unwrap();
    assert_eq!(response.lifetime_status, LifetimeStatus::Current);
}

#[test]
fn test_oversized_clock_skew_accepts_without_panicking() {
    let config = FederationConfig::builder()
        .expiry_policy(ExpiryPolicy::Reject)
        .max_clock_skew(std::time::Duration::from_secs(u64::MAX))
        .with_validator(Arc::new(MockValidator::saml2()))
        .build();

    let response = process(&RstrBuilder::new().build(), &config).unwrap();
    assert_eq!(response.lifetime_status, LifetimeStatus::Current);

    let late = FederationProcessor::new()
        .process_sign_in_response_at(
            RstrBuilder::new()
                .token(Some(assertion("_token-2", "alice")))
                .build()
                .as_bytes(),
            &config,
            at(23, 0),
        )
        .unwrap();
    assert_eq!(late.lifetime_status, LifetimeStatus::Current);
}

#[test]
fn test_disabled_expiry_detection() {
    let config = FederationConfig::builder()
        .detect_expired_tokens(false)
        .expiry_policy(ExpiryPolicy::Reject)
        .with_validator(Arc::new(MockValidator::saml2()))
        .build();
    let body = RstrBuilder::new().build();

    let response = FederationProcessor::new()
        .process_sign_in_response_at(body.as_bytes(), &config, at(5, 0))
        .unwrap();
    assert_eq!(response.lifetime_status, LifetimeStatus::Unchecked);
}

#[test]
fn test_unparseable_lifetime_degrades_to_absent() {
    let config = FederationConfig::builder()
        .expiry_policy(ExpiryPolicy::Reject)
        .with_validator(Arc::new(MockValidator::saml2()))
        .build();
    let body = RstrBuilder::new().lifetime("yesterday", "tomorrow").build();

    let response = process(&body, &config).unwrap();
    assert_eq!(response.lifetime_status, LifetimeStatus::Unchecked);
    assert_eq!(response.token_created, None);
    // falls back to the expiry reported by the validator
    assert_eq!(response.token_expires, Some(at(12, 0)));
}

#[test]
fn test_missing_lifetime_is_not_an_error() {
    let config = config_with(Arc::new(MockValidator::saml2()));
    let response = process(&RstrBuilder::new().without_lifetime().build(), &config).unwrap();
    assert_eq!(response.lifetime_status, LifetimeStatus::Unchecked);
}

#[test]
fn test_process_request_dispatch() {
    let config = config_with(Arc::new(MockValidator::saml2()));
    let processor = FederationProcessor::new();

    let body = format!(
        "wa=wsignin1.0&wresult={}&wctx=rm%3D0",
        urlencoding::encode(&RstrBuilder::new().without_lifetime().build())
    );
    let request = FederationRequest::from_form_body(body.as_bytes()).unwrap();
    let response = processor.process_request(&request, &config).unwrap();
    assert_eq!(response.subject, "alice");

    let signout = FederationRequest::from_form_body(b"wa=wsignout1.0").unwrap();
    assert!(matches!(
        processor.process_request(&signout, &config),
        Err(FederationError::UnsupportedAction(ref a)) if a == "wsignout1.0"
    ));

    let no_result = FederationRequest::from_form_body(b"wa=wsignin1.0").unwrap();
    assert!(matches!(
        processor.process_request(&no_result, &config),
        Err(FederationError::MissingParameter("wresult"))
    ));
}
