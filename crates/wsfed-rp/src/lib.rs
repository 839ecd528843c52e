//! # wsfed-rp - WS-Federation Relying Party
//!
//! Relying-party side of the WS-Federation passive requestor profile: build
//! the redirect that sends a browser to the identity provider, then process the
//! WS-Trust `RequestSecurityTokenResponse` it posts back.
//!
//! ## Core Features
//!
//! - **Envelope processing** - WS-Trust 1.3 and February 2005 namespaces,
//!   with or without the response collection wrapper
//! - **Pluggable validators** - signature, issuer and audience checks live
//!   behind [`TokenValidator`]
//! - **Replay protection** - atomic insert-if-absent on a [`TokenReplayCache`]
//! - **Lifetime policy** - warn on or reject tokens outside their validity window
//! - **Static or dynamic configuration** - issuer, home realm and
//!   authentication type may be resolved per request
//!
//! ## Architecture
//!
//! - `protocol` - namespace URIs, parameter names, element names
//! - `xml` - namespace-resolving element tree with source spans
//! - `lifetime` - `wst:Lifetime` extraction and evaluation
//! - `validator` - token validator contract
//! - `replay` - replay cache contract and in-memory implementation
//! - `config` - relying-party configuration and builder
//! - `signin` - sign-in redirect construction, inbound form decoding
//! - `processor` - sign-in response pipeline and action dispatch
//! - `response` - authentication result
//!
//! ## Example
//!
//! ```rust
//! use wsfed_rp::{AuthRequest, FederationConfig, FederationProcessor};
//!
//! let config = FederationConfig::builder()
//!     .issuer("https://sts.example.com/adfs/ls/")
//!     .build();
//!
//! let request = AuthRequest::new("https://app.example.com/portal/home", "/portal");
//! let redirect = FederationProcessor::new()
//!     .create_sign_in_request(&request, &config)
//!     .unwrap();
//!
//! assert_eq!(
//!     redirect,
//!     "https://sts.example.com/adfs/ls/?wa=wsignin1.0\
//!      &wreply=https%3A%2F%2Fapp.example.com%2Fportal%2Fhome\
//!      &wtrealm=https%3A%2F%2Fapp.example.com%2Fportal%2F"
//! );
//! ```

pub mod config;
pub mod error;
pub mod lifetime;
pub mod processor;
pub mod protocol;
pub mod replay;
pub mod response;
pub mod signin;
pub mod validator;
pub mod xml;

pub use config::{
    ConfigValue, ExpiryPolicy, FederationConfig, FederationConfigBuilder, FederationSettings,
    ValueResolver,
};
pub use error::{FederationError, ReplayCacheError, ResolverError, ValidatorError};
pub use lifetime::{Lifetime, LifetimeStatus};
pub use processor::{FederationProcessor, MIN_REPLAY_TTL};
pub use replay::{DEFAULT_PURGE_INTERVAL, MemoryReplayCache, ReplayCacheStats, TokenReplayCache};
pub use response::AuthResponse;
pub use signin::{AuthRequest, FederationRequest, create_sign_in_request, derive_realm};
pub use validator::{Claim, TokenValidator, ValidatorResult};
pub use xml::{XmlAttribute, XmlElement, XmlError, XmlNode, parse_document};

/// Federation result type
pub type Result<T> = std::result::Result<T, FederationError>;
