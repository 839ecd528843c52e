//! Structured logging for WS-Federation relying parties
//!
//! `wsfed-rp` reports envelope details, resolved issuers and realms, lifetime
//! violations, validator failures and replay attempts through `tracing`. This
//! crate installs the subscriber that turns those events into JSON or
//! human-readable log lines.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use wsfed_telemetry::{LogFormat, TelemetryConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let _guard = TelemetryConfig::builder()
//!         .service_name("portal")
//!         .log_filter("info,wsfed_rp=debug")
//!         .format(LogFormat::Json)
//!         .build()
//!         .init()?;
//!
//!     // Serve sign-in requests...
//!     Ok(())
//! }
//! ```
//!
//! Replay detections and missing issuers are logged at `error`, lifetime
//! violations and validator failures at `warn`. A filter of `warn` is enough
//! to capture every security-relevant event.

mod config;
mod error;
mod init;

pub use config::{LogFormat, TelemetryConfig, TelemetryConfigBuilder};
pub use error::{TelemetryError, TelemetryResult};
pub use init::TelemetryGuard;
