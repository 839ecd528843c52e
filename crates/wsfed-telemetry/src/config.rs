//! Telemetry configuration

use serde::{Deserialize, Serialize};

/// Default filter: informational output, with sign-in processing details
pub const DEFAULT_LOG_FILTER: &str = "info,wsfed_rp=info";

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event, for log shippers
    #[default]
    Json,
    /// Multi-line human-readable output
    Pretty,
    /// Single-line human-readable output
    Compact,
}

/// Telemetry configuration
///
/// Use [`TelemetryConfigBuilder`] for construction in code, or deserialize it
/// from the `telemetry` section of a settings file.
///
/// # Example
///
/// ```rust
/// use wsfed_telemetry::{LogFormat, TelemetryConfig};
///
/// let config = TelemetryConfig::builder()
///     .service_name("portal")
///     .service_version("1.4.0")
///     .log_filter("warn,wsfed_rp=debug")
///     .format(LogFormat::Compact)
///     .build();
///
/// assert_eq!(config.log_filter, "warn,wsfed_rp=debug");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Service version attached to the startup event
    pub service_version: String,
    /// `EnvFilter` directives (e.g. "info", "warn,wsfed_rp=debug")
    pub log_filter: String,
    /// Let `RUST_LOG` override `log_filter` when set
    pub env_override: bool,
    /// Output format
    pub format: LogFormat,
    /// Write to stderr instead of stdout
    pub stderr_output: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "wsfed-relying-party".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            env_override: true,
            format: LogFormat::Json,
            stderr_output: true,
        }
    }
}

impl TelemetryConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::default()
    }

    /// Install the global subscriber with this configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the log filter is invalid or a global subscriber
    /// is already installed.
    pub fn init(self) -> Result<crate::TelemetryGuard, crate::TelemetryError> {
        crate::TelemetryGuard::init(self)
    }
}

/// Builder for [`TelemetryConfig`]
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfigBuilder {
    service_name: Option<String>,
    service_version: Option<String>,
    log_filter: Option<String>,
    env_override: Option<bool>,
    format: Option<LogFormat>,
    stderr_output: Option<bool>,
}

impl TelemetryConfigBuilder {
    /// Set the service name
    #[must_use]
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Set the service version
    #[must_use]
    pub fn service_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = Some(version.into());
        self
    }

    /// Set the log filter
    ///
    /// Examples: "info", "warn", "info,wsfed_rp=debug"
    #[must_use]
    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// Allow or forbid `RUST_LOG` to override the configured filter
    #[must_use]
    pub fn env_override(mut self, enabled: bool) -> Self {
        self.env_override = Some(enabled);
        self
    }

    /// Set the output format
    #[must_use]
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Enable or disable stderr output
    #[must_use]
    pub fn stderr_output(mut self, enabled: bool) -> Self {
        self.stderr_output = Some(enabled);
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> TelemetryConfig {
        let defaults = TelemetryConfig::default();

        TelemetryConfig {
            service_name: self.service_name.unwrap_or(defaults.service_name),
            service_version: self.service_version.unwrap_or(defaults.service_version),
            log_filter: self.log_filter.unwrap_or(defaults.log_filter),
            env_override: self.env_override.unwrap_or(defaults.env_override),
            format: self.format.unwrap_or(defaults.format),
            stderr_output: self.stderr_output.unwrap_or(defaults.stderr_output),
        }
    }
}
