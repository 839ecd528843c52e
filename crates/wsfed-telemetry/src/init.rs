//! Telemetry initialization
//!
//! Provides the [`TelemetryGuard`] returned once the global subscriber is
//! installed.

use crate::{LogFormat, TelemetryConfig, TelemetryError};
use tracing::info;
use tracing_subscriber::{
    Layer, Registry, filter::EnvFilter, fmt, fmt::writer::BoxMakeWriter, layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Guard returned by a successful initialization
///
/// Keep it alive in `main()` for the lifetime of the application; dropping it
/// logs the shutdown event.
///
/// # Example
///
/// ```rust,no_run
/// use wsfed_telemetry::TelemetryConfig;
///
/// let _guard = TelemetryConfig::default().init()?;
/// # Ok::<(), wsfed_telemetry::TelemetryError>(())
/// ```
#[derive(Debug)]
pub struct TelemetryGuard {
    config: TelemetryConfig,
}

impl TelemetryGuard {
    /// Install the global subscriber described by `config`
    ///
    /// # Errors
    ///
    /// * [`TelemetryError::InvalidConfiguration`] if the log filter does not parse
    /// * [`TelemetryError::TracingError`] if a global subscriber is already set
    pub fn init(config: TelemetryConfig) -> Result<Self, TelemetryError> {
        let env_filter = build_filter(&config)?;

        let writer = if config.stderr_output {
            BoxMakeWriter::new(std::io::stderr)
        } else {
            BoxMakeWriter::new(std::io::stdout)
        };

        let fmt_layer = match config.format {
            LogFormat::Json => fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .pretty()
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .compact()
                .boxed(),
        };

        Registry::default()
            .with(fmt_layer)
            .with(env_filter)
            .try_init()
            .map_err(|e| TelemetryError::TracingError(e.to_string()))?;

        info!(
            service_name = %config.service_name,
            service_version = %config.service_version,
            format = ?config.format,
            stderr_output = config.stderr_output,
            "Telemetry initialized"
        );

        Ok(Self { config })
    }

    /// Get the service name
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.config.service_name
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        info!(service_name = %self.config.service_name, "Shutting down telemetry");
    }
}

fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    if config.env_override
        && let Ok(filter) = EnvFilter::try_from_default_env()
    {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.log_filter)
        .map_err(|e| TelemetryError::InvalidConfiguration(format!("Invalid log filter: {e}")))
}
