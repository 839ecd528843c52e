//! Telemetry error types

use thiserror::Error;

/// Errors that can occur while initializing logging
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Invalid configuration (for example an unparseable log filter)
    #[error("Invalid telemetry configuration: {0}")]
    InvalidConfiguration(String),

    /// Global subscriber could not be installed
    #[error("Tracing subscriber error: {0}")]
    TracingError(String),
}

/// Result type for telemetry operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;
