//! Error types for the demo service.

use thiserror::Error;

/// Demo service errors.
#[derive(Debug, Error)]
pub enum DemoError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] sluice_config::ConfigError),

    /// The logging subscriber could not be installed.
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] sluice_telemetry::TelemetryError),

    /// The dispatch pool could not be started.
    #[error("Dispatch pool error: {0}")]
    Dispatch(#[source] std::io::Error),

    /// The server failed to bind or serve.
    #[error("Server error: {0}")]
    Server(#[from] sluice_server::ServerError),

    /// The upstream call failed.
    #[error("Upstream error: {0}")]
    Upstream(#[from] reqwest::Error),

    /// The upstream document is not JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for demo operations.
pub type DemoResult<T> = Result<T, DemoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DemoError::Dispatch(std::io::Error::other("no threads"));
        assert_eq!(err.to_string(), "Dispatch pool error: no threads");

        let err: DemoError = sluice_config::ConfigError::invalid_value("throttle.limit", "zero").into();
        assert!(err.to_string().starts_with("Configuration error"));
    }
}
