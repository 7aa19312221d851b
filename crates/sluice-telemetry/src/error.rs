//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while installing telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber is already installed.
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,

    /// The log level is not a valid filter directive.
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter {
        /// The rejected directive.
        filter: String,
        /// Parser message.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TelemetryError::InvalidFilter {
            filter: "loud".to_string(),
            reason: "bad".to_string(),
        };
        assert_eq!(err.to_string(), "invalid log filter 'loud': bad");
        assert_eq!(
            TelemetryError::AlreadyInitialized.to_string(),
            "a global tracing subscriber is already installed"
        );
    }
}
