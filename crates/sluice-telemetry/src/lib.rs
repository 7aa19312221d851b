//! Logging initialisation for Sluice services.
//!
//! Every Sluice crate logs through the `tracing` facade with structured
//! fields (`request_id`, `path`, `status`, `elapsed_ms`). This crate installs
//! the process-wide subscriber that renders those events, either as JSON
//! lines for production or in a human-readable layout for development.
//!
//! # Example
//!
//! ```rust,no_run
//! use sluice_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development()).expect("logging already installed");
//! tracing::info!(path = "/tests/text", "serving");
//! ```

#![doc(html_root_url = "https://docs.rs/sluice-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
