//! Error types for test utilities.

use sluice_core::StreamError;
use thiserror::Error;

/// Errors raised while building a test request or reading its response.
#[derive(Debug, Error)]
pub enum TestError {
    /// The request could not be built.
    #[error("failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// The response body stream failed.
    #[error("failed to read body: {0}")]
    BodyRead(#[from] StreamError),

    /// The body is not valid UTF-8.
    #[error("body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response did not finish in time.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}
