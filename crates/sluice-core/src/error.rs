//! Error types for Sluice.
//!
//! Three families of failure travel through the pipeline:
//!
//! | Type                 | Raised by                                  | Surfaces as                      |
//! |----------------------|--------------------------------------------|----------------------------------|
//! | [`ActionError`]      | handler bodies and interceptor stages      | a 5xx [`Reply`](crate::Reply)    |
//! | [`StreamError`]      | body producers after draining has started  | an aborted/truncated body        |
//! | [`MaterializeError`] | the materialized-value side channel        | an `Err` to the waiting reader   |
//!
//! Deliberate rejections (missing credential, throttled caller) are not errors
//! at all: they are ordinary replies with a 4xx status.

use http::StatusCode;
use std::any::Any;
use thiserror::Error;

/// Result type alias for pipeline stages.
pub type ActionResult<T> = Result<T, ActionError>;

/// A failure raised while executing a handler body or an interceptor stage.
///
/// Entry points convert every `ActionError` into an error reply through the
/// error adapter, so this type never escapes a chain.
///
/// # Example
///
/// ```
/// use sluice_core::ActionError;
///
/// let err = ActionError::from(anyhow::anyhow!("database offline"));
/// assert_eq!(err.status_code(), http::StatusCode::INTERNAL_SERVER_ERROR);
/// assert_eq!(err.kind(), "handler_failure");
/// ```
#[derive(Error, Debug)]
pub enum ActionError {
    /// The handler or stage returned an error.
    #[error("handler failed: {0}")]
    Handler(#[from] anyhow::Error),

    /// The handler or stage panicked.
    #[error("handler panicked: {message}")]
    Panicked {
        /// The panic payload, when it was a string.
        message: String,
    },

    /// The dispatch executor could not run the handler body.
    #[error("dispatch executor unavailable: {message}")]
    Dispatch {
        /// Why the executor rejected or lost the task.
        message: String,
    },
}

impl ActionError {
    /// Creates a handler failure from a plain message.
    #[must_use]
    pub fn msg(message: impl std::fmt::Display + std::fmt::Debug + Send + Sync + 'static) -> Self {
        Self::Handler(anyhow::Error::msg(message))
    }

    /// Creates an error from a caught panic payload.
    #[must_use]
    pub fn panicked(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked { message }
    }

    /// Creates a dispatch error.
    #[must_use]
    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::Dispatch {
            message: message.into(),
        }
    }

    /// Returns the HTTP status this failure maps to. Always 5xx.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Handler(_) | Self::Panicked { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Dispatch { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Short machine-readable name of the failure kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Handler(_) => "handler_failure",
            Self::Panicked { .. } => "panic",
            Self::Dispatch { .. } => "dispatch",
        }
    }

    /// Returns the messages of the error and every cause below it, outermost first.
    #[must_use]
    pub fn chain(&self) -> Vec<String> {
        match self {
            Self::Handler(err) => err.chain().map(ToString::to_string).collect(),
            other => vec![other.to_string()],
        }
    }
}

/// A failure of a body producer after the reply started flushing.
#[derive(Error, Debug)]
pub enum StreamError {
    /// Reading from the underlying source failed.
    #[error("body I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The producer reported an error.
    #[error("body producer failed: {message}")]
    Producer {
        /// Description of the failure.
        message: String,
    },

    /// A single-use stream was materialized a second time.
    #[error("body stream was already consumed")]
    AlreadyConsumed,
}

impl StreamError {
    /// Creates a producer error.
    #[must_use]
    pub fn producer(message: impl Into<String>) -> Self {
        Self::Producer {
            message: message.into(),
        }
    }
}

/// Failures of the materialized-value side channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MaterializeError {
    /// The value was already written. The cell is single-assignment.
    #[error("materialized value was already resolved")]
    AlreadyResolved,

    /// Every copy of the reply was dropped before it was served.
    #[error("reply was dropped before its body was materialized")]
    Abandoned,

    /// The resolved value is not of the requested type.
    #[error("materialized value is not a {expected}")]
    TypeMismatch {
        /// The requested type name.
        expected: &'static str,
    },
}

/// Failures of the fallible body helpers on [`Reply`](crate::Reply).
#[derive(Error, Debug)]
pub enum ReplyError {
    /// Serializing a value to JSON failed.
    #[error("failed to serialize JSON body: {0}")]
    Json(#[from] serde_json::Error),

    /// The template renderer failed.
    #[error("failed to render template '{name}': {message}")]
    Template {
        /// Template name.
        name: String,
        /// Renderer message.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_is_internal() {
        let err = ActionError::msg("boom");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "handler failed: boom");
    }

    #[test]
    fn test_dispatch_error_is_unavailable() {
        let err = ActionError::dispatch("pool shut down");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.kind(), "dispatch");
    }

    #[test]
    fn test_panicked_extracts_payload() {
        let payload: Box<dyn Any + Send> = Box::new("kaboom");
        let err = ActionError::panicked(payload.as_ref());
        assert!(matches!(err, ActionError::Panicked { ref message } if message == "kaboom"));

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let err = ActionError::panicked(payload.as_ref());
        assert_eq!(err.to_string(), "handler panicked: owned");

        let payload: Box<dyn Any + Send> = Box::new(42_u32);
        let err = ActionError::panicked(payload.as_ref());
        assert_eq!(err.to_string(), "handler panicked: non-string panic payload");
    }

    #[test]
    fn test_chain_lists_causes() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "missing row");
        let err = ActionError::from(anyhow::Error::new(inner).context("loading user"));
        assert_eq!(err.chain(), vec!["loading user".to_string(), "missing row".to_string()]);
    }
}
