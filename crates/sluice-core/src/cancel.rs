//! Cooperative cancellation handle for indefinite body streams.

use tokio_util::sync::CancellationToken;

/// A handle that stops a running body stream.
///
/// Cancellation is cooperative: the producer stops emitting after the chunk
/// in flight and the consumer observes a normal end of stream. Cancelling is
/// idempotent and cheap to clone.
///
/// # Example
///
/// ```
/// use sluice_core::Cancellable;
///
/// let handle = Cancellable::new();
/// let shared = handle.clone();
/// shared.cancel();
/// assert!(handle.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Cancellable {
    token: CancellationToken,
}

impl Cancellable {
    /// Creates a handle that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Returns `true` if this call performed it.
    pub fn cancel(&self) -> bool {
        let first = !self.token.is_cancelled();
        self.token.cancel();
        first
    }

    /// Returns `true` once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when cancellation is requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}
