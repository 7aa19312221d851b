//! The materialized-value side channel of a reply.
//!
//! A body source may hand back a live handle when it starts running, for
//! example the [`Cancellable`](crate::Cancellable) of a ticking stream. The
//! handle does not exist yet when the handler builds the reply, so the reply
//! carries a write-once [`MaterializedCell`] instead. The serving layer
//! resolves it exactly once, at the moment it starts draining the body;
//! readers that subscribed earlier suspend until then.
//!
//! # Example
//!
//! ```
//! use sluice_core::{Materialized, MaterializedCell, MaterializeError};
//!
//! # tokio_test::block_on(async {
//! let cell = MaterializedCell::new();
//! let waiting = cell.wait();
//!
//! cell.complete(Materialized::value(7_u32)).unwrap();
//! assert_eq!(cell.complete(Materialized::NotUsed), Err(MaterializeError::AlreadyResolved));
//!
//! let value = waiting.await.unwrap();
//! assert_eq!(*value.downcast::<u32>().unwrap(), 7);
//! # });
//! ```

use crate::error::MaterializeError;
use std::any::{type_name, Any};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// The value produced by a body source when it starts running.
#[derive(Clone)]
pub enum Materialized {
    /// The source produced no handle.
    NotUsed,
    /// A type-erased handle.
    Value(Arc<dyn Any + Send + Sync>),
}

impl Materialized {
    /// Wraps a handle.
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Self::Value(Arc::new(value))
    }

    /// Returns `true` if the source produced a handle.
    #[must_use]
    pub const fn is_used(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Returns the handle as `T`, if it is one.
    #[must_use]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Self::NotUsed => None,
            Self::Value(value) => Arc::clone(value).downcast::<T>().ok(),
        }
    }
}

impl fmt::Debug for Materialized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotUsed => write!(f, "Materialized::NotUsed"),
            Self::Value(_) => write!(f, "Materialized::Value(..)"),
        }
    }
}

/// A single-assignment cell holding a reply's [`Materialized`] value.
///
/// Cloning shares the cell. Once every clone is dropped without the cell
/// having been resolved, pending readers fail with
/// [`MaterializeError::Abandoned`] rather than waiting forever.
#[derive(Clone)]
pub struct MaterializedCell {
    tx: Arc<watch::Sender<Option<Materialized>>>,
}

impl MaterializedCell {
    /// Creates an unresolved cell.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Resolves the cell.
    ///
    /// # Errors
    ///
    /// Returns [`MaterializeError::AlreadyResolved`] if the cell already holds
    /// a value; the existing value is kept.
    pub fn complete(&self, value: Materialized) -> Result<(), MaterializeError> {
        let mut accepted = false;
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(value);
            accepted = true;
            true
        });

        if accepted {
            Ok(())
        } else {
            Err(MaterializeError::AlreadyResolved)
        }
    }

    /// Returns `true` once the cell holds a value.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Returns the value without waiting.
    #[must_use]
    pub fn try_get(&self) -> Option<Materialized> {
        self.tx.borrow().clone()
    }

    /// Returns a future resolving to the value.
    ///
    /// The subscription is taken eagerly, so the returned future does not
    /// borrow the cell and may outlive every reply that shares it.
    pub fn wait(&self) -> impl Future<Output = Result<Materialized, MaterializeError>> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            let slot = rx
                .wait_for(Option::is_some)
                .await
                .map_err(|_| MaterializeError::Abandoned)?;
            slot.clone().ok_or(MaterializeError::Abandoned)
        }
    }

    /// Returns a future resolving to the value downcast to `T`.
    pub fn wait_as<T: Any + Send + Sync>(
        &self,
    ) -> impl Future<Output = Result<Arc<T>, MaterializeError>> + Send + 'static {
        let value = self.wait();
        async move {
            value.await?.downcast::<T>().ok_or(MaterializeError::TypeMismatch {
                expected: type_name::<T>(),
            })
        }
    }
}

impl Default for MaterializedCell {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MaterializedCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterializedCell")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_reader_suspends_until_resolved() {
        let cell = MaterializedCell::new();
        let reader = tokio::spawn(cell.wait());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!reader.is_finished());

        cell.complete(Materialized::value("handle")).unwrap();
        let value = reader.await.unwrap().unwrap();
        assert_eq!(*value.downcast::<&str>().unwrap(), "handle");
    }

    #[tokio::test]
    async fn test_second_write_is_rejected() {
        let cell = MaterializedCell::new();
        cell.complete(Materialized::value(1_u8)).unwrap();

        let again = cell.complete(Materialized::value(2_u8));
        assert_eq!(again, Err(MaterializeError::AlreadyResolved));

        let kept = cell.try_get().unwrap();
        assert_eq!(*kept.downcast::<u8>().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_the_cell() {
        let cell = MaterializedCell::new();
        let copy = cell.clone();
        copy.complete(Materialized::NotUsed).unwrap();
        assert!(cell.is_resolved());
        assert!(!cell.try_get().unwrap().is_used());
    }

    #[tokio::test]
    async fn test_dropped_cell_abandons_readers() {
        let cell = MaterializedCell::new();
        let waiting = cell.wait();
        drop(cell);
        assert_eq!(waiting.await.unwrap_err(), MaterializeError::Abandoned);
    }

    #[tokio::test]
    async fn test_value_survives_cell_drop() {
        let cell = MaterializedCell::new();
        let waiting = cell.wait();
        cell.complete(Materialized::value(3_i64)).unwrap();
        drop(cell);
        assert!(waiting.await.unwrap().is_used());
    }

    #[tokio::test]
    async fn test_wait_as_reports_type_mismatch() {
        let cell = MaterializedCell::new();
        cell.complete(Materialized::value(5_u16)).unwrap();
        let err = cell.wait_as::<String>().await.unwrap_err();
        assert!(matches!(err, MaterializeError::TypeMismatch { .. }));

        let cell = MaterializedCell::new();
        cell.complete(Materialized::NotUsed).unwrap();
        assert!(cell.wait_as::<u16>().await.is_err());
    }
}
