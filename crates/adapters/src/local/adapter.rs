//! Resource-local transaction adapter

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, trace};
use unitwork_core::{BoxError, ResourcePhase, ResourceTransaction, TxnError, TxnResult};

/// Failure reported by a resource-local transaction
#[derive(Debug, Error)]
pub enum LocalError {
    /// Operation requires an active transaction
    #[error("no active local transaction")]
    NotActive,

    /// Commit was refused because the transaction is rollback-only
    #[error("local transaction is marked rollback-only")]
    RollbackOnly,

    /// The persistence layer failed
    ///
    /// `cause` carries the driver-level failure when there is one.
    #[error("persistence failure: {message}")]
    Persistence {
        /// What the persistence layer was doing
        message: String,
        /// Driver-level failure
        #[source]
        cause: Option<BoxError>,
    },
}

impl LocalError {
    /// Create a Persistence error with a cause
    pub fn persistence(message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        LocalError::Persistence {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    /// The innermost failure worth reporting
    ///
    /// A persistence wrapper is unwrapped to its driver-level cause.
    fn into_cause(self) -> BoxError {
        match self {
            LocalError::Persistence {
                cause: Some(cause), ..
            } => cause,
            other => Box::new(other),
        }
    }
}

/// A transaction managed entirely by one resource, e.g. a database session
///
/// Calls arrive through [`LocalResourceAdapter`], which serializes them.
pub trait LocalTransaction: Send {
    /// Begin a transaction on the resource
    fn begin(&mut self) -> Result<(), LocalError>;

    /// Commit the current transaction
    ///
    /// Must leave the resource without an active transaction even on failure.
    fn commit(&mut self) -> Result<(), LocalError>;

    /// Roll back the current transaction
    fn rollback(&mut self) -> Result<(), LocalError>;

    /// Mark the current transaction rollback-only
    fn set_rollback_only(&mut self) -> Result<(), LocalError>;

    /// Whether the current transaction is rollback-only
    fn rollback_only(&self) -> bool;

    /// Whether a transaction is active on the resource
    fn is_active(&self) -> bool;
}

/// [`ResourceTransaction`] over a [`LocalTransaction`]
///
/// A thin pass-through. Commit failures become
/// `TxnError::ResourceFailure { phase: Commit }` carrying the driver-level
/// cause.
pub struct LocalResourceAdapter<T> {
    name: String,
    inner: Mutex<T>,
}

impl<T: LocalTransaction> LocalResourceAdapter<T> {
    /// Wrap `txn` under the given resource name
    pub fn new(name: impl Into<String>, txn: T) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(txn),
        }
    }

    /// Inspect the wrapped transaction
    pub fn with_inner<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let inner = self.inner.lock();
        f(&*inner)
    }

    /// Mutate the wrapped transaction outside the coordinator protocol
    pub fn with_inner_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut inner = self.inner.lock();
        f(&mut *inner)
    }

    /// Unwrap the adapter
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }

    fn failure(&self, phase: ResourcePhase, err: LocalError) -> TxnError {
        TxnError::resource(phase, self.name.as_str(), err.into_cause())
    }
}

impl<T: LocalTransaction> ResourceTransaction for LocalResourceAdapter<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn begin(&self) -> TxnResult<()> {
        let mut inner = self.inner.lock();
        if inner.is_active() {
            debug!(target: "unitwork::local", resource = %self.name, "Local transaction already active");
            return Ok(());
        }
        inner
            .begin()
            .map_err(|e| self.failure(ResourcePhase::Setup, e))
    }

    fn commit(&self) -> TxnResult<()> {
        trace!(target: "unitwork::local", resource = %self.name, "Committing transaction");
        self.inner
            .lock()
            .commit()
            .map_err(|e| self.failure(ResourcePhase::Commit, e))
    }

    fn rollback(&self) -> TxnResult<()> {
        trace!(target: "unitwork::local", resource = %self.name, "Rollback transaction");
        self.inner
            .lock()
            .rollback()
            .map_err(|e| self.failure(ResourcePhase::Rollback, e))
    }

    fn set_rollback_only(&self) -> TxnResult<()> {
        self.inner
            .lock()
            .set_rollback_only()
            .map_err(|e| self.failure(ResourcePhase::Setup, e))
    }

    fn get_rollback_only(&self) -> TxnResult<bool> {
        Ok(self.inner.lock().rollback_only())
    }

    fn is_active(&self) -> TxnResult<bool> {
        Ok(self.inner.lock().is_active())
    }
}

impl<T> std::fmt::Debug for LocalResourceAdapter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalResourceAdapter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::InMemoryLocalTransaction;
    use std::error::Error as _;
    use std::io;

    fn adapter() -> LocalResourceAdapter<InMemoryLocalTransaction> {
        LocalResourceAdapter::new("orders-db", InMemoryLocalTransaction::new())
    }

    #[test]
    fn test_begin_commit_pass_through() {
        let a = adapter();
        a.begin().unwrap();
        assert!(a.is_active().unwrap());

        a.commit().unwrap();
        assert!(!a.is_active().unwrap());
        a.with_inner(|t| {
            assert_eq!(t.begins(), 1);
            assert_eq!(t.commits(), 1);
        });
    }

    #[test]
    fn test_begin_tolerates_active_transaction() {
        let a = adapter();
        a.begin().unwrap();
        a.begin().unwrap();
        assert_eq!(a.with_inner(|t| t.begins()), 1);
    }

    #[test]
    fn test_commit_failure_unwraps_driver_cause() {
        let a = adapter();
        a.begin().unwrap();
        a.with_inner_mut(|t| {
            t.fail_next_commit(io::Error::new(io::ErrorKind::ConnectionReset, "socket closed"))
        });

        let err = a.commit().unwrap_err();
        assert_eq!(err.phase(), Some(ResourcePhase::Commit));
        assert_eq!(err.resource_name(), Some("orders-db"));
        let cause = err.source().unwrap();
        assert_eq!(
            cause.downcast_ref::<io::Error>().unwrap().kind(),
            io::ErrorKind::ConnectionReset
        );
        // A failed commit still ends the local transaction
        assert!(!a.is_active().unwrap());
    }

    #[test]
    fn test_commit_of_rollback_only_transaction() {
        let a = adapter();
        a.begin().unwrap();
        a.set_rollback_only().unwrap();
        assert!(a.get_rollback_only().unwrap());

        let err = a.commit().unwrap_err();
        assert!(err.to_string().contains("rollback-only"));
        assert_eq!(a.with_inner(|t| t.rollbacks()), 1);
    }

    #[test]
    fn test_rollback_without_begin_fails() {
        let a = adapter();
        let err = a.rollback().unwrap_err();
        assert_eq!(err.phase(), Some(ResourcePhase::Rollback));
        assert!(err.to_string().contains("no active"));
    }

    #[test]
    fn test_persistence_error_without_cause_is_kept() {
        let err = LocalError::Persistence {
            message: "flush failed".to_string(),
            cause: None,
        };
        assert!(err.into_cause().to_string().contains("flush failed"));
    }
}
