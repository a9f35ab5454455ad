//! Ambient transaction manager seam
//!
//! The ambient manager is an external platform component that associates at
//! most one transaction with each execution context. The coordinator only
//! needs the handful of operations below; everything else about the manager
//! (timeouts, XA resources, recovery) stays on its side of the boundary.

use std::fmt;
use thiserror::Error;
use unitwork_core::BoxError;

/// Opaque handle to an ambient transaction
///
/// Returned by [`AmbientTransactionManager::suspend`] and handed back to
/// [`AmbientTransactionManager::resume`]. The id is only meaningful to the
/// manager that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AmbientTransaction {
    id: u64,
}

impl AmbientTransaction {
    /// Wrap a manager-issued transaction id
    pub const fn new(id: u64) -> Self {
        Self { id }
    }

    /// Manager-issued transaction id
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for AmbientTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ambient-txn-{}", self.id)
    }
}

/// Status of the ambient transaction associated with the calling context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AmbientStatus {
    /// Associated and still able to commit
    Active,
    /// Associated, but can only roll back
    MarkedRollback,
    /// Commit finished
    Committed,
    /// Rollback finished
    RolledBack,
    /// No transaction associated with the calling context
    NoTransaction,
    /// Status could not be determined
    Unknown,
}

/// Failure reported by an ambient transaction manager
#[derive(Debug, Error)]
pub enum AmbientError {
    /// Commit was refused because the transaction rolled back instead
    ///
    /// `cause` is the reason for the rollback when the manager knows it.
    #[error("ambient transaction was rolled back")]
    RolledBack {
        /// Why the transaction rolled back
        #[source]
        cause: Option<BoxError>,
    },

    /// No transaction is associated with the calling context
    #[error("no ambient transaction is associated with the calling context")]
    NoTransaction,

    /// A transaction is already associated with the calling context
    #[error("an ambient transaction is already associated with the calling context")]
    AlreadyAssociated,

    /// The handle does not name a resumable transaction
    #[error("ambient transaction {0} cannot be resumed")]
    InvalidTransaction(AmbientTransaction),

    /// Unexpected manager failure
    #[error("ambient transaction manager failure: {0}")]
    System(String),
}

/// Operations the coordinator needs from an ambient transaction manager
///
/// Every call acts on the transaction associated with the calling execution
/// context. Suspend and resume calls must be paired per context; the
/// [`AmbientTransactionAdapter`](super::AmbientTransactionAdapter) guarantees
/// exactly one resume for every transaction it suspends.
pub trait AmbientTransactionManager: Send + Sync {
    /// Detach the current transaction from the calling context
    ///
    /// Returns `None` when no transaction was associated.
    fn suspend(&self) -> Result<Option<AmbientTransaction>, AmbientError>;

    /// Begin a new transaction and associate it with the calling context
    fn begin(&self) -> Result<(), AmbientError>;

    /// Re-associate a previously suspended transaction
    fn resume(&self, txn: AmbientTransaction) -> Result<(), AmbientError>;

    /// Commit the associated transaction and disassociate it
    fn commit(&self) -> Result<(), AmbientError>;

    /// Roll back the associated transaction and disassociate it
    fn rollback(&self) -> Result<(), AmbientError>;

    /// Mark the associated transaction rollback-only
    fn set_rollback_only(&self) -> Result<(), AmbientError>;

    /// Status of the associated transaction
    fn status(&self) -> Result<AmbientStatus, AmbientError>;

    /// Handle of the associated transaction, if any
    fn current(&self) -> Result<Option<AmbientTransaction>, AmbientError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_transaction_handle_display() {
        let txn = AmbientTransaction::new(7);
        assert_eq!(txn.id(), 7);
        assert_eq!(txn.to_string(), "ambient-txn-7");
    }

    #[test]
    fn test_rolled_back_error_exposes_cause() {
        let err = AmbientError::RolledBack {
            cause: Some("deadlock detected".into()),
        };
        assert_eq!(err.source().unwrap().to_string(), "deadlock detected");

        let bare = AmbientError::RolledBack { cause: None };
        assert!(bare.source().is_none());
    }

    #[test]
    fn test_invalid_transaction_display_names_handle() {
        let err = AmbientError::InvalidTransaction(AmbientTransaction::new(3));
        assert!(err.to_string().contains("ambient-txn-3"));
    }
}
