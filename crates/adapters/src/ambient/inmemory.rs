//! In-memory ambient transaction manager
//!
//! A complete [`AmbientTransactionManager`] that keeps its state in process
//! memory. Useful for embedders that have no platform transaction manager
//! but still want `RequiresNew` semantics, and for tests.
//!
//! # Association model
//!
//! Each OS thread has at most one associated transaction. `suspend` detaches
//! it and hands out a handle; `resume` re-attaches a suspended handle to the
//! calling thread. A transaction is resumable while it is `Active` or
//! `MarkedRollback` and not associated with any thread.
//!
//! # Failure injection
//!
//! [`InMemoryAmbientManager::inject`] arms a one-shot fault for the next call
//! of the named operation on any thread.

use super::manager::{AmbientError, AmbientStatus, AmbientTransaction, AmbientTransactionManager};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::thread::{self, ThreadId};

/// Operation that fails once after being armed with `inject`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AmbientFault {
    /// Next `suspend` fails
    Suspend,
    /// Next `begin` fails
    Begin,
    /// Next `resume` fails
    Resume,
    /// Next `commit` fails with a system error; the transaction stays associated
    Commit,
    /// Next `rollback` fails with a system error
    Rollback,
    /// Next `status` query fails
    Status,
}

/// Call counters of an [`InMemoryAmbientManager`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AmbientStats {
    /// Transactions begun
    pub begun: u64,
    /// Transactions committed
    pub committed: u64,
    /// Transactions rolled back, including commits refused for rollback-only
    pub rolled_back: u64,
    /// Successful suspends that detached a transaction
    pub suspended: u64,
    /// Successful resumes
    pub resumed: u64,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    associations: HashMap<ThreadId, AmbientTransaction>,
    statuses: HashMap<AmbientTransaction, AmbientStatus>,
    faults: HashSet<AmbientFault>,
    stats: AmbientStats,
}

impl State {
    fn take_fault(&mut self, fault: AmbientFault) -> Result<(), AmbientError> {
        if self.faults.remove(&fault) {
            Err(AmbientError::System(format!("injected {:?} failure", fault)))
        } else {
            Ok(())
        }
    }

    fn associated(&self) -> Result<AmbientTransaction, AmbientError> {
        self.associations
            .get(&thread::current().id())
            .copied()
            .ok_or(AmbientError::NoTransaction)
    }

    fn finish(&mut self, txn: AmbientTransaction, status: AmbientStatus) {
        self.associations.remove(&thread::current().id());
        self.statuses.insert(txn, status);
    }
}

/// Thread-associated ambient transaction manager kept in memory
///
/// # Thread Safety
///
/// All state sits behind one mutex; every operation is a short critical
/// section, so the manager can be shared freely through an `Arc`.
///
/// # Example
///
/// ```
/// use unitwork_adapters::{AmbientStatus, AmbientTransactionManager, InMemoryAmbientManager};
///
/// let tm = InMemoryAmbientManager::new();
/// tm.begin().unwrap();
/// assert_eq!(tm.status().unwrap(), AmbientStatus::Active);
/// tm.commit().unwrap();
/// assert_eq!(tm.status().unwrap(), AmbientStatus::NoTransaction);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryAmbientManager {
    state: Mutex<State>,
}

impl InMemoryAmbientManager {
    /// Create a manager with no transactions
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot fault for the next call of `fault`'s operation
    pub fn inject(&self, fault: AmbientFault) {
        self.state.lock().faults.insert(fault);
    }

    /// Disarm every pending fault
    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    /// Status of any transaction this manager issued
    ///
    /// Unlike [`AmbientTransactionManager::status`] this does not depend on
    /// the calling thread.
    pub fn status_of(&self, txn: AmbientTransaction) -> Option<AmbientStatus> {
        self.state.lock().statuses.get(&txn).copied()
    }

    /// Snapshot of the call counters
    pub fn stats(&self) -> AmbientStats {
        self.state.lock().stats
    }
}

impl AmbientTransactionManager for InMemoryAmbientManager {
    fn suspend(&self) -> Result<Option<AmbientTransaction>, AmbientError> {
        let mut state = self.state.lock();
        state.take_fault(AmbientFault::Suspend)?;
        let suspended = state.associations.remove(&thread::current().id());
        if suspended.is_some() {
            state.stats.suspended += 1;
        }
        Ok(suspended)
    }

    fn begin(&self) -> Result<(), AmbientError> {
        let mut state = self.state.lock();
        state.take_fault(AmbientFault::Begin)?;
        let thread_id = thread::current().id();
        if state.associations.contains_key(&thread_id) {
            return Err(AmbientError::AlreadyAssociated);
        }
        state.next_id += 1;
        let txn = AmbientTransaction::new(state.next_id);
        state.associations.insert(thread_id, txn);
        state.statuses.insert(txn, AmbientStatus::Active);
        state.stats.begun += 1;
        Ok(())
    }

    fn resume(&self, txn: AmbientTransaction) -> Result<(), AmbientError> {
        let mut state = self.state.lock();
        state.take_fault(AmbientFault::Resume)?;
        let thread_id = thread::current().id();
        if state.associations.contains_key(&thread_id) {
            return Err(AmbientError::AlreadyAssociated);
        }
        let resumable = matches!(
            state.statuses.get(&txn),
            Some(AmbientStatus::Active) | Some(AmbientStatus::MarkedRollback)
        );
        if !resumable || state.associations.values().any(|t| *t == txn) {
            return Err(AmbientError::InvalidTransaction(txn));
        }
        state.associations.insert(thread_id, txn);
        state.stats.resumed += 1;
        Ok(())
    }

    fn commit(&self) -> Result<(), AmbientError> {
        let mut state = self.state.lock();
        let txn = state.associated()?;
        state.take_fault(AmbientFault::Commit)?;
        if state.statuses.get(&txn) == Some(&AmbientStatus::MarkedRollback) {
            state.finish(txn, AmbientStatus::RolledBack);
            state.stats.rolled_back += 1;
            return Err(AmbientError::RolledBack {
                cause: Some(format!("{} was marked rollback-only", txn).into()),
            });
        }
        state.finish(txn, AmbientStatus::Committed);
        state.stats.committed += 1;
        Ok(())
    }

    fn rollback(&self) -> Result<(), AmbientError> {
        let mut state = self.state.lock();
        let txn = state.associated()?;
        state.take_fault(AmbientFault::Rollback)?;
        state.finish(txn, AmbientStatus::RolledBack);
        state.stats.rolled_back += 1;
        Ok(())
    }

    fn set_rollback_only(&self) -> Result<(), AmbientError> {
        let mut state = self.state.lock();
        let txn = state.associated()?;
        state.statuses.insert(txn, AmbientStatus::MarkedRollback);
        Ok(())
    }

    fn status(&self) -> Result<AmbientStatus, AmbientError> {
        let mut state = self.state.lock();
        state.take_fault(AmbientFault::Status)?;
        match state.associated() {
            Ok(txn) => Ok(state
                .statuses
                .get(&txn)
                .copied()
                .unwrap_or(AmbientStatus::Unknown)),
            Err(_) => Ok(AmbientStatus::NoTransaction),
        }
    }

    fn current(&self) -> Result<Option<AmbientTransaction>, AmbientError> {
        Ok(self.state.lock().associated().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::sync::Arc;

    #[test]
    fn test_begin_commit_lifecycle() {
        let tm = InMemoryAmbientManager::new();
        assert_eq!(tm.status().unwrap(), AmbientStatus::NoTransaction);

        tm.begin().unwrap();
        let txn = tm.current().unwrap().unwrap();
        assert_eq!(tm.status().unwrap(), AmbientStatus::Active);

        tm.commit().unwrap();
        assert_eq!(tm.current().unwrap(), None);
        assert_eq!(tm.status_of(txn), Some(AmbientStatus::Committed));
        assert_eq!(tm.stats().committed, 1);
    }

    #[test]
    fn test_nested_begin_is_rejected() {
        let tm = InMemoryAmbientManager::new();
        tm.begin().unwrap();
        assert!(matches!(tm.begin(), Err(AmbientError::AlreadyAssociated)));
    }

    #[test]
    fn test_commit_without_transaction_fails() {
        let tm = InMemoryAmbientManager::new();
        assert!(matches!(tm.commit(), Err(AmbientError::NoTransaction)));
        assert!(matches!(tm.rollback(), Err(AmbientError::NoTransaction)));
    }

    #[test]
    fn test_suspend_and_resume_round_trip() {
        let tm = InMemoryAmbientManager::new();
        tm.begin().unwrap();
        let outer = tm.current().unwrap().unwrap();

        let suspended = tm.suspend().unwrap();
        assert_eq!(suspended, Some(outer));
        assert_eq!(tm.status().unwrap(), AmbientStatus::NoTransaction);

        tm.begin().unwrap();
        tm.commit().unwrap();

        tm.resume(outer).unwrap();
        assert_eq!(tm.current().unwrap(), Some(outer));
        assert_eq!(tm.status().unwrap(), AmbientStatus::Active);

        let stats = tm.stats();
        assert_eq!(stats.suspended, 1);
        assert_eq!(stats.resumed, 1);
    }

    #[test]
    fn test_suspend_with_nothing_associated() {
        let tm = InMemoryAmbientManager::new();
        assert_eq!(tm.suspend().unwrap(), None);
        assert_eq!(tm.stats().suspended, 0);
    }

    #[test]
    fn test_resume_finished_transaction_is_invalid() {
        let tm = InMemoryAmbientManager::new();
        tm.begin().unwrap();
        let txn = tm.current().unwrap().unwrap();
        tm.rollback().unwrap();

        assert!(matches!(
            tm.resume(txn),
            Err(AmbientError::InvalidTransaction(t)) if t == txn
        ));
    }

    #[test]
    fn test_commit_of_rollback_only_transaction_rolls_back() {
        let tm = InMemoryAmbientManager::new();
        tm.begin().unwrap();
        let txn = tm.current().unwrap().unwrap();
        tm.set_rollback_only().unwrap();
        assert_eq!(tm.status().unwrap(), AmbientStatus::MarkedRollback);

        let err = tm.commit().unwrap_err();
        assert!(matches!(err, AmbientError::RolledBack { .. }));
        assert!(err.source().unwrap().to_string().contains("rollback-only"));
        assert_eq!(tm.status_of(txn), Some(AmbientStatus::RolledBack));
        assert_eq!(tm.current().unwrap(), None);
    }

    #[test]
    fn test_injected_fault_fires_once() {
        let tm = InMemoryAmbientManager::new();
        tm.inject(AmbientFault::Begin);

        assert!(matches!(tm.begin(), Err(AmbientError::System(_))));
        tm.begin().unwrap();
        assert_eq!(tm.stats().begun, 1);
    }

    #[test]
    fn test_injected_commit_fault_keeps_association() {
        let tm = InMemoryAmbientManager::new();
        tm.begin().unwrap();
        tm.inject(AmbientFault::Commit);

        assert!(tm.commit().is_err());
        assert_eq!(tm.status().unwrap(), AmbientStatus::Active);
        tm.rollback().unwrap();
    }

    #[test]
    fn test_associations_are_per_thread() {
        let tm = Arc::new(InMemoryAmbientManager::new());
        tm.begin().unwrap();

        let other = Arc::clone(&tm);
        let seen = std::thread::spawn(move || other.status().unwrap())
            .join()
            .unwrap();
        assert_eq!(seen, AmbientStatus::NoTransaction);
        assert_eq!(tm.status().unwrap(), AmbientStatus::Active);
    }
}
