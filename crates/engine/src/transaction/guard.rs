//! RAII completion guard
//!
//! A `TransactionGuard` borrows a coordinator and an active context. Dropping
//! it without `commit()` rolls the unit of work back, so early returns and
//! panics never leave resources enlisted and open.

use crate::coordinator::TransactionCoordinator;
use crate::transaction::TransactionContext;
use tracing::{error, warn};
use unitwork_core::{SharedResource, TxnResult};

/// Guard over an active unit of work
///
/// Created by [`TransactionCoordinator::guard`], which begins the unit of
/// work. An explicit terminal call followed by the drop is idempotent.
pub struct TransactionGuard<'a> {
    coordinator: &'a TransactionCoordinator,
    ctx: &'a mut TransactionContext,
}

impl<'a> TransactionGuard<'a> {
    pub(crate) fn new(coordinator: &'a TransactionCoordinator, ctx: &'a mut TransactionContext) -> Self {
        Self { coordinator, ctx }
    }

    /// The guarded context
    pub fn context(&self) -> &TransactionContext {
        &*self.ctx
    }

    /// The guarded context, mutably
    pub fn context_mut(&mut self) -> &mut TransactionContext {
        &mut *self.ctx
    }

    /// Enlist into the main group
    pub fn enlist(&mut self, resource: SharedResource) -> TxnResult<()> {
        self.coordinator.enlist(self.ctx, resource)
    }

    /// Enlist into the prepare group
    pub fn enlist_prepare(&mut self, resource: SharedResource) -> TxnResult<()> {
        self.coordinator.enlist_prepare(self.ctx, resource)
    }

    /// Enlist into the after-completion group
    pub fn enlist_after_completion(&mut self, resource: SharedResource) -> TxnResult<()> {
        self.coordinator.enlist_after_completion(self.ctx, resource)
    }

    /// Mark the unit of work rollback-only
    pub fn set_rollback_only(&mut self) {
        self.coordinator.set_rollback_only(self.ctx);
    }

    /// Commit and release the guard
    pub fn commit(self) -> TxnResult<()> {
        self.coordinator.commit(self.ctx)
    }

    /// Roll back and release the guard
    pub fn rollback(self) -> TxnResult<()> {
        self.coordinator.rollback(self.ctx)
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if !self.ctx.is_active() {
            return;
        }
        warn!(
            target: "unitwork::txn",
            txn_id = ?self.ctx.txn_id(),
            "Transaction guard dropped without completion; rolling back"
        );
        if let Err(e) = self.coordinator.rollback(self.ctx) {
            error!(target: "unitwork::txn", txn_id = ?self.ctx.txn_id(), error = %e, "Rollback on guard drop failed");
        }
    }
}

impl std::fmt::Debug for TransactionGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionGuard")
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}
