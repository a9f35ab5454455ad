//! Request-scoped session
//!
//! A `Session` pairs a shared coordinator with one owned context, so a
//! request handler can carry a single value. Closing the session rolls back
//! any unfinished unit of work and notifies close listeners.

use crate::coordinator::TransactionCoordinator;
use crate::transaction::TransactionContext;
use std::sync::Arc;
use tracing::{debug, error};
use unitwork_core::{SharedResource, TxnError, TxnResult};

/// Lifecycle event delivered to session listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session closed
    Closed {
        /// Whether closing had to roll back an unfinished unit of work
        rolled_back: bool,
    },
}

type Listener = Box<dyn Fn(&SessionEvent) + Send>;

/// One execution context's handle to the coordinator
pub struct Session {
    coordinator: Arc<TransactionCoordinator>,
    context: TransactionContext,
    listeners: Vec<Listener>,
    closed: bool,
}

impl Session {
    /// Open a session with a fresh context
    pub fn new(coordinator: Arc<TransactionCoordinator>) -> Self {
        let context = coordinator.new_context();
        Self {
            coordinator,
            context,
            listeners: Vec::new(),
            closed: false,
        }
    }

    /// The shared coordinator
    pub fn coordinator(&self) -> &Arc<TransactionCoordinator> {
        &self.coordinator
    }

    /// The session's context
    pub fn context(&self) -> &TransactionContext {
        &self.context
    }

    /// The session's context, mutably
    pub fn context_mut(&mut self) -> &mut TransactionContext {
        &mut self.context
    }

    /// Whether `close()` already ran
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> TxnResult<()> {
        if self.closed {
            return Err(TxnError::illegal_state("session is closed"));
        }
        Ok(())
    }

    /// Begin a unit of work
    pub fn begin(&mut self) -> TxnResult<()> {
        self.ensure_open()?;
        self.coordinator.begin(&mut self.context)
    }

    /// Commit the unit of work
    pub fn commit(&mut self) -> TxnResult<()> {
        self.ensure_open()?;
        self.coordinator.commit(&mut self.context)
    }

    /// Roll back the unit of work
    pub fn rollback(&mut self) -> TxnResult<()> {
        self.ensure_open()?;
        self.coordinator.rollback(&mut self.context)
    }

    /// Enlist into the main group
    pub fn enlist(&mut self, resource: SharedResource) -> TxnResult<()> {
        self.ensure_open()?;
        self.coordinator.enlist(&mut self.context, resource)
    }

    /// Enlist into the prepare group
    pub fn enlist_prepare(&mut self, resource: SharedResource) -> TxnResult<()> {
        self.ensure_open()?;
        self.coordinator.enlist_prepare(&mut self.context, resource)
    }

    /// Enlist into the after-completion group
    pub fn enlist_after_completion(&mut self, resource: SharedResource) -> TxnResult<()> {
        self.ensure_open()?;
        self.coordinator
            .enlist_after_completion(&mut self.context, resource)
    }

    /// Mark the unit of work rollback-only
    pub fn set_rollback_only(&mut self) {
        self.coordinator.set_rollback_only(&mut self.context);
    }

    /// Whether the unit of work must roll back
    pub fn get_rollback_only(&self) -> bool {
        self.coordinator.get_rollback_only(&self.context)
    }

    /// Whether a unit of work is active
    pub fn is_active(&self) -> bool {
        self.coordinator.is_active(&self.context)
    }

    /// Register a listener called once when the session closes
    pub fn on_close(&mut self, listener: impl Fn(&SessionEvent) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Close the session
    ///
    /// Rolls back an unfinished unit of work, then notifies listeners in
    /// registration order. Listeners run even when the rollback fails.
    /// Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the rollback failure, if any.
    pub fn close(&mut self) -> TxnResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let rolled_back = self.context.is_active();
        let outcome = if rolled_back {
            self.coordinator.rollback(&mut self.context)
        } else {
            Ok(())
        };

        let event = SessionEvent::Closed { rolled_back };
        debug!(target: "unitwork::txn", rolled_back, listeners = self.listeners.len(), "Session closed");
        for listener in self.listeners.drain(..) {
            listener(&event);
        }
        outcome
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(target: "unitwork::txn", error = %e, "Closing session on drop failed");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("context", &self.context)
            .field("listeners", &self.listeners.len())
            .field("closed", &self.closed)
            .finish()
    }
}
