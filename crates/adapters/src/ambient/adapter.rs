//! Ambient transaction adapter
//!
//! Joins a fresh ambient transaction as one participant of a unit of work.
//!
//! ## Lifecycle
//!
//! ```text
//! new()       suspend current ambient txn (maybe none) -> begin owned txn
//! commit()    commit owned txn  ─┐
//! rollback()  roll back owned   ─┴─> end(): resume the suspended txn
//! ```
//!
//! `end()` runs exactly once, after the terminal call, whether or not that
//! call succeeded. If a failed terminal call left the owned transaction
//! associated, `end()` releases it first so the suspended one can be
//! resumed. An adapter dropped without a terminal call rolls back its owned
//! transaction and still resumes the suspended one.
//!
//! ## Threads
//!
//! Ambient transactions are associated with a thread. The terminal calls
//! only act while the owned transaction is associated with the calling
//! thread and return `IllegalState` otherwise, so an adapter completed or
//! dropped elsewhere never touches that thread's ambient transaction.

use super::manager::{AmbientError, AmbientStatus, AmbientTransaction, AmbientTransactionManager};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, warn};
use unitwork_core::{
    BoxError, ResourcePhase, ResourceTransaction, TranslatorChain, TxnError, TxnResult,
};

const NAME: &str = "ambient";

#[derive(Debug, Default)]
struct EndState {
    /// Transaction suspended at construction, taken by `end()`
    suspended: Option<AmbientTransaction>,
    ended: bool,
}

/// [`ResourceTransaction`] backed by a new ambient transaction
///
/// Construction and enlistment are atomic from the caller's point of view:
/// if suspend or begin fails, [`AmbientTransactionAdapter::new`] returns a
/// `SetupFailure` and no adapter exists.
pub struct AmbientTransactionAdapter {
    manager: Arc<dyn AmbientTransactionManager>,
    translators: Arc<TranslatorChain>,
    owned: Option<AmbientTransaction>,
    end_state: Mutex<EndState>,
}

impl AmbientTransactionAdapter {
    /// Suspend the calling context's ambient transaction and begin a new one
    ///
    /// # Errors
    ///
    /// Returns `TxnError::SetupFailure` if the manager cannot suspend or
    /// begin. When begin fails after a successful suspend, the suspended
    /// transaction is resumed before returning.
    pub fn new(
        manager: Arc<dyn AmbientTransactionManager>,
        translators: Arc<TranslatorChain>,
    ) -> TxnResult<Self> {
        let suspended = manager
            .suspend()
            .map_err(|e| TxnError::setup("failed to suspend ambient transaction", Some(e.into())))?;
        debug!(
            target: "unitwork::ambient",
            had_existing = suspended.is_some(),
            "Suspended ambient transaction"
        );

        let owned = match manager.begin().and_then(|()| manager.current()) {
            Ok(owned) => owned,
            Err(e) => {
                if manager.current().ok().flatten().is_some() {
                    if let Err(rollback_err) = manager.rollback() {
                        error!(target: "unitwork::ambient", error = %rollback_err, "Failed to roll back half-begun ambient transaction");
                    }
                }
                if let Some(previous) = suspended {
                    if let Err(resume_err) = manager.resume(previous) {
                        error!(
                            target: "unitwork::ambient",
                            txn = %previous,
                            error = %resume_err,
                            "Failed to resume ambient transaction after setup failure"
                        );
                    }
                }
                return Err(TxnError::setup(
                    "failed to begin ambient transaction",
                    Some(e.into()),
                ));
            }
        };
        debug!(target: "unitwork::ambient", owned = ?owned.map(|t| t.id()), "Began ambient transaction");

        Ok(Self {
            manager,
            translators,
            owned,
            end_state: Mutex::new(EndState {
                suspended,
                ended: false,
            }),
        })
    }

    /// Ambient transaction begun by this adapter
    pub fn owned(&self) -> Option<AmbientTransaction> {
        self.owned
    }

    /// Ambient transaction suspended at construction, until it is resumed
    pub fn suspended(&self) -> Option<AmbientTransaction> {
        self.end_state.lock().suspended
    }

    /// Whether the terminal cleanup step already ran
    pub fn is_ended(&self) -> bool {
        self.end_state.lock().ended
    }

    /// Pass a manager failure through the translator chain
    ///
    /// A commit refused because the transaction rolled back is unwrapped to
    /// its cause first, so translators see the real reason.
    fn translate(&self, phase: ResourcePhase, err: AmbientError) -> TxnError {
        let cause: BoxError = match err {
            AmbientError::RolledBack { cause: Some(cause) } => cause,
            other => Box::new(other),
        };
        self.translators.translate(phase, NAME, cause)
    }

    /// Whether the owned transaction is associated with the calling thread
    ///
    /// A failing `current()` query cannot disprove ownership and counts as
    /// owned.
    fn owns_current(&self) -> bool {
        match (self.owned, self.manager.current()) {
            (Some(owned), Ok(current)) => current == Some(owned),
            _ => true,
        }
    }

    fn ensure_owned(&self, phase: ResourcePhase) -> TxnResult<()> {
        if self.owns_current() {
            return Ok(());
        }
        Err(TxnError::illegal_state(format!(
            "ambient {} called while {} is not associated with the calling thread",
            phase,
            self.owned.map_or_else(|| "no transaction".to_string(), |t| t.to_string()),
        )))
    }

    /// Detach the owned transaction if a failed terminal call left it associated
    fn release_owned(&self) {
        let Some(owned) = self.owned else {
            return;
        };
        if self.manager.current().ok().flatten() != Some(owned) {
            return;
        }
        warn!(target: "unitwork::ambient", txn = %owned, "Owned ambient transaction still associated; rolling back");
        let Err(rollback_err) = self.manager.rollback() else {
            return;
        };
        error!(target: "unitwork::ambient", txn = %owned, error = %rollback_err, "Rollback of owned ambient transaction failed; detaching it");
        if let Err(suspend_err) = self.manager.suspend() {
            error!(target: "unitwork::ambient", txn = %owned, error = %suspend_err, "Failed to detach owned ambient transaction");
        }
    }

    /// Release the owned transaction and resume the suspended one, once
    ///
    /// If the resume fails the suspended handle stays available through
    /// [`suspended`](Self::suspended).
    fn end(&self) -> TxnResult<()> {
        let mut state = self.end_state.lock();
        if state.ended {
            return Ok(());
        }
        debug!(target: "unitwork::ambient", "Ambient adapter end");
        self.release_owned();
        state.ended = true;

        let Some(previous) = state.suspended.take() else {
            return Ok(());
        };
        debug!(target: "unitwork::ambient", txn = %previous, "Resuming suspended ambient transaction");
        self.manager.resume(previous).map_err(|e| {
            state.suspended = Some(previous);
            TxnError::setup(
                format!("failed to resume suspended {}", previous),
                Some(e.into()),
            )
        })
    }

    /// Run `end()` and merge its outcome with the terminal call's
    fn finish(&self, outcome: TxnResult<()>) -> TxnResult<()> {
        let ended = self.end();
        match (outcome, ended) {
            (Err(e), Err(end_err)) => {
                error!(target: "unitwork::ambient", error = %end_err, "Resume failed after failed terminal call");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), ended) => ended,
        }
    }
}

impl ResourceTransaction for AmbientTransactionAdapter {
    fn name(&self) -> &str {
        NAME
    }

    /// No-op: the ambient transaction was begun by construction
    fn begin(&self) -> TxnResult<()> {
        Ok(())
    }

    fn commit(&self) -> TxnResult<()> {
        debug!(target: "unitwork::ambient", "Ambient adapter commit");
        self.ensure_owned(ResourcePhase::Commit)?;
        let outcome = self
            .manager
            .commit()
            .map_err(|e| self.translate(ResourcePhase::Commit, e));
        self.finish(outcome)
    }

    fn rollback(&self) -> TxnResult<()> {
        debug!(target: "unitwork::ambient", "Ambient adapter rollback");
        self.ensure_owned(ResourcePhase::Rollback)?;
        let outcome = self
            .manager
            .rollback()
            .map_err(|e| self.translate(ResourcePhase::Rollback, e));
        self.finish(outcome)
    }

    fn set_rollback_only(&self) -> TxnResult<()> {
        self.manager
            .set_rollback_only()
            .map_err(|e| self.translate(ResourcePhase::Setup, e))
    }

    fn get_rollback_only(&self) -> TxnResult<bool> {
        self.manager
            .status()
            .map(|status| status == AmbientStatus::MarkedRollback)
            .map_err(|e| self.translate(ResourcePhase::Setup, e))
    }

    fn is_active(&self) -> TxnResult<bool> {
        self.manager
            .status()
            .map(|status| status == AmbientStatus::Active)
            .map_err(|e| self.translate(ResourcePhase::Setup, e))
    }
}

impl Drop for AmbientTransactionAdapter {
    fn drop(&mut self) {
        if self.is_ended() {
            return;
        }
        warn!(
            target: "unitwork::ambient",
            owned = ?self.owned.map(|t| t.id()),
            "Ambient adapter dropped without commit or rollback; rolling back"
        );
        if let Err(e) = self.rollback() {
            error!(target: "unitwork::ambient", error = %e, "Rollback on drop failed");
        }
    }
}

impl std::fmt::Debug for AmbientTransactionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmbientTransactionAdapter")
            .field("owned", &self.owned)
            .field("suspended", &self.suspended())
            .field("ended", &self.is_ended())
            .finish()
    }
}
