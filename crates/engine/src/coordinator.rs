//! Transaction coordinator for unit-of-work lifecycle
//!
//! The coordinator owns the completion protocol. State lives in the
//! caller's [`TransactionContext`]; the coordinator itself only holds the
//! shared collaborators (ambient manager, translator chain, config) and
//! metrics, so one coordinator serves any number of contexts.
//!
//! # Completion order
//!
//! ```text
//! commit:   prepare ──ok──> main ──ok──> after-completion (commit)
//!              │              └──err──> after-completion (rollback)
//!              └──err──> main + after-completion (rollback)
//! rollback: main ──> after-completion
//! ```
//!
//! Every resource in a pass is attempted. Only the first failure of the
//! deciding pass is returned; later failures are logged.

use crate::config::CoordinatorConfig;
use crate::transaction::{TransactionContext, TransactionGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use unitwork_adapters::{AmbientTransactionAdapter, AmbientTransactionManager};
use unitwork_core::{
    AmbientPolicy, EnlistGroup, ResourcePhase, ResourceTransaction, SharedResource,
    TranslatorChain, TxnError, TxnResult,
};

/// Coordinates enlisted resources through begin, commit and rollback
///
/// # Memory Ordering
///
/// The metric counters use Relaxed ordering. They are observational only and
/// never synchronize other memory.
pub struct TransactionCoordinator {
    /// Ambient manager used under `RequiresNew`
    ambient: Option<Arc<dyn AmbientTransactionManager>>,
    /// Translators handed to every ambient adapter
    translators: Arc<TranslatorChain>,
    config: CoordinatorConfig,
    next_txn_id: AtomicU64,
    /// Active unit-of-work count (for metrics) - uses Relaxed ordering
    active_count: AtomicU64,
    /// Total units of work begun - uses Relaxed ordering
    total_started: AtomicU64,
    /// Total successful commits - uses Relaxed ordering
    total_committed: AtomicU64,
    /// Total successful rollbacks - uses Relaxed ordering
    total_rolled_back: AtomicU64,
    /// Total terminal calls that returned a failure - uses Relaxed ordering
    total_failed: AtomicU64,
}

impl TransactionCoordinator {
    /// Create a coordinator with no ambient manager and the default config
    pub fn new() -> Self {
        Self {
            ambient: None,
            translators: Arc::new(TranslatorChain::new()),
            config: CoordinatorConfig::default(),
            next_txn_id: AtomicU64::new(1),
            active_count: AtomicU64::new(0),
            total_started: AtomicU64::new(0),
            total_committed: AtomicU64::new(0),
            total_rolled_back: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
        }
    }

    /// Use `manager` for ambient integration
    pub fn with_ambient_manager(mut self, manager: Arc<dyn AmbientTransactionManager>) -> Self {
        self.ambient = Some(manager);
        self
    }

    /// Replace the translator chain given to ambient adapters
    pub fn with_translators(mut self, translators: TranslatorChain) -> Self {
        self.translators = Arc::new(translators);
        self
    }

    /// Replace the config
    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Active config
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Translator chain given to ambient adapters
    pub fn translators(&self) -> &TranslatorChain {
        &self.translators
    }

    /// The configured ambient manager, if any
    pub fn ambient_manager(&self) -> Option<&Arc<dyn AmbientTransactionManager>> {
        self.ambient.as_ref()
    }

    /// Create an idle context carrying the configured default policy
    pub fn new_context(&self) -> TransactionContext {
        TransactionContext::with_policy(self.config.ambient_policy)
    }

    /// Ambient manager to use for a unit of work under `policy`
    fn ambient_for(&self, policy: AmbientPolicy) -> Option<&Arc<dyn AmbientTransactionManager>> {
        match policy {
            AmbientPolicy::RequiresNew if self.config.ambient_integration => self.ambient.as_ref(),
            _ => None,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Begin a unit of work on `ctx`
    ///
    /// Under `RequiresNew` with an ambient manager configured, an
    /// [`AmbientTransactionAdapter`] is appended to the main group first.
    /// Then every main-group resource is begun in enlistment order.
    ///
    /// # Errors
    ///
    /// - `IllegalState` if `ctx` is already active
    /// - the ambient adapter's `SetupFailure`, or the first failing resource
    ///   begin. The unit of work is then discarded: resources begun by this
    ///   call are rolled back, every enlistment is dropped and `ctx` stays idle.
    pub fn begin(&self, ctx: &mut TransactionContext) -> TxnResult<()> {
        if ctx.active {
            return Err(TxnError::illegal_state("transaction already active"));
        }
        ctx.completed = false;
        ctx.rollback_only = false;

        let ambient_index = match self.ambient_for(ctx.policy) {
            Some(manager) => {
                match AmbientTransactionAdapter::new(Arc::clone(manager), Arc::clone(&self.translators)) {
                    Ok(adapter) => {
                        ctx.main_group.push(Arc::new(adapter));
                        Some(ctx.main_group.len() - 1)
                    }
                    Err(e) => {
                        warn!(target: "unitwork::txn", error = %e, "Ambient setup failed; discarding unit of work");
                        drop(ctx.take_enlisted());
                        return Err(e);
                    }
                }
            }
            None => None,
        };

        let mut begun = 0;
        let mut failure = None;
        for resource in &ctx.main_group {
            debug!(target: "unitwork::txn", resource = resource.name(), "Beginning resource");
            if let Err(e) = resource.begin() {
                failure = Some(e);
                break;
            }
            begun += 1;
        }

        if let Some(e) = failure {
            warn!(target: "unitwork::txn", error = %e, "Resource begin failed; discarding unit of work");
            let enlisted = ctx.take_enlisted();
            for (index, resource) in enlisted.main.iter().enumerate() {
                if index < begun || Some(index) == ambient_index {
                    if let Err(rollback_err) = resource.rollback() {
                        error!(
                            target: "unitwork::txn",
                            resource = resource.name(),
                            error = %rollback_err,
                            "Rollback after failed begin failed"
                        );
                    }
                }
            }
            return Err(e);
        }

        let txn_id = self.next_txn_id.fetch_add(1, Ordering::Relaxed);
        ctx.txn_id = Some(txn_id);
        ctx.active = true;
        self.active_count.fetch_add(1, Ordering::Relaxed);
        self.total_started.fetch_add(1, Ordering::Relaxed);

        debug!(
            target: "unitwork::txn",
            txn_id,
            policy = %ctx.policy,
            main = ctx.main_group.len(),
            "Transaction started"
        );
        Ok(())
    }

    /// Commit the unit of work on `ctx`
    ///
    /// Prepare resources commit first. If any fails, the main and
    /// after-completion groups are rolled back and the first prepare failure
    /// is returned. Prepare resources that already committed stay committed.
    /// Otherwise the main group commits, then the after-completion group
    /// commits when main succeeded or rolls back when it did not.
    ///
    /// The rollback-only flag is not consulted; use [`Self::run`] or check
    /// [`Self::get_rollback_only`] before calling.
    ///
    /// # Errors
    ///
    /// - `IllegalState` if `ctx` was never begun
    /// - the first failure of the deciding pass
    ///
    /// A second call after completion returns `Ok(())` without touching any
    /// resource.
    pub fn commit(&self, ctx: &mut TransactionContext) -> TxnResult<()> {
        if ctx.completed {
            return Ok(());
        }
        if !ctx.active {
            return Err(TxnError::illegal_state("no active transaction to commit"));
        }
        ctx.completed = true;
        let txn_id = ctx.txn_id;
        let enlisted = ctx.take_enlisted();

        let failure = match fan_out(txn_id, EnlistGroup::Prepare, ResourcePhase::Commit, &enlisted.prepare) {
            Some(prepare_failure) => {
                warn!(target: "unitwork::txn", ?txn_id, error = %prepare_failure, "Prepare failed; rolling back");
                discard(fan_out(txn_id, EnlistGroup::Main, ResourcePhase::Rollback, &enlisted.main));
                discard(fan_out(txn_id, EnlistGroup::AfterCompletion, ResourcePhase::Rollback, &enlisted.after));
                Some(prepare_failure)
            }
            None => match fan_out(txn_id, EnlistGroup::Main, ResourcePhase::Commit, &enlisted.main) {
                Some(main_failure) => {
                    warn!(target: "unitwork::txn", ?txn_id, error = %main_failure, "Commit failed; rolling back after-completion resources");
                    discard(fan_out(txn_id, EnlistGroup::AfterCompletion, ResourcePhase::Rollback, &enlisted.after));
                    Some(main_failure)
                }
                None => fan_out(txn_id, EnlistGroup::AfterCompletion, ResourcePhase::Commit, &enlisted.after),
            },
        };

        ctx.active = false;
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        match failure {
            None => {
                self.total_committed.fetch_add(1, Ordering::Relaxed);
                info!(target: "unitwork::txn", ?txn_id, "Transaction committed");
                Ok(())
            }
            Some(e) => {
                self.total_failed.fetch_add(1, Ordering::Relaxed);
                warn!(target: "unitwork::txn", ?txn_id, error = %e, "Transaction aborted");
                Err(e)
            }
        }
    }

    /// Roll back the unit of work on `ctx`
    ///
    /// The main group rolls back, then the after-completion group. Prepare
    /// resources are not touched.
    ///
    /// A call after completion, or on a context that was never begun, is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns the first rollback failure; every resource is still attempted.
    pub fn rollback(&self, ctx: &mut TransactionContext) -> TxnResult<()> {
        if ctx.completed || !ctx.active {
            return Ok(());
        }
        ctx.completed = true;
        let txn_id = ctx.txn_id;
        let enlisted = ctx.take_enlisted();

        let mut failure = fan_out(txn_id, EnlistGroup::Main, ResourcePhase::Rollback, &enlisted.main);
        if let Some(after_failure) =
            fan_out(txn_id, EnlistGroup::AfterCompletion, ResourcePhase::Rollback, &enlisted.after)
        {
            keep_first(&mut failure, after_failure);
        }

        ctx.active = false;
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        match failure {
            None => {
                self.total_rolled_back.fetch_add(1, Ordering::Relaxed);
                info!(target: "unitwork::txn", ?txn_id, "Transaction rolled back");
                Ok(())
            }
            Some(e) => {
                self.total_failed.fetch_add(1, Ordering::Relaxed);
                warn!(target: "unitwork::txn", ?txn_id, error = %e, "Rollback failed");
                Err(e)
            }
        }
    }

    // ========================================================================
    // Rollback-only and status
    // ========================================================================

    /// Mark the unit of work on `ctx` rollback-only
    ///
    /// Only the context flag is set; enlisted resources are not told.
    pub fn set_rollback_only(&self, ctx: &mut TransactionContext) {
        ctx.rollback_only = true;
    }

    /// Whether the unit of work must roll back
    ///
    /// True when the context flag is set or any main-group resource votes
    /// rollback-only. A resource whose status query fails counts as a vote.
    pub fn get_rollback_only(&self, ctx: &TransactionContext) -> bool {
        if ctx.rollback_only {
            return true;
        }
        ctx.main_group.iter().any(|resource| match resource.get_rollback_only() {
            Ok(vote) => vote,
            Err(e) => {
                warn!(
                    target: "unitwork::txn",
                    resource = resource.name(),
                    error = %e,
                    "Rollback-only query failed; treating as rollback-only"
                );
                true
            }
        })
    }

    /// Whether `ctx` has an active unit of work
    pub fn is_active(&self, ctx: &TransactionContext) -> bool {
        ctx.active
    }

    /// Ambient policy of `ctx`
    pub fn policy(&self, ctx: &TransactionContext) -> AmbientPolicy {
        ctx.policy
    }

    /// Replace the ambient policy of `ctx`, effective from the next `begin`
    pub fn set_policy(&self, ctx: &mut TransactionContext, policy: AmbientPolicy) {
        ctx.policy = policy;
    }

    // ========================================================================
    // Enlistment
    // ========================================================================

    /// Enlist into the main group
    ///
    /// # Errors
    ///
    /// Fails if `ctx` is active and the eager begin of `resource` fails; the
    /// resource is then not enlisted.
    pub fn enlist(&self, ctx: &mut TransactionContext, resource: SharedResource) -> TxnResult<()> {
        self.enlist_into(ctx, EnlistGroup::Main, resource)
    }

    /// Enlist into the prepare group
    pub fn enlist_prepare(&self, ctx: &mut TransactionContext, resource: SharedResource) -> TxnResult<()> {
        self.enlist_into(ctx, EnlistGroup::Prepare, resource)
    }

    /// Enlist into the after-completion group
    pub fn enlist_after_completion(
        &self,
        ctx: &mut TransactionContext,
        resource: SharedResource,
    ) -> TxnResult<()> {
        self.enlist_into(ctx, EnlistGroup::AfterCompletion, resource)
    }

    fn enlist_into(
        &self,
        ctx: &mut TransactionContext,
        group: EnlistGroup,
        resource: SharedResource,
    ) -> TxnResult<()> {
        if ctx.active && !resource.is_active()? {
            debug!(target: "unitwork::txn", resource = resource.name(), %group, "Eager begin on late enlist");
            resource.begin()?;
        }
        debug!(target: "unitwork::txn", txn_id = ?ctx.txn_id, resource = resource.name(), %group, "Enlisted resource");
        ctx.group_mut(group).push(resource);
        Ok(())
    }

    // ========================================================================
    // Scoped helpers
    // ========================================================================

    /// Run `work` as one unit of work on `ctx`
    ///
    /// Begins, runs `work`, then commits on `Ok` or rolls back on `Err`. A
    /// unit of work that is rollback-only after `work` returns `Ok` is rolled
    /// back and the value is still returned.
    ///
    /// # Errors
    ///
    /// - a begin failure; `work` does not run
    /// - the error of `work`; a rollback failure after it is logged
    /// - the commit or rollback failure after a successful `work`
    pub fn run<T, E, F>(&self, ctx: &mut TransactionContext, work: F) -> Result<T, E>
    where
        E: From<TxnError>,
        F: FnOnce(&Self, &mut TransactionContext) -> Result<T, E>,
    {
        self.begin(ctx)?;
        match work(self, ctx) {
            Ok(value) => {
                if self.get_rollback_only(ctx) {
                    debug!(target: "unitwork::txn", txn_id = ?ctx.txn_id, "Rollback-only; rolling back");
                    self.rollback(ctx)?;
                } else {
                    self.commit(ctx)?;
                }
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = self.rollback(ctx) {
                    error!(
                        target: "unitwork::txn",
                        txn_id = ?ctx.txn_id,
                        error = %rollback_err,
                        "Rollback after failed work failed"
                    );
                }
                Err(e)
            }
        }
    }

    /// Begin a unit of work on `ctx` and guard it
    ///
    /// # Errors
    ///
    /// Same as [`Self::begin`].
    pub fn guard<'a>(&'a self, ctx: &'a mut TransactionContext) -> TxnResult<TransactionGuard<'a>> {
        self.begin(ctx)?;
        Ok(TransactionGuard::new(self, ctx))
    }

    // ========================================================================
    // Metrics
    // ========================================================================

    /// Snapshot of the coordinator counters
    pub fn metrics(&self) -> TransactionMetrics {
        TransactionMetrics {
            active_count: self.active_count.load(Ordering::Relaxed),
            total_started: self.total_started.load(Ordering::Relaxed),
            total_committed: self.total_committed.load(Ordering::Relaxed),
            total_rolled_back: self.total_rolled_back.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for TransactionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("ambient", &self.ambient.is_some())
            .field("translators", &self.translators.len())
            .field("config", &self.config)
            .field("metrics", &self.metrics())
            .finish()
    }
}

/// Call `phase` on every resource of one group, keeping the first failure
fn fan_out(
    txn_id: Option<u64>,
    group: EnlistGroup,
    phase: ResourcePhase,
    resources: &[SharedResource],
) -> Option<TxnError> {
    let mut first = None;
    for resource in resources {
        debug!(target: "unitwork::txn", ?txn_id, resource = resource.name(), %group, %phase, "Completing resource");
        let outcome = match phase {
            ResourcePhase::Commit => resource.commit(),
            ResourcePhase::Rollback => resource.rollback(),
            ResourcePhase::Setup => resource.begin(),
        };
        if let Err(e) = outcome {
            keep_first(&mut first, e);
        }
    }
    first
}

fn keep_first(first: &mut Option<TxnError>, failure: TxnError) {
    match first {
        None => *first = Some(failure),
        Some(kept) => {
            error!(target: "unitwork::txn", kept = %kept, error = %failure, "Discarding failure after earlier failure");
        }
    }
}

/// Log the failure of a rollback pass whose outcome is superseded
fn discard(failure: Option<TxnError>) {
    if let Some(e) = failure {
        error!(target: "unitwork::txn", error = %e, "Rollback failure discarded in favour of earlier failure");
    }
}

/// Snapshot of coordinator counters
///
/// Every terminal call that does work lands in exactly one of
/// `total_committed`, `total_rolled_back` or `total_failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionMetrics {
    /// Units of work currently active
    pub active_count: u64,
    /// Units of work begun
    pub total_started: u64,
    /// Successful commits
    pub total_committed: u64,
    /// Successful rollbacks
    pub total_rolled_back: u64,
    /// Commits or rollbacks that returned a failure
    pub total_failed: u64,
}

impl TransactionMetrics {
    /// Units of work that reached a terminal call
    pub fn total_completed(&self) -> u64 {
        self.total_committed + self.total_rolled_back + self.total_failed
    }

    /// Commit success rate (committed / started)
    pub fn commit_rate(&self) -> f64 {
        if self.total_started > 0 {
            self.total_committed as f64 / self.total_started as f64
        } else {
            0.0
        }
    }
}
