//! Per-execution-context transaction state
//!
//! A `TransactionContext` belongs to exactly one thread or task. It is
//! mutated only through `&mut` borrows handed to the coordinator, so it needs
//! no locking.
//!
//! # State machine
//!
//! ```text
//!            begin()               commit() / rollback()
//!   Idle ───────────────> Active ─────────────────────────> Completed
//!    ^                                                          │
//!    └──────────────────────── begin() ─────────────────────────┘
//! ```

use std::fmt;
use unitwork_core::{AmbientPolicy, EnlistGroup, SharedResource};

/// Observable state of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Never begun, or a begin failed
    Idle,
    /// Between `begin` and the terminal call
    Active,
    /// The terminal call ran; further commit/rollback calls are no-ops
    Completed,
}

/// Resources drained from a context at completion
#[derive(Default)]
pub(crate) struct Enlisted {
    pub(crate) prepare: Vec<SharedResource>,
    pub(crate) main: Vec<SharedResource>,
    pub(crate) after: Vec<SharedResource>,
}

/// Mutable unit-of-work state for one execution context
///
/// Holds the three enlistment groups in insertion order. The coordinator
/// drains the groups at completion, so resources live for one logical
/// transaction only.
pub struct TransactionContext {
    pub(crate) txn_id: Option<u64>,
    pub(crate) active: bool,
    pub(crate) rollback_only: bool,
    pub(crate) completed: bool,
    pub(crate) policy: AmbientPolicy,
    pub(crate) prepare_group: Vec<SharedResource>,
    pub(crate) main_group: Vec<SharedResource>,
    pub(crate) after_group: Vec<SharedResource>,
}

impl TransactionContext {
    /// Create an idle context with the default policy
    pub fn new() -> Self {
        Self::with_policy(AmbientPolicy::default())
    }

    /// Create an idle context with `policy`
    pub fn with_policy(policy: AmbientPolicy) -> Self {
        Self {
            txn_id: None,
            active: false,
            rollback_only: false,
            completed: false,
            policy,
            prepare_group: Vec::new(),
            main_group: Vec::new(),
            after_group: Vec::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> TransactionState {
        if self.active {
            TransactionState::Active
        } else if self.completed {
            TransactionState::Completed
        } else {
            TransactionState::Idle
        }
    }

    /// Whether a unit of work is active
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the last unit of work reached its terminal call
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Id assigned by the coordinator at the last successful `begin`
    pub fn txn_id(&self) -> Option<u64> {
        self.txn_id
    }

    /// Ambient policy applied by the next `begin`
    pub fn policy(&self) -> AmbientPolicy {
        self.policy
    }

    /// Replace the ambient policy
    pub fn set_policy(&mut self, policy: AmbientPolicy) {
        self.policy = policy;
    }

    /// Resources currently enlisted in `group`
    pub fn resources(&self, group: EnlistGroup) -> &[SharedResource] {
        match group {
            EnlistGroup::Prepare => &self.prepare_group,
            EnlistGroup::Main => &self.main_group,
            EnlistGroup::AfterCompletion => &self.after_group,
        }
    }

    /// Total number of enlisted resources
    pub fn enlisted_count(&self) -> usize {
        self.prepare_group.len() + self.main_group.len() + self.after_group.len()
    }

    pub(crate) fn group_mut(&mut self, group: EnlistGroup) -> &mut Vec<SharedResource> {
        match group {
            EnlistGroup::Prepare => &mut self.prepare_group,
            EnlistGroup::Main => &mut self.main_group,
            EnlistGroup::AfterCompletion => &mut self.after_group,
        }
    }

    /// Move every enlisted resource out of the context
    pub(crate) fn take_enlisted(&mut self) -> Enlisted {
        Enlisted {
            prepare: std::mem::take(&mut self.prepare_group),
            main: std::mem::take(&mut self.main_group),
            after: std::mem::take(&mut self.after_group),
        }
    }
}

impl Default for TransactionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionContext")
            .field("txn_id", &self.txn_id)
            .field("state", &self.state())
            .field("rollback_only", &self.rollback_only)
            .field("policy", &self.policy)
            .field("prepare", &self.prepare_group.len())
            .field("main", &self.main_group.len())
            .field("after_completion", &self.after_group.len())
            .finish()
    }
}
