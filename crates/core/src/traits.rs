//! Core trait definitions
//!
//! This module defines the contract between the coordinator and the
//! resources it coordinates:
//! - ResourceTransaction: one enlistable transactional resource
//!
//! The coordinator never owns a resource; it holds a [`SharedResource`]
//! handle for the lifetime of one logical transaction and drops it at
//! completion. Callers typically keep their own handle to inspect the
//! resource afterwards.

use crate::error::TxnResult;
use std::sync::Arc;

/// Shared handle to an enlisted resource
pub type SharedResource = Arc<dyn ResourceTransaction>;

/// Capability contract for enlistable transactional resources
///
/// Implementations must be `Send + Sync` so handles can be created on one
/// thread and enlisted on another. Calls for one logical transaction always
/// arrive from a single execution context, so implementations only need
/// interior mutability, not cross-thread coordination.
///
/// # Failures
///
/// A failing operation returns `TxnError::ResourceFailure` with the phase it
/// was in (`Commit`, `Rollback`, or `Setup`) and the underlying cause.
/// A failed `commit` must still release anything the adapter owns, such as a
/// pooled connection or a suspended ambient transaction.
pub trait ResourceTransaction: Send + Sync {
    /// Name used in logs and failure messages
    fn name(&self) -> &str;

    /// Begin the resource transaction
    ///
    /// Must tolerate being called when the underlying resource manager has
    /// already begun a transaction on its own.
    fn begin(&self) -> TxnResult<()>;

    /// Commit the resource transaction
    fn commit(&self) -> TxnResult<()>;

    /// Roll back the resource transaction
    fn rollback(&self) -> TxnResult<()>;

    /// Mark the resource transaction so it can only roll back
    fn set_rollback_only(&self) -> TxnResult<()>;

    /// Whether the resource transaction is marked rollback-only
    ///
    /// Queried live on every call; the coordinator never caches the answer.
    fn get_rollback_only(&self) -> TxnResult<bool>;

    /// Whether the resource transaction is currently active
    fn is_active(&self) -> TxnResult<bool>;
}
