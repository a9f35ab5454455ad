//! Per-context transaction state and scoped completion
//!
//! This module provides:
//! - `TransactionContext`: the enlistment groups and flags of one execution context
//! - `TransactionGuard`: rolls back an unfinished unit of work when dropped

pub mod context;
pub mod guard;

pub use context::{TransactionContext, TransactionState};
pub use guard::TransactionGuard;
