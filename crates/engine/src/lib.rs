//! Unit-of-work coordination for unitwork
//!
//! This crate orchestrates the lower layers:
//! - Coordinator: begin/commit/rollback fan-out over enlisted resources
//! - Transaction context and RAII guard
//! - Request-scoped sessions with close listeners
//! - Configuration via `unitwork.toml`
//!
//! The engine is the only component that knows about:
//! - Enlistment groups and their completion order
//! - When the ambient adapter joins a unit of work

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod coordinator;
pub mod session;
pub mod transaction;

pub use config::{CoordinatorConfig, CONFIG_FILE_NAME};
pub use coordinator::{TransactionCoordinator, TransactionMetrics};
pub use session::{Session, SessionEvent};
pub use transaction::{TransactionContext, TransactionGuard, TransactionState};
