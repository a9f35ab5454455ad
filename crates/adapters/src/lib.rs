//! Resource adapters for the unitwork coordinator
//!
//! This crate turns concrete transactional resources into
//! [`ResourceTransaction`](unitwork_core::ResourceTransaction) participants:
//! - Ambient adapter: joins a fresh transaction of an external ambient
//!   transaction manager, suspending and later resuming whatever transaction
//!   the calling context already had
//! - Local adapter: wraps one resource-local transaction (a database session)
//! - In-memory implementations of both seams for embedders and tests
//! - Testing utilities: a recording resource with failure injection

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ambient;
pub mod local;
pub mod testing;

pub use ambient::{
    suspend_ambient, AmbientError, AmbientFault, AmbientStats, AmbientStatus, AmbientTransaction,
    AmbientTransactionAdapter, AmbientTransactionManager, InMemoryAmbientManager,
};
pub use local::{InMemoryLocalTransaction, LocalError, LocalResourceAdapter, LocalTransaction};
