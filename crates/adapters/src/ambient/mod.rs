//! Ambient transaction integration
//!
//! - `manager`: the seam to an external ambient transaction manager
//! - `adapter`: the participant that joins a fresh ambient transaction
//! - `inmemory`: a complete in-process manager
//! - `suspend`: run work outside the current ambient transaction

mod adapter;
mod inmemory;
mod manager;
mod suspend;

pub use adapter::AmbientTransactionAdapter;
pub use inmemory::{AmbientFault, AmbientStats, InMemoryAmbientManager};
pub use manager::{AmbientError, AmbientStatus, AmbientTransaction, AmbientTransactionManager};
pub use suspend::suspend_ambient;
