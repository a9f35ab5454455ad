//! Resource-local transactions
//!
//! [`LocalTransaction`] is the seam the persistence layer implements for one
//! session; [`LocalResourceAdapter`] turns it into a coordinator participant.

mod adapter;
mod inmemory;

pub use adapter::{LocalError, LocalResourceAdapter, LocalTransaction};
pub use inmemory::InMemoryLocalTransaction;
