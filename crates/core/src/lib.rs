//! Core types and traits for unitwork
//!
//! This crate defines the foundational pieces shared by every other crate:
//! - ResourceTransaction: the contract every enlistable resource implements
//! - AmbientPolicy: whether a unit of work joins a fresh ambient transaction
//! - ResourcePhase / EnlistGroup: labels used in failures and logs
//! - TxnError: error type hierarchy
//! - TranslatorChain: ordered registry of failure translators

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod translate;
pub mod types;

pub use error::{BoxError, TxnError, TxnResult};
pub use traits::{ResourceTransaction, SharedResource};
pub use translate::{FailureTranslator, TranslatorChain};
pub use types::{AmbientPolicy, EnlistGroup, ResourcePhase};
