//! unitwork - in-process unit-of-work coordination
//!
//! unitwork lets any number of independently transactional resources join one
//! logical unit of work per execution context, and commits or rolls them back
//! together with defined ordering and failure aggregation.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use unitwork::prelude::*;
//!
//! let coordinator = TransactionCoordinator::new();
//! let mut ctx = coordinator.new_context();
//!
//! let orders = Arc::new(LocalResourceAdapter::new("orders", InMemoryLocalTransaction::new()));
//!
//! coordinator.begin(&mut ctx)?;
//! coordinator.enlist(&mut ctx, orders.clone())?;
//! coordinator.commit(&mut ctx)?;
//!
//! assert!(!orders.is_active()?);
//! # Ok::<(), unitwork::TxnError>(())
//! ```
//!
//! # Architecture
//!
//! - `unitwork-core`: the participant contract, error type and translators
//! - `unitwork-adapters`: ambient and resource-local adapters, in-memory managers
//! - `unitwork-engine`: the coordinator, contexts, guards, sessions and config
//!
//! The coordinator is best effort. There is no durable prepare record, so a
//! failure after some prepare resources committed leaves them committed.

pub use unitwork_adapters::{
    suspend_ambient, testing, AmbientError, AmbientFault, AmbientStats, AmbientStatus,
    AmbientTransaction, AmbientTransactionAdapter, AmbientTransactionManager,
    InMemoryAmbientManager, InMemoryLocalTransaction, LocalError, LocalResourceAdapter,
    LocalTransaction,
};
pub use unitwork_core::{
    AmbientPolicy, BoxError, EnlistGroup, FailureTranslator, ResourcePhase, ResourceTransaction,
    SharedResource, TranslatorChain, TxnError, TxnResult,
};
pub use unitwork_engine::{
    CoordinatorConfig, Session, SessionEvent, TransactionContext, TransactionCoordinator,
    TransactionGuard, TransactionMetrics, TransactionState, CONFIG_FILE_NAME,
};

/// Common imports for embedders
pub mod prelude {
    pub use crate::{
        AmbientPolicy, AmbientTransactionManager, CoordinatorConfig, InMemoryAmbientManager,
        InMemoryLocalTransaction, LocalResourceAdapter, LocalTransaction, ResourceTransaction,
        Session, SharedResource, TransactionContext, TransactionCoordinator, TxnError, TxnResult,
    };
}
