//! Shared test utilities for the integration suites.
//!
//! Import via `mod common;` from any test file.

#![allow(dead_code)]

use std::sync::{Arc, Once};
use unitwork::{
    AmbientTransactionManager, InMemoryAmbientManager, InMemoryLocalTransaction,
    LocalResourceAdapter, TransactionCoordinator,
};

pub type LocalAdapter = LocalResourceAdapter<InMemoryLocalTransaction>;

static INIT_TRACING: Once = Once::new();

/// Route coordinator logs to the test writer, once per binary.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// A local adapter over a fresh in-memory transaction.
pub fn local(name: &str) -> Arc<LocalAdapter> {
    Arc::new(LocalResourceAdapter::new(name, InMemoryLocalTransaction::new()))
}

/// A coordinator wired to a fresh in-memory ambient manager.
pub fn ambient_coordinator() -> (TransactionCoordinator, Arc<InMemoryAmbientManager>) {
    let tm = Arc::new(InMemoryAmbientManager::new());
    let manager: Arc<dyn AmbientTransactionManager> = tm.clone();
    (TransactionCoordinator::new().with_ambient_manager(manager), tm)
}
