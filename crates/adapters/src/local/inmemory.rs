//! In-memory resource-local transaction
//!
//! Tracks begin/commit/rollback state the way a database session would,
//! without a database. Commit and rollback failures can be armed one call
//! at a time.

use super::adapter::{LocalError, LocalTransaction};
use unitwork_core::BoxError;

/// Resource-local transaction kept in memory
#[derive(Debug, Default)]
pub struct InMemoryLocalTransaction {
    active: bool,
    rollback_only: bool,
    begins: u64,
    commits: u64,
    rollbacks: u64,
    fail_begin: Option<BoxError>,
    fail_commit: Option<BoxError>,
    fail_rollback: Option<BoxError>,
}

impl InMemoryLocalTransaction {
    /// Create an idle transaction
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `begin` fail with `cause`
    pub fn fail_next_begin(&mut self, cause: impl Into<BoxError>) {
        self.fail_begin = Some(cause.into());
    }

    /// Make the next `commit` fail with `cause`
    ///
    /// The transaction still ends, as a real session's would.
    pub fn fail_next_commit(&mut self, cause: impl Into<BoxError>) {
        self.fail_commit = Some(cause.into());
    }

    /// Make the next `rollback` fail with `cause`
    pub fn fail_next_rollback(&mut self, cause: impl Into<BoxError>) {
        self.fail_rollback = Some(cause.into());
    }

    /// Number of successful begins
    pub fn begins(&self) -> u64 {
        self.begins
    }

    /// Number of successful commits
    pub fn commits(&self) -> u64 {
        self.commits
    }

    /// Number of rollbacks, including commits refused for rollback-only
    pub fn rollbacks(&self) -> u64 {
        self.rollbacks
    }

    fn end(&mut self) {
        self.active = false;
        self.rollback_only = false;
    }
}

impl LocalTransaction for InMemoryLocalTransaction {
    fn begin(&mut self) -> Result<(), LocalError> {
        if let Some(cause) = self.fail_begin.take() {
            return Err(LocalError::persistence("begin failed", cause));
        }
        self.active = true;
        self.rollback_only = false;
        self.begins += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), LocalError> {
        if !self.active {
            return Err(LocalError::NotActive);
        }
        if let Some(cause) = self.fail_commit.take() {
            self.end();
            return Err(LocalError::persistence("commit failed", cause));
        }
        if self.rollback_only {
            self.end();
            self.rollbacks += 1;
            return Err(LocalError::RollbackOnly);
        }
        self.end();
        self.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), LocalError> {
        if !self.active {
            return Err(LocalError::NotActive);
        }
        if let Some(cause) = self.fail_rollback.take() {
            self.end();
            return Err(LocalError::persistence("rollback failed", cause));
        }
        self.end();
        self.rollbacks += 1;
        Ok(())
    }

    fn set_rollback_only(&mut self) -> Result<(), LocalError> {
        if !self.active {
            return Err(LocalError::NotActive);
        }
        self.rollback_only = true;
        Ok(())
    }

    fn rollback_only(&self) -> bool {
        self.rollback_only
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
