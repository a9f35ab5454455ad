//! Testing utilities for coordinator participants
//!
//! - **CallLog**: shared, ordered record of every call made to participants
//! - **RecordingResource**: a [`ResourceTransaction`] that records its calls
//!   into a `CallLog` and fails on demand
//!
//! # Example
//!
//! ```
//! use unitwork_adapters::testing::{Call, CallLog, RecordingResource};
//! use unitwork_core::ResourceTransaction;
//!
//! let log = CallLog::new();
//! let db = RecordingResource::new("db", &log).failing_commit();
//!
//! db.begin().unwrap();
//! assert!(db.commit().is_err());
//! assert_eq!(log.calls_for("db"), vec![Call::Begin, Call::Commit]);
//! ```

use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use unitwork_core::{ResourcePhase, ResourceTransaction, TxnError, TxnResult};

/// A call made to a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    /// `begin`
    Begin,
    /// `commit`
    Commit,
    /// `rollback`
    Rollback,
    /// `set_rollback_only`
    SetRollbackOnly,
}

/// One entry of a [`CallLog`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    /// Participant name
    pub resource: String,
    /// The call
    pub call: Call,
}

/// Failure raised by a [`RecordingResource`] armed to fail
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("injected {call:?} failure in '{resource}'")]
pub struct InjectedFailure {
    /// Participant name
    pub resource: String,
    /// The call that failed
    pub call: Call,
}

/// Ordered record of participant calls, shared between resources
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<CallRecord>>>,
}

impl CallLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a call
    pub fn record(&self, resource: &str, call: Call) {
        self.entries.lock().push(CallRecord {
            resource: resource.to_string(),
            call,
        });
    }

    /// Every call, in order
    pub fn entries(&self) -> Vec<CallRecord> {
        self.entries.lock().clone()
    }

    /// Calls made to one participant, in order
    pub fn calls_for(&self, resource: &str) -> Vec<Call> {
        self.entries
            .lock()
            .iter()
            .filter(|r| r.resource == resource)
            .map(|r| r.call)
            .collect()
    }

    /// How many times `resource` received `call`
    pub fn count(&self, resource: &str, call: Call) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|r| r.resource == resource && r.call == call)
            .count()
    }

    /// Participants that received `call`, in call order
    pub fn order_of(&self, call: Call) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|r| r.call == call)
            .map(|r| r.resource.clone())
            .collect()
    }

    /// Forget every recorded call
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[derive(Debug, Default)]
struct Behavior {
    active: bool,
    rollback_only: bool,
    fail_begin: bool,
    fail_commit: bool,
    fail_rollback: bool,
    fail_status: bool,
}

/// Participant that records every call and fails on demand
///
/// Failure switches are sticky: an armed operation fails on every call.
#[derive(Debug)]
pub struct RecordingResource {
    name: String,
    log: CallLog,
    behavior: Mutex<Behavior>,
}

impl RecordingResource {
    /// Create an idle participant logging into `log`
    pub fn new(name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            behavior: Mutex::new(Behavior::default()),
        }
    }

    /// Wrap into a shared handle
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Fail every `begin`
    pub fn failing_begin(self) -> Self {
        self.behavior.lock().fail_begin = true;
        self
    }

    /// Fail every `commit`
    pub fn failing_commit(self) -> Self {
        self.behavior.lock().fail_commit = true;
        self
    }

    /// Fail every `rollback`
    pub fn failing_rollback(self) -> Self {
        self.behavior.lock().fail_rollback = true;
        self
    }

    /// Fail every status query
    pub fn failing_status(self) -> Self {
        self.behavior.lock().fail_status = true;
        self
    }

    /// Report active before anyone calls `begin`, like an auto-beginning resource
    pub fn already_active(self) -> Self {
        self.behavior.lock().active = true;
        self
    }

    /// Report rollback-only from the start
    pub fn voting_rollback_only(self) -> Self {
        self.behavior.lock().rollback_only = true;
        self
    }

    fn failure(&self, phase: ResourcePhase, call: Call) -> TxnError {
        TxnError::resource(
            phase,
            self.name.as_str(),
            InjectedFailure {
                resource: self.name.clone(),
                call,
            },
        )
    }
}

impl ResourceTransaction for RecordingResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn begin(&self) -> TxnResult<()> {
        self.log.record(&self.name, Call::Begin);
        let mut behavior = self.behavior.lock();
        if behavior.fail_begin {
            return Err(self.failure(ResourcePhase::Setup, Call::Begin));
        }
        behavior.active = true;
        Ok(())
    }

    fn commit(&self) -> TxnResult<()> {
        self.log.record(&self.name, Call::Commit);
        let mut behavior = self.behavior.lock();
        behavior.active = false;
        if behavior.fail_commit {
            return Err(self.failure(ResourcePhase::Commit, Call::Commit));
        }
        Ok(())
    }

    fn rollback(&self) -> TxnResult<()> {
        self.log.record(&self.name, Call::Rollback);
        let mut behavior = self.behavior.lock();
        behavior.active = false;
        if behavior.fail_rollback {
            return Err(self.failure(ResourcePhase::Rollback, Call::Rollback));
        }
        Ok(())
    }

    fn set_rollback_only(&self) -> TxnResult<()> {
        self.log.record(&self.name, Call::SetRollbackOnly);
        self.behavior.lock().rollback_only = true;
        Ok(())
    }

    fn get_rollback_only(&self) -> TxnResult<bool> {
        let behavior = self.behavior.lock();
        if behavior.fail_status {
            return Err(self.failure(ResourcePhase::Setup, Call::SetRollbackOnly));
        }
        Ok(behavior.rollback_only)
    }

    fn is_active(&self) -> TxnResult<bool> {
        let behavior = self.behavior.lock();
        if behavior.fail_status {
            return Err(self.failure(ResourcePhase::Setup, Call::Begin));
        }
        Ok(behavior.active)
    }
}
