//! Run work with the current ambient transaction suspended

use super::manager::{AmbientError, AmbientTransaction, AmbientTransactionManager};
use tracing::{debug, error, warn};
use unitwork_core::{TxnError, TxnResult};

/// Resumes the suspended transaction when dropped, unless `resume` ran
struct ResumeGuard<'a> {
    manager: &'a dyn AmbientTransactionManager,
    suspended: Option<AmbientTransaction>,
}

impl ResumeGuard<'_> {
    fn resume(mut self) -> Option<(AmbientTransaction, Result<(), AmbientError>)> {
        let previous = self.suspended.take()?;
        Some((previous, self.manager.resume(previous)))
    }
}

impl Drop for ResumeGuard<'_> {
    fn drop(&mut self) {
        let Some(previous) = self.suspended.take() else {
            return;
        };
        warn!(target: "unitwork::ambient", txn = %previous, "Work panicked; resuming suspended ambient transaction");
        if let Err(e) = self.manager.resume(previous) {
            error!(target: "unitwork::ambient", txn = %previous, error = %e, "Failed to resume ambient transaction after panic");
        }
    }
}

/// Run `work` outside the calling context's ambient transaction
///
/// The associated transaction, if any, is suspended before `work` runs and
/// resumed afterwards, even when `work` fails or panics. Passing `None` as
/// the manager simply runs `work`.
///
/// # Errors
///
/// - `SetupFailure` if the suspend fails; `work` does not run
/// - the error of `work`, if it fails
/// - `SetupFailure` if `work` succeeded but the resume failed
///
/// When both `work` and the resume fail, the resume failure is logged and
/// the error of `work` is returned.
pub fn suspend_ambient<T, F>(manager: Option<&dyn AmbientTransactionManager>, work: F) -> TxnResult<T>
where
    F: FnOnce() -> TxnResult<T>,
{
    let Some(manager) = manager else {
        return work();
    };

    let suspended = manager
        .suspend()
        .map_err(|e| TxnError::setup("failed to suspend ambient transaction", Some(e.into())))?;
    debug!(target: "unitwork::ambient", had_existing = suspended.is_some(), "Running work with ambient transaction suspended");
    let guard = ResumeGuard { manager, suspended };

    let outcome = work();

    match (outcome, guard.resume()) {
        (outcome, None) | (outcome, Some((_, Ok(())))) => outcome,
        (Ok(_), Some((previous, Err(e)))) => Err(TxnError::setup(
            format!("failed to resume suspended {}", previous),
            Some(e.into()),
        )),
        (Err(work_err), Some((previous, Err(resume_err)))) => {
            error!(target: "unitwork::ambient", txn = %previous, error = %resume_err, "Failed to resume ambient transaction after failed work");
            Err(work_err)
        }
    }
}
