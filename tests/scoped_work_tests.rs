//! Scoped Unit-of-Work Integration Tests
//!
//! ## Test Categories
//!
//! 1. **Run** - closure-scoped units of work with embedder error types
//! 2. **Guard** - RAII rollback on early return and panic
//! 3. **Session** - request-scoped sessions and close listeners
//! 4. **Config** - coordinators built from `unitwork.toml`

mod common;

use common::{ambient_coordinator, init_tracing, local};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use unitwork::prelude::*;
use unitwork::testing::{Call, CallLog, RecordingResource};
use unitwork::{SessionEvent, TransactionState, CONFIG_FILE_NAME};

// ============================================================================
// SECTION 1: Run
// ============================================================================

mod run {
    use super::*;

    #[derive(Debug)]
    enum AppError {
        Txn(TxnError),
        OutOfStock,
    }

    impl From<TxnError> for AppError {
        fn from(e: TxnError) -> Self {
            AppError::Txn(e)
        }
    }

    #[test]
    fn app_error_rolls_back() {
        init_tracing();
        let coordinator = TransactionCoordinator::new();
        let mut ctx = coordinator.new_context();
        let orders = local("orders");

        let err = coordinator
            .run(&mut ctx, |c, ctx| -> Result<(), AppError> {
                c.enlist(ctx, orders.clone())?;
                Err(AppError::OutOfStock)
            })
            .unwrap_err();

        assert!(matches!(err, AppError::OutOfStock));
        assert_eq!(orders.with_inner(|t| (t.commits(), t.rollbacks())), (0, 1));
        assert_eq!(ctx.state(), TransactionState::Completed);
    }

    #[test]
    fn commit_failure_converts_into_app_error() {
        init_tracing();
        let coordinator = TransactionCoordinator::new();
        let mut ctx = coordinator.new_context();
        let orders = local("orders");

        let err = coordinator
            .run(&mut ctx, |c, ctx| -> Result<u32, AppError> {
                c.enlist(ctx, orders.clone())?;
                orders.with_inner_mut(|t| t.fail_next_commit("disk full"));
                Ok(3)
            })
            .unwrap_err();

        match err {
            AppError::Txn(e) => assert_eq!(e.resource_name(), Some("orders")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn resource_vote_rolls_back() {
        init_tracing();
        let coordinator = TransactionCoordinator::new();
        let mut ctx = coordinator.new_context();
        let orders = local("orders");

        let value = coordinator
            .run(&mut ctx, |c, ctx| -> TxnResult<&str> {
                c.enlist(ctx, orders.clone())?;
                orders.set_rollback_only()?;
                Ok("done")
            })
            .unwrap();

        assert_eq!(value, "done");
        assert_eq!(orders.with_inner(|t| (t.commits(), t.rollbacks())), (0, 1));
    }
}

// ============================================================================
// SECTION 2: Guard
// ============================================================================

mod guard {
    use super::*;

    fn early_return(
        coordinator: &TransactionCoordinator,
        ctx: &mut TransactionContext,
        resource: SharedResource,
    ) -> TxnResult<()> {
        let mut guard = coordinator.guard(ctx)?;
        guard.enlist(resource)?;
        Err(TxnError::illegal_state("validation failed"))
    }

    #[test]
    fn early_return_rolls_back() {
        init_tracing();
        let coordinator = TransactionCoordinator::new();
        let mut ctx = coordinator.new_context();
        let log = CallLog::new();

        early_return(&coordinator, &mut ctx, RecordingResource::new("db", &log).shared())
            .unwrap_err();

        assert_eq!(log.calls_for("db"), vec![Call::Begin, Call::Rollback]);
        assert!(ctx.is_completed());
    }

    #[test]
    fn panic_rolls_back() {
        init_tracing();
        let coordinator = TransactionCoordinator::new();
        let mut ctx = coordinator.new_context();
        let log = CallLog::new();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut guard = coordinator.guard(&mut ctx).unwrap();
            guard
                .enlist(RecordingResource::new("db", &log).shared())
                .unwrap();
            panic!("handler crashed");
        }));

        assert!(result.is_err());
        assert_eq!(log.calls_for("db"), vec![Call::Begin, Call::Rollback]);
        assert!(!ctx.is_active());
    }
}

// ============================================================================
// SECTION 3: Session
// ============================================================================

mod session {
    use super::*;

    #[test]
    fn request_lifecycle() {
        init_tracing();
        let coordinator = Arc::new(TransactionCoordinator::new());
        let closed = Arc::new(AtomicUsize::new(0));
        let db = local("db");

        for _ in 0..2 {
            let mut session = Session::new(Arc::clone(&coordinator));
            let counter = Arc::clone(&closed);
            session.on_close(move |event| {
                assert_eq!(*event, SessionEvent::Closed { rolled_back: false });
                counter.fetch_add(1, Ordering::SeqCst);
            });
            session.begin().unwrap();
            session.enlist(db.clone()).unwrap();
            session.commit().unwrap();
        }

        assert_eq!(closed.load(Ordering::SeqCst), 2);
        assert_eq!(db.with_inner(|t| t.commits()), 2);
        assert_eq!(coordinator.metrics().total_committed, 2);
    }

    #[test]
    fn close_resumes_ambient_transaction() {
        init_tracing();
        let (coordinator, tm) = ambient_coordinator();
        tm.begin().unwrap();
        let t0 = tm.current().unwrap().unwrap();

        let mut session = Session::new(Arc::new(coordinator));
        session.begin().unwrap();
        assert_ne!(tm.current().unwrap(), Some(t0));
        session.close().unwrap();

        assert_eq!(tm.current().unwrap(), Some(t0));
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut session = Session::new(Arc::new(TransactionCoordinator::new()));
        for id in 0..3 {
            let order = Arc::clone(&order);
            session.on_close(move |_| order.lock().push(id));
        }
        drop(session);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }
}

// ============================================================================
// SECTION 4: Config
// ============================================================================

mod config {
    use super::*;

    #[test]
    fn coordinator_from_config_file() {
        init_tracing();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "ambient_policy = \"not_supported\"\n").unwrap();

        let (coordinator, tm) = ambient_coordinator();
        let coordinator = coordinator.with_config(CoordinatorConfig::from_file(&path).unwrap());
        let mut ctx = coordinator.new_context();
        assert_eq!(ctx.policy(), AmbientPolicy::NotSupported);

        coordinator.begin(&mut ctx).unwrap();
        coordinator.commit(&mut ctx).unwrap();
        assert_eq!(tm.stats().begun, 0);
    }

    #[test]
    fn integration_switch_overrides_policy() {
        init_tracing();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        CoordinatorConfig {
            ambient_policy: AmbientPolicy::RequiresNew,
            ambient_integration: false,
        }
        .write_to_file(&path)
        .unwrap();

        let (coordinator, tm) = ambient_coordinator();
        let coordinator = coordinator.with_config(CoordinatorConfig::from_file(&path).unwrap());
        let mut ctx = coordinator.new_context();
        assert_eq!(ctx.policy(), AmbientPolicy::RequiresNew);

        coordinator.begin(&mut ctx).unwrap();
        coordinator.rollback(&mut ctx).unwrap();
        assert_eq!(tm.stats().begun, 0);
    }

    #[test]
    fn invalid_config_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "ambient_integration = \"sometimes\"\n").unwrap();

        let err = CoordinatorConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, TxnError::Config(_)));
    }
}
