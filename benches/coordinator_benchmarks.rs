//! Coordinator Benchmarks
//!
//! Measures the protocol overhead of a unit of work:
//! - begin/commit with N local resources in the main group
//! - the same with a fresh ambient transaction under `RequiresNew`
//! - rollback after a prepare failure

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use unitwork::testing::{CallLog, RecordingResource};
use unitwork::{
    AmbientTransactionManager, InMemoryAmbientManager, InMemoryLocalTransaction,
    LocalResourceAdapter, SharedResource, TransactionCoordinator,
};

fn locals(n: usize) -> Vec<SharedResource> {
    (0..n)
        .map(|i| {
            Arc::new(LocalResourceAdapter::new(
                format!("db_{}", i),
                InMemoryLocalTransaction::new(),
            )) as SharedResource
        })
        .collect()
}

/// Benchmark: begin, enlist N resources, commit
fn bench_commit_fan_out(c: &mut Criterion) {
    let coordinator = TransactionCoordinator::new();
    let mut group = c.benchmark_group("commit_fan_out");

    for n in [1usize, 4, 16, 64] {
        let resources = locals(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &resources, |b, resources| {
            let mut ctx = coordinator.new_context();
            b.iter(|| {
                coordinator.begin(&mut ctx).unwrap();
                for resource in resources {
                    coordinator.enlist(&mut ctx, Arc::clone(resource)).unwrap();
                }
                black_box(coordinator.commit(&mut ctx).unwrap());
            });
        });
    }
    group.finish();
}

/// Benchmark: unit of work that suspends and resumes an outer ambient transaction
fn bench_ambient_requires_new(c: &mut Criterion) {
    let tm = Arc::new(InMemoryAmbientManager::new());
    let manager: Arc<dyn AmbientTransactionManager> = tm.clone();
    let coordinator = TransactionCoordinator::new().with_ambient_manager(manager);
    tm.begin().unwrap();
    let resources = locals(4);

    c.bench_function("ambient_requires_new", |b| {
        let mut ctx = coordinator.new_context();
        b.iter(|| {
            coordinator.begin(&mut ctx).unwrap();
            for resource in &resources {
                coordinator.enlist(&mut ctx, Arc::clone(resource)).unwrap();
            }
            black_box(coordinator.commit(&mut ctx).unwrap());
        });
    });
}

/// Benchmark: prepare failure followed by rollback of the main group
fn bench_prepare_failure(c: &mut Criterion) {
    let coordinator = TransactionCoordinator::new();
    let log = CallLog::new();
    let failing: SharedResource = RecordingResource::new("index", &log).failing_commit().shared();
    let resources = locals(8);

    c.bench_function("prepare_failure_rollback", |b| {
        let mut ctx = coordinator.new_context();
        b.iter(|| {
            coordinator.begin(&mut ctx).unwrap();
            coordinator.enlist_prepare(&mut ctx, Arc::clone(&failing)).unwrap();
            for resource in &resources {
                coordinator.enlist(&mut ctx, Arc::clone(resource)).unwrap();
            }
            black_box(coordinator.commit(&mut ctx).unwrap_err());
            log.clear();
        });
    });
}

criterion_group!(
    benches,
    bench_commit_fan_out,
    bench_ambient_requires_new,
    bench_prepare_failure
);
criterion_main!(benches);
