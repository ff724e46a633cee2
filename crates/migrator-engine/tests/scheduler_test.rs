//! Scheduler lifecycle with in-memory stores and bus.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{contents, eventually, store, Record};
use migrator_core::{Direction, WritePattern};
use migrator_engine::{
    FixConsumer, RunMode, RunState, Scheduler, SchedulerError, ValidatorConfig,
};
use migrator_events::MemoryBus;
use migrator_store::MemoryStore;
use tokio::sync::watch;

struct Fixture {
    source: Arc<MemoryStore<Record>>,
    target: Arc<MemoryStore<Record>>,
    bus: Arc<MemoryBus>,
    scheduler: Scheduler<Record>,
}

fn fixture(source: &[(i64, &str)], target: &[(i64, &str)]) -> Fixture {
    let source = store("source", source);
    let target = store("target", target);
    let bus = Arc::new(MemoryBus::default());
    let scheduler = Scheduler::new(
        source.clone(),
        target.clone(),
        bus.clone(),
        ValidatorConfig::default(),
    );
    Fixture {
        source,
        target,
        bus,
        scheduler,
    }
}

fn full_state(scheduler: &Scheduler<Record>) -> Option<RunState> {
    scheduler.status().full.map(|run| run.state)
}

#[tokio::test(start_paused = true)]
async fn test_full_run_completes() {
    let f = fixture(&[(1, "a"), (2, "b")], &[(1, "a"), (3, "c")]);

    let run = f.scheduler.start_full().unwrap();
    assert_eq!(run.mode, RunMode::Full);
    assert_eq!(run.direction, Direction::Src);
    assert_eq!(run.state, RunState::Running);

    assert!(eventually(|| full_state(&f.scheduler) == Some(RunState::Completed)).await);

    let status = f.scheduler.status();
    let finished = status.full.unwrap();
    assert_eq!(finished.id, run.id);
    assert_eq!(finished.report.unwrap().events(), 2);
    assert!(finished.finished_at.is_some());

    let consumer = FixConsumer::new(f.source.clone(), f.target.clone());
    f.bus.drain(&consumer).await;
    assert_eq!(contents(&f.target), contents(&f.source));
}

#[tokio::test(start_paused = true)]
async fn test_stopping_finished_full_run_keeps_it_completed() {
    let f = fixture(&[(1, "a")], &[]);

    let run = f.scheduler.start_full().unwrap();
    assert!(eventually(|| full_state(&f.scheduler) == Some(RunState::Completed)).await);

    let stopped = f.scheduler.stop_full().unwrap();
    assert_eq!(stopped.id, run.id);
    assert_eq!(stopped.state, RunState::Completed);

    // Replacing it must not relabel the finished run either.
    f.scheduler.start_full().unwrap();
    let first = f
        .scheduler
        .history()
        .into_iter()
        .find(|r| r.id == run.id)
        .unwrap();
    assert_eq!(first.state, RunState::Completed);
    assert!(!first.report.unwrap().cancelled());

    f.scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_second_start_supersedes_first() {
    let f = fixture(&[], &[]);

    let first = f.scheduler.start_incr(0, Duration::from_millis(100)).unwrap();
    let second = f.scheduler.start_incr(0, Duration::from_millis(100)).unwrap();
    assert_ne!(first.id, second.id);

    let status = f.scheduler.status();
    let active = status.incr.unwrap();
    assert_eq!(active.id, second.id);
    assert_eq!(active.state, RunState::Running);

    let superseded = |s: &Scheduler<Record>| {
        s.history()
            .into_iter()
            .find(|run| run.id == first.id)
            .filter(|run| run.finished_at.is_some())
            .map(|run| run.state)
    };
    assert!(eventually(|| superseded(&f.scheduler) == Some(RunState::Superseded)).await);

    // only the second run is still scanning
    assert_eq!(
        f.scheduler
            .history()
            .iter()
            .filter(|run| run.state.is_running())
            .count(),
        1
    );

    f.scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_incremental_cancels_run() {
    let f = fixture(&[(1, "a")], &[(1, "a")]);

    let run = f.scheduler.start_incr(0, Duration::from_millis(50)).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        f.scheduler.status().incr.map(|r| r.state),
        Some(RunState::Running)
    );

    let stopped = f.scheduler.stop_incr().unwrap();
    assert_eq!(stopped.id, run.id);

    assert!(
        eventually(|| f.scheduler.status().incr.map(|r| r.state) == Some(RunState::Cancelled))
            .await
    );
}

#[tokio::test(start_paused = true)]
async fn test_full_and_incremental_are_independent() {
    let f = fixture(&[], &[]);

    f.scheduler.start_incr(10, Duration::from_millis(100)).unwrap();
    f.scheduler.start_full().unwrap();

    assert!(eventually(|| full_state(&f.scheduler) == Some(RunState::Completed)).await);
    let incr = f.scheduler.status().incr.unwrap();
    assert_eq!(incr.state, RunState::Running);
    assert_eq!(incr.watermark, 10);

    f.scheduler.shutdown().await;
    assert_eq!(
        f.scheduler.status().incr.map(|r| r.state),
        Some(RunState::Cancelled)
    );
}

#[tokio::test(start_paused = true)]
async fn test_pattern_change_notifies_and_orients_next_run() {
    let (tx, rx) = watch::channel(WritePattern::SrcFirst);
    let f = fixture(&[(1, "a")], &[(1, "a"), (2, "only in target")]);
    let scheduler = f.scheduler.with_listener(Arc::new(tx));

    scheduler.set_pattern(WritePattern::DstFirst);
    assert_eq!(*rx.borrow(), WritePattern::DstFirst);
    assert_eq!(scheduler.pattern(), WritePattern::DstFirst);

    let run = scheduler.start_full().unwrap();
    assert_eq!(run.direction, Direction::Dst);
    assert!(eventually(|| full_state(&scheduler) == Some(RunState::Completed)).await);

    // the target is authoritative now, so the consumer copies record 2 back
    let consumer = FixConsumer::new(f.source.clone(), f.target.clone());
    f.bus.drain(&consumer).await;
    assert_eq!(contents(&f.source), contents(&f.target));
    assert_eq!(f.source.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_store_configuration_error_fails_run() {
    let f = fixture(&[(1, "a")], &[]);
    f.source.fail_next_scans(
        1,
        migrator_store::StoreError::invalid_configuration("relation \"interactives\" does not exist"),
    );

    f.scheduler.start_full().unwrap();
    assert!(eventually(|| full_state(&f.scheduler) == Some(RunState::Failed)).await);

    let run = f.scheduler.status().full.unwrap();
    assert!(run.error.unwrap().contains("does not exist"));
}

#[tokio::test]
async fn test_shutdown_refuses_new_runs() {
    let f = fixture(&[], &[]);

    f.scheduler.shutdown().await;

    assert_eq!(f.scheduler.start_full().unwrap_err(), SchedulerError::ShutDown);
    assert_eq!(
        f.scheduler
            .start_incr(0, Duration::from_secs(1))
            .unwrap_err(),
        SchedulerError::ShutDown
    );
}
