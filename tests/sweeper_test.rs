//! Integration tests for the background ack sweeper.
//!
//! This test validates:
//! 1. Overdue decisions are expired without any poll
//! 2. No sweeper starts when acks never time out
//! 3. Shutdown stops further sweeps

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use prometheus_quota_scheduler::config::{ReconcilerConfig, SchedulerConfig};
use prometheus_quota_scheduler::core::{ReapingWorker, Reconciler, Request, WorkerId};
use prometheus_quota_scheduler::infra::InMemoryScheduler;
use prometheus_quota_scheduler::runtime::{AckSweeper, TokioSpawner};
use prometheus_quota_scheduler::util::clock::WireTimestamp;

/// A decision queued well in the past, so any positive timeout has elapsed.
fn reconciler_with_stale_decision(ack_timeout_secs: Option<u64>) -> Arc<Reconciler> {
    let reconciler = Reconciler::new(ReconcilerConfig { ack_timeout_secs }).unwrap();
    let mut scheduler = InMemoryScheduler::new(SchedulerConfig::default()).unwrap();
    scheduler
        .add_request(Request::new("r1", "a1", WireTimestamp::new(1_000, 0)))
        .unwrap();
    let past = DateTime::<Utc>::from_timestamp(1_000, 0).unwrap();
    let out = reconciler
        .reap(
            &mut scheduler,
            &[ReapingWorker::new("w1", Vec::<String>::new())],
            past,
        )
        .unwrap();
    assert_eq!(out.len(), 1);
    Arc::new(reconciler)
}

async fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    done()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sweeper_expires_overdue_decision() {
    let reconciler = reconciler_with_stale_decision(Some(5));
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let sweeper = AckSweeper::spawn(Arc::clone(&reconciler), Duration::from_millis(10), &spawner)
        .expect("sweeper should start");

    assert!(wait_until(|| reconciler.is_empty()).await);
    assert!(reconciler.queued(&WorkerId::new("w1")).is_none());
    assert!(wait_until(|| sweeper.expired() == 1).await);
    assert!(sweeper.sweeps() >= 1);
    // The request is held for the next scheduling pass, not dropped.
    assert_eq!(reconciler.lost_len(), 1);
}

#[tokio::test]
async fn test_sweeper_not_started_without_timeout() {
    let reconciler = reconciler_with_stale_decision(None);
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let sweeper = AckSweeper::spawn(Arc::clone(&reconciler), Duration::from_millis(10), &spawner);

    assert!(sweeper.is_none());
    assert_eq!(reconciler.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sweeper_stops_after_shutdown() {
    let reconciler = reconciler_with_stale_decision(Some(5));
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());
    let sweeper = AckSweeper::spawn(Arc::clone(&reconciler), Duration::from_millis(10), &spawner)
        .expect("sweeper should start");
    assert!(wait_until(|| sweeper.sweeps() >= 2).await);

    sweeper.shutdown();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let settled = sweeper.sweeps();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(sweeper.sweeps(), settled);
}
