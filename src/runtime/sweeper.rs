//! Background sweeper that expires unacknowledged decisions.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;

use super::spawn::Spawn;
use crate::core::Reconciler;
use crate::util::clock::now;

/// Handle to a running ack sweeper.
#[derive(Debug)]
pub struct AckSweeper {
    stop: Arc<AtomicBool>,
    wake: Arc<Notify>,
    sweeps: Arc<AtomicU64>,
    expired: Arc<AtomicU64>,
}

impl AckSweeper {
    /// Start sweeping `reconciler` every `interval`.
    ///
    /// Returns `None` when the reconciler has no ack timeout, since there is
    /// nothing to expire.
    pub fn spawn<S: Spawn>(
        reconciler: Arc<Reconciler>,
        interval: Duration,
        spawner: &S,
    ) -> Option<Self> {
        if reconciler.config().ack_timeout().is_none() {
            tracing::debug!("ack timeout disabled; sweeper not started");
            return None;
        }

        let handle = Self {
            stop: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            sweeps: Arc::new(AtomicU64::new(0)),
            expired: Arc::new(AtomicU64::new(0)),
        };
        let stop = Arc::clone(&handle.stop);
        let wake = Arc::clone(&handle.wake);
        let sweeps = Arc::clone(&handle.sweeps);
        let expired_total = Arc::clone(&handle.expired);
        let period = interval.max(Duration::from_millis(1));

        spawner.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    () = wake.notified() => {}
                }
                if stop.load(Ordering::Acquire) {
                    tracing::info!("ack sweeper shutting down");
                    break;
                }
                let expired = reconciler.expire_unacked(now());
                sweeps.fetch_add(1, Ordering::Relaxed);
                if !expired.is_empty() {
                    let count = u64::try_from(expired.len()).unwrap_or(u64::MAX);
                    expired_total.fetch_add(count, Ordering::Relaxed);
                    tracing::info!(count, "expired unacknowledged decisions; requeued on next pass");
                }
            }
        });
        Some(handle)
    }

    /// Stop the sweeper after its current iteration.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    /// Completed sweep iterations.
    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    /// Decisions expired so far.
    pub fn expired(&self) -> u64 {
        self.expired.load(Ordering::Relaxed)
    }
}

impl Drop for AckSweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}
