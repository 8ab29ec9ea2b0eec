//! Reconciler between the scheduling engine and a polling worker fleet.
//!
//! Each worker is either idle (no queue entry) or has exactly one queued,
//! unacknowledged decision. Reaping is idempotent: a worker that polls again
//! before acknowledging gets the same decision back. Acknowledgements arrive
//! through [`Reconciler::update_tasks`] and may be delivered more than once.
//!
//! One `Mutex` guards the whole worker-queue map. [`Reconciler::reap`] holds it
//! across the full scheduling pass, so a pass never observes a half-applied
//! acknowledgement.
//!
//! With an ack timeout configured, a decision nobody acknowledged in time is
//! dropped from its worker's queue and held as lost. The next scheduling pass
//! hands the request back to the engine through [`Scheduler::requeue`] before
//! any worker is marked idle. A late acknowledgement of a lost decision
//! cancels the requeue, so the request is neither lost nor run twice.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::ReconcilerConfig;
use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::error::SchedulerError;
use crate::core::scheduler::Scheduler;
use crate::core::state::{LabelSet, RequestId, WorkerId};

/// The single pending decision for a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerQueue {
    /// When the decision was queued. Never decreases across replacements.
    pub enqueue_time: DateTime<Utc>,
    /// Request the worker should run.
    pub task_to_assign: RequestId,
    /// Task the worker should abort first, if any.
    pub task_to_abort: Option<RequestId>,
}

/// An idle worker polling for work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReapingWorker {
    /// Worker identity.
    pub id: WorkerId,
    /// Labels the worker can provision.
    #[serde(default)]
    pub labels: LabelSet,
}

impl ReapingWorker {
    /// Worker with the given labels.
    pub fn new<I, L>(id: impl Into<WorkerId>, labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        Self {
            id: id.into(),
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }
}

/// "Run this request."
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    /// Worker that should run the request.
    pub worker_id: WorkerId,
    /// Request to run.
    pub request_id: RequestId,
}

/// "Abort this request if you are currently running it."
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cancellation {
    /// Worker that should abort.
    pub worker_id: WorkerId,
    /// Request to abort.
    pub request_id: RequestId,
}

impl Cancellation {
    /// Whether a worker currently running `current` should honor this cancellation.
    /// Stale cancellations are no-ops.
    pub fn applies_to(&self, current: Option<&RequestId>) -> bool {
        current == Some(&self.request_id)
    }
}

/// Task lifecycle transition reported by the RPC layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskUpdateKind {
    /// A new task was created; no queue is affected.
    New,
    /// The worker started the assigned task.
    Assigned,
    /// The task was cancelled or aborted.
    Cancelled,
    /// The task finished.
    Completed,
}

/// Acknowledgement of a task lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    /// Worker the update concerns, when known.
    pub worker_id: Option<WorkerId>,
    /// Request the update concerns.
    pub request_id: RequestId,
    /// Transition kind.
    pub kind: TaskUpdateKind,
    /// When the transition happened.
    pub time: DateTime<Utc>,
}

impl TaskUpdate {
    /// `worker` started `request`.
    pub fn assigned(
        worker_id: impl Into<WorkerId>,
        request_id: impl Into<RequestId>,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            worker_id: Some(worker_id.into()),
            request_id: request_id.into(),
            kind: TaskUpdateKind::Assigned,
            time,
        }
    }

    /// `request` was cancelled, optionally on a known worker.
    pub fn cancelled(
        worker_id: Option<WorkerId>,
        request_id: impl Into<RequestId>,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            worker_id,
            request_id: request_id.into(),
            kind: TaskUpdateKind::Cancelled,
            time,
        }
    }

    /// `request` finished, optionally on a known worker.
    pub fn completed(
        worker_id: Option<WorkerId>,
        request_id: impl Into<RequestId>,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            worker_id,
            request_id: request_id.into(),
            kind: TaskUpdateKind::Completed,
            time,
        }
    }
}

/// Decision dropped by the ack timeout, waiting to go back to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LostDecision {
    worker_id: WorkerId,
    request_id: RequestId,
}

/// What a poll resolved to for one worker in a batch.
enum PollOutcome {
    Reoffer,
    Idle,
    Deferred,
}

/// Per-worker decision queues, owned by one scheduler instance.
pub struct Reconciler {
    config: ReconcilerConfig,
    worker_queues: Mutex<BTreeMap<WorkerId, WorkerQueue>>,
    /// Locked only while `worker_queues` is held.
    lost: Mutex<Vec<LostDecision>>,
    audit: Option<Mutex<Box<dyn AuditSink>>>,
}

impl Reconciler {
    /// Create an empty reconciler.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: ReconcilerConfig) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        Ok(Self {
            config,
            worker_queues: Mutex::new(BTreeMap::new()),
            lost: Mutex::new(Vec::new()),
            audit: None,
        })
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(Mutex::new(audit));
        self
    }

    /// Reconciler configuration.
    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Hand each polling worker its decision.
    ///
    /// Workers with a queued decision get it again. The rest are marked idle
    /// in `scheduler` and one scheduling pass runs; its assignments are queued
    /// before being returned. The result preserves batch order and omits
    /// workers with nothing to do.
    ///
    /// A worker whose queued decision is dated after `now` is skipped for this
    /// batch and its entry is left untouched.
    ///
    /// # Errors
    ///
    /// Propagates a failure from [`Scheduler::update_time`] verbatim. No queue
    /// is modified in that case.
    pub fn reap<S>(
        &self,
        scheduler: &mut S,
        workers: &[ReapingWorker],
        now: DateTime<Utc>,
    ) -> Result<Vec<Assignment>, SchedulerError>
    where
        S: Scheduler + ?Sized,
    {
        let mut queues = self.worker_queues.lock();

        let outcomes: Vec<PollOutcome> = workers
            .iter()
            .map(|worker| match queues.get(&worker.id) {
                Some(entry) if self.is_expired(entry, now) => PollOutcome::Idle,
                Some(entry) if entry.enqueue_time > now => {
                    tracing::warn!(
                        worker = %worker.id,
                        enqueued = %entry.enqueue_time,
                        %now,
                        "poll predates queued decision; deferring"
                    );
                    PollOutcome::Deferred
                }
                Some(_) => PollOutcome::Reoffer,
                None => PollOutcome::Idle,
            })
            .collect();

        let has_idle = outcomes.iter().any(|o| matches!(o, PollOutcome::Idle));
        if has_idle {
            scheduler.update_time(now)?;
            self.expire_locked(&mut queues, now);
            self.requeue_lost(scheduler);
            for (worker, outcome) in workers.iter().zip(&outcomes) {
                if matches!(outcome, PollOutcome::Idle) {
                    scheduler.mark_idle(&worker.id, &worker.labels);
                }
            }

            let fresh = scheduler.run_once();
            tracing::debug!(assignments = fresh.len(), "scheduling pass complete");
            for decision in fresh {
                let enqueue_time = queues
                    .get(&decision.worker_id)
                    .map_or(now, |prev| prev.enqueue_time.max(now));
                self.record(&decision.worker_id, &decision.request_id, AuditAction::Assign, now);
                queues.insert(
                    decision.worker_id,
                    WorkerQueue {
                        enqueue_time,
                        task_to_assign: decision.request_id,
                        task_to_abort: decision.task_to_abort,
                    },
                );
            }
        }

        let mut assignments = Vec::new();
        for (worker, outcome) in workers.iter().zip(&outcomes) {
            if matches!(outcome, PollOutcome::Deferred) {
                continue;
            }
            let Some(entry) = queues.get_mut(&worker.id) else {
                continue;
            };
            // A polling worker is idle, so any abort on its entry is moot.
            entry.task_to_abort = None;
            if matches!(outcome, PollOutcome::Reoffer) {
                self.record(&worker.id, &entry.task_to_assign, AuditAction::Reoffer, now);
            }
            assignments.push(Assignment {
                worker_id: worker.id.clone(),
                request_id: entry.task_to_assign.clone(),
            });
        }

        tracing::info!(
            workers = workers.len(),
            assigned = assignments.len(),
            queued = queues.len(),
            "reap complete"
        );
        Ok(assignments)
    }

    /// Aborts that queued decisions still require, ordered by worker id.
    /// Entries dated after `now` are left out.
    pub fn get_cancellations(&self, now: DateTime<Utc>) -> Vec<Cancellation> {
        let queues = self.worker_queues.lock();
        queues
            .iter()
            .filter(|(_, entry)| entry.enqueue_time <= now)
            .filter_map(|(worker_id, entry)| {
                entry.task_to_abort.as_ref().map(|request_id| Cancellation {
                    worker_id: worker_id.clone(),
                    request_id: request_id.clone(),
                })
            })
            .collect()
    }

    /// Apply acknowledgements. Updates that match no queued decision are
    /// ignored, so redelivery is harmless. Returns how many decisions changed.
    pub fn update_tasks(&self, updates: &[TaskUpdate]) -> usize {
        let mut queues = self.worker_queues.lock();
        let mut changed = 0;
        for update in updates {
            let applied = match update.kind {
                TaskUpdateKind::New => false,
                TaskUpdateKind::Assigned => self.ack_assigned(&mut queues, update),
                TaskUpdateKind::Cancelled | TaskUpdateKind::Completed => {
                    self.ack_stopped(&mut queues, update)
                }
            };
            if applied {
                changed += 1;
            } else {
                tracing::debug!(
                    request = %update.request_id,
                    kind = ?update.kind,
                    "update matched no queued decision"
                );
            }
        }
        changed
    }

    /// Drop decisions whose acknowledgement is overdue, returning the affected
    /// workers. Their next poll goes through a fresh scheduling pass, which
    /// first returns the dropped requests to the engine.
    pub fn expire_unacked(&self, now: DateTime<Utc>) -> Vec<WorkerId> {
        let mut queues = self.worker_queues.lock();
        self.expire_locked(&mut queues, now)
    }

    /// Copy of the decision queued for a worker.
    pub fn queued(&self, worker_id: &WorkerId) -> Option<WorkerQueue> {
        self.worker_queues.lock().get(worker_id).cloned()
    }

    /// Number of expired decisions not yet returned to the engine.
    pub fn lost_len(&self) -> usize {
        self.lost.lock().len()
    }

    /// Number of workers with a queued decision.
    pub fn len(&self) -> usize {
        self.worker_queues.lock().len()
    }

    /// True when every worker is idle.
    pub fn is_empty(&self) -> bool {
        self.worker_queues.lock().is_empty()
    }

    fn ack_assigned(
        &self,
        queues: &mut BTreeMap<WorkerId, WorkerQueue>,
        update: &TaskUpdate,
    ) -> bool {
        let Some(worker_id) = update.worker_id.as_ref() else {
            tracing::warn!(request = %update.request_id, "assignment ack without worker");
            return false;
        };
        let matches = queues
            .get(worker_id)
            .is_some_and(|entry| entry.task_to_assign == update.request_id);
        if matches {
            queues.remove(worker_id);
        } else if !self.forget_lost(Some(worker_id), &update.request_id) {
            return false;
        }
        self.record(worker_id, &update.request_id, AuditAction::Ack, update.time);
        true
    }

    fn ack_stopped(
        &self,
        queues: &mut BTreeMap<WorkerId, WorkerQueue>,
        update: &TaskUpdate,
    ) -> bool {
        let targets: Vec<WorkerId> = match update.worker_id.as_ref() {
            Some(worker_id) => vec![worker_id.clone()],
            None => queues
                .iter()
                .filter(|(_, entry)| {
                    entry.task_to_assign == update.request_id
                        || entry.task_to_abort.as_ref() == Some(&update.request_id)
                })
                .map(|(worker_id, _)| worker_id.clone())
                .collect(),
        };

        let mut applied = false;
        for worker_id in targets {
            let Some(entry) = queues.get_mut(&worker_id) else {
                continue;
            };
            if entry.task_to_abort.as_ref() == Some(&update.request_id) {
                entry.task_to_abort = None;
                self.record(&worker_id, &update.request_id, AuditAction::Abort, update.time);
                applied = true;
            }
            if entry.task_to_assign == update.request_id {
                queues.remove(&worker_id);
                self.record(&worker_id, &update.request_id, AuditAction::Ack, update.time);
                applied = true;
            }
        }
        // A stopped task must not be handed out again.
        self.forget_lost(update.worker_id.as_ref(), &update.request_id) || applied
    }

    /// Drop a lost decision matching `request_id` (and `worker_id`, when given).
    fn forget_lost(&self, worker_id: Option<&WorkerId>, request_id: &RequestId) -> bool {
        let mut lost = self.lost.lock();
        let before = lost.len();
        lost.retain(|d| {
            !(&d.request_id == request_id && worker_id.is_none_or(|w| w == &d.worker_id))
        });
        let forgotten = lost.len() < before;
        if forgotten {
            tracing::info!(request = %request_id, "late acknowledgement; requeue cancelled");
        }
        forgotten
    }

    fn requeue_lost<S>(&self, scheduler: &mut S)
    where
        S: Scheduler + ?Sized,
    {
        let lost = std::mem::take(&mut *self.lost.lock());
        for decision in lost {
            if !scheduler.requeue(&decision.worker_id, &decision.request_id) {
                tracing::warn!(
                    worker = %decision.worker_id,
                    request = %decision.request_id,
                    "expired decision unknown to scheduler; nothing to requeue"
                );
            }
        }
    }

    fn is_expired(&self, entry: &WorkerQueue, now: DateTime<Utc>) -> bool {
        self.config
            .ack_timeout()
            .is_some_and(|timeout| now - entry.enqueue_time > timeout)
    }

    fn expire_locked(
        &self,
        queues: &mut BTreeMap<WorkerId, WorkerQueue>,
        now: DateTime<Utc>,
    ) -> Vec<WorkerId> {
        let expired: Vec<WorkerId> = queues
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(worker_id, _)| worker_id.clone())
            .collect();
        for worker_id in &expired {
            if let Some(entry) = queues.remove(worker_id) {
                tracing::warn!(
                    worker = %worker_id,
                    request = %entry.task_to_assign,
                    enqueued = %entry.enqueue_time,
                    "ack timed out; dropping queued decision"
                );
                self.record(worker_id, &entry.task_to_assign, AuditAction::Expire, now);
                self.lost.lock().push(LostDecision {
                    worker_id: worker_id.clone(),
                    request_id: entry.task_to_assign,
                });
            }
        }
        expired
    }

    fn record(
        &self,
        worker_id: &WorkerId,
        request_id: &RequestId,
        action: AuditAction,
        at: DateTime<Utc>,
    ) {
        if let Some(sink) = &self.audit {
            sink.lock()
                .record(build_audit_event(worker_id, request_id, action, at));
        }
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("queued", &self.len())
            .field("lost", &self.lost_len())
            .field("audit", &self.audit.is_some())
            .finish()
    }
}
