//! Interface to the scheduling engine the reconciler drives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::account::Priority;
use crate::core::error::SchedulerError;
use crate::core::state::{LabelSet, RequestId, WorkerId};

/// A concrete decision produced by one scheduling pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerAssignment {
    /// Worker that should run the request.
    pub worker_id: WorkerId,
    /// Request to run.
    pub request_id: RequestId,
    /// Task the worker must abort first, for preemptions.
    pub task_to_abort: Option<RequestId>,
    /// Band the request was dispatched at.
    pub priority: Priority,
}

impl SchedulerAssignment {
    /// Assignment of a request to an idle worker.
    pub fn idle(worker_id: WorkerId, request_id: RequestId, priority: Priority) -> Self {
        Self {
            worker_id,
            request_id,
            task_to_abort: None,
            priority,
        }
    }

    /// Assignment that preempts the worker's current task.
    pub fn preempt(
        worker_id: WorkerId,
        request_id: RequestId,
        task_to_abort: RequestId,
        priority: Priority,
    ) -> Self {
        Self {
            worker_id,
            request_id,
            task_to_abort: Some(task_to_abort),
            priority,
        }
    }
}

/// Quota scheduling engine.
///
/// `update_time`, `mark_idle` and `run_once` form one "prepare, then compute"
/// unit; callers serialize them per scheduler instance.
pub trait Scheduler {
    /// Inform the engine of wall-clock time.
    ///
    /// # Errors
    ///
    /// Engine-specific; the reconciler aborts the whole reap cycle on error.
    fn update_time(&mut self, now: DateTime<Utc>) -> Result<(), SchedulerError>;

    /// Register a worker as available for the next pass.
    fn mark_idle(&mut self, worker_id: &WorkerId, labels: &LabelSet);

    /// Run one full pass and return the resulting assignments.
    fn run_once(&mut self) -> Vec<SchedulerAssignment>;

    /// Return a request assigned to `worker_id` to the pending queue, because
    /// the worker never acknowledged it. The request keeps its original
    /// enqueue time. Returns false if the worker is not running it.
    fn requeue(&mut self, worker_id: &WorkerId, request_id: &RequestId) -> bool;
}

impl<S: Scheduler + ?Sized> Scheduler for &mut S {
    fn update_time(&mut self, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        (**self).update_time(now)
    }

    fn mark_idle(&mut self, worker_id: &WorkerId, labels: &LabelSet) {
        (**self).mark_idle(worker_id, labels);
    }

    fn run_once(&mut self) -> Vec<SchedulerAssignment> {
        (**self).run_once()
    }

    fn requeue(&mut self, worker_id: &WorkerId, request_id: &RequestId) -> bool {
        (**self).requeue(worker_id, request_id)
    }
}

impl<S: Scheduler + ?Sized> Scheduler for Box<S> {
    fn update_time(&mut self, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        (**self).update_time(now)
    }

    fn mark_idle(&mut self, worker_id: &WorkerId, labels: &LabelSet) {
        (**self).mark_idle(worker_id, labels);
    }

    fn run_once(&mut self) -> Vec<SchedulerAssignment> {
        (**self).run_once()
    }

    fn requeue(&mut self, worker_id: &WorkerId, request_id: &RequestId) -> bool {
        (**self).requeue(worker_id, request_id)
    }
}
