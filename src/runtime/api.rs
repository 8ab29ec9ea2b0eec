//! API-facing request/response models and thin handlers over the reconciler.
//!
//! Timestamps arrive as [`WireTimestamp`]; a conversion failure rejects the
//! whole call before the reconciler is touched.

use serde::{Deserialize, Serialize};

use crate::core::{
    Assignment, Cancellation, ReapingWorker, Reconciler, RequestId, Scheduler, SchedulerError,
    TaskUpdate, TaskUpdateKind, WorkerId,
};
use crate::util::clock::WireTimestamp;

/// Batch of idle workers polling for work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReapRequest {
    /// Polling workers.
    pub workers: Vec<ReapingWorker>,
    /// Poll time.
    pub time: WireTimestamp,
}

/// Decisions for a reap batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReapResponse {
    /// One entry per worker that has something to run, in batch order.
    pub assignments: Vec<Assignment>,
}

/// Poll for aborts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationsRequest {
    /// Poll time.
    pub time: WireTimestamp,
}

/// Aborts still outstanding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationsResponse {
    /// Outstanding aborts ordered by worker id.
    pub cancellations: Vec<Cancellation>,
}

/// One task lifecycle transition as carried on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskUpdateMessage {
    /// Worker the update concerns, when known.
    #[serde(default)]
    pub worker_id: Option<WorkerId>,
    /// Request the update concerns.
    pub request_id: RequestId,
    /// Transition kind.
    pub kind: TaskUpdateKind,
    /// When the transition happened.
    pub time: WireTimestamp,
}

/// Batch of acknowledgements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTasksRequest {
    /// Updates in delivery order.
    pub updates: Vec<TaskUpdateMessage>,
}

/// Result of applying acknowledgements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTasksResponse {
    /// Number of queued decisions the batch changed.
    pub applied: usize,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Workers with a queued, unacknowledged decision.
    pub queued_workers: usize,
}

/// Handle a reap poll.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidTimestamp`] for a malformed poll time, or
/// whatever the scheduler's `update_time` reports.
pub fn reap<S>(
    reconciler: &Reconciler,
    scheduler: &mut S,
    req: &ReapRequest,
) -> Result<ReapResponse, SchedulerError>
where
    S: Scheduler + ?Sized,
{
    let now = req.time.to_datetime()?;
    let assignments = reconciler.reap(scheduler, &req.workers, now)?;
    Ok(ReapResponse { assignments })
}

/// Handle a cancellations poll.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidTimestamp`] for a malformed poll time.
pub fn cancellations(
    reconciler: &Reconciler,
    req: &CancellationsRequest,
) -> Result<CancellationsResponse, SchedulerError> {
    let now = req.time.to_datetime()?;
    Ok(CancellationsResponse {
        cancellations: reconciler.get_cancellations(now),
    })
}

/// Handle a batch of acknowledgements. Every timestamp is checked before any
/// update is applied.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidTimestamp`] if any update carries a
/// malformed time.
pub fn update_tasks(
    reconciler: &Reconciler,
    req: &UpdateTasksRequest,
) -> Result<UpdateTasksResponse, SchedulerError> {
    let updates = req
        .updates
        .iter()
        .map(|msg| {
            Ok(TaskUpdate {
                worker_id: msg.worker_id.clone(),
                request_id: msg.request_id.clone(),
                kind: msg.kind,
                time: msg.time.to_datetime()?,
            })
        })
        .collect::<Result<Vec<_>, SchedulerError>>()?;
    Ok(UpdateTasksResponse {
        applied: reconciler.update_tasks(&updates),
    })
}

/// Return a health payload.
pub fn health(reconciler: &Reconciler) -> Health {
    Health {
        ok: true,
        queued_workers: reconciler.len(),
    }
}
