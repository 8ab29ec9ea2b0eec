//! Core scheduling abstractions: account model, priority engine and reconciler.

pub mod account;
pub mod audit;
pub mod error;
pub mod priority;
pub mod reconciler;
pub mod scheduler;
pub mod state;

pub use account::{best_priority_for, AccountConfig, Balance, Priority, NUM_PRIORITIES};
pub use audit::{build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink};
pub use error::{AppResult, ErrorKind, SchedulerError};
pub use priority::{prioritize_requests, DispatchState, PrioritizedRequest, PriorityList};
pub use reconciler::{
    Assignment, Cancellation, ReapingWorker, Reconciler, TaskUpdate, TaskUpdateKind, WorkerQueue,
};
pub use scheduler::{Scheduler, SchedulerAssignment};
pub use state::{AccountId, LabelSet, Request, RequestId, Running, State, WorkerId};
