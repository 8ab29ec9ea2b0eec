//! Audit sink implementations.
//!
//! The reconciler records one event per decision it queues, re-offers,
//! clears or expires.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::core::state::{RequestId, WorkerId};

/// Kind of reconciler decision being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    /// Fresh decision queued for a worker.
    Assign,
    /// Queued decision handed out again on a repeat poll.
    Reoffer,
    /// Worker acknowledged the assignment.
    Ack,
    /// Worker acknowledged aborting a task.
    Abort,
    /// Decision dropped after the ack timeout.
    Expire,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Assign => "assign",
            Self::Reoffer => "reoffer",
            Self::Ack => "ack",
            Self::Abort => "abort",
            Self::Expire => "expire",
        };
        f.write_str(name)
    }
}

/// Audit event structure.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Worker the decision targets.
    pub worker_id: WorkerId,
    /// Request the decision concerns.
    pub request_id: RequestId,
    /// Action taken.
    pub action: AuditAction,
    /// Reconciler time of the action.
    pub created_at: DateTime<Utc>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev.
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events.min(1024)),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Shared handle so callers can keep reading events after handing the sink to a reconciler.
impl<S: AuditSink + ?Sized> AuditSink for std::sync::Arc<parking_lot::Mutex<S>> {
    fn record(&mut self, event: AuditEvent) {
        self.lock().record(event);
    }
}

/// Helper to build an audit event with a fresh identifier.
pub fn build_audit_event(
    worker_id: &WorkerId,
    request_id: &RequestId,
    action: AuditAction,
    created_at: DateTime<Utc>,
) -> AuditEvent {
    AuditEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        worker_id: worker_id.clone(),
        request_id: request_id.clone(),
        action,
        created_at,
    }
}
