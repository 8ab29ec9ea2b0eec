//! Tests for audit sink

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use prometheus_quota_scheduler::core::{
    build_audit_event, AuditAction, AuditSink, InMemoryAuditSink, RequestId, WorkerId,
};

fn event(request: &str, action: AuditAction) -> prometheus_quota_scheduler::core::AuditEvent {
    build_audit_event(
        &WorkerId::new("w1"),
        &RequestId::new(request),
        action,
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
    )
}

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);

    sink.record(event("r1", AuditAction::Assign));
    assert_eq!(sink.events().len(), 1);

    let events = sink.events();
    assert_eq!(events[0].worker_id, WorkerId::new("w1"));
    assert_eq!(events[0].request_id, RequestId::new("r1"));
    assert_eq!(events[0].action, AuditAction::Assign);
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);

    sink.record(event("r1", AuditAction::Assign));
    sink.record(event("r2", AuditAction::Assign));
    sink.record(event("r3", AuditAction::Assign));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].request_id, RequestId::new("r2")); // First one popped
    assert_eq!(events[1].request_id, RequestId::new("r3"));
}

#[test]
fn test_zero_capacity_sink_drops_everything() {
    let mut sink = InMemoryAuditSink::new(0);
    sink.record(event("r1", AuditAction::Expire));
    assert!(sink.events().is_empty());
}

#[test]
fn test_shared_sink_records_through_handle() {
    let shared = Arc::new(Mutex::new(InMemoryAuditSink::new(4)));
    let mut handle = Arc::clone(&shared);

    handle.record(event("r1", AuditAction::Ack));

    assert_eq!(shared.lock().events().len(), 1);
}

#[test]
fn test_build_audit_event() {
    let at = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
    let event = build_audit_event(
        &WorkerId::new("w1"),
        &RequestId::new("r1"),
        AuditAction::Abort,
        at,
    );

    assert!(!event.event_id.is_empty());
    assert_eq!(event.action.to_string(), "abort");
    assert_eq!(event.created_at, at);
}
