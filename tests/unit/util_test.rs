//! Tests for utility functions

use prometheus_quota_scheduler::core::{Balance, Priority, SchedulerError};
use prometheus_quota_scheduler::util::clock::{self, WireTimestamp};

#[test]
fn test_priority_ordering() {
    assert!(Priority::new(0) < Priority::new(1));
    assert!(Priority::new(2) < Priority::FREE_BUCKET);
    assert_eq!(Priority::new(200), Priority::FREE_BUCKET);
    assert_eq!(Priority::FREE_BUCKET.to_string(), "free");
    assert_eq!(Priority::new(1).to_string(), "p1");
}

#[test]
fn test_balance_best_priority() {
    assert_eq!(Balance([0.0, 2.0, 1.0]).best_priority(), Priority::new(1));
    assert_eq!(Balance([0.0, 0.0, 0.0]).best_priority(), Priority::FREE_BUCKET);
    assert_eq!(Balance([-1.0, 0.0, 0.5]).best_priority(), Priority::new(2));
}

#[test]
fn test_wire_timestamp_nanos_out_of_range() {
    let err = WireTimestamp::new(5, 1_000_000_000).to_datetime().unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidTimestamp { seconds: 5, .. }));
}

#[test]
fn test_wire_timestamp_leap_second_round_trip() {
    // 2016-12-31T23:59:60.5Z
    let leap = chrono::DateTime::from_timestamp(1_483_228_799, 1_500_000_000).unwrap();
    let wire = WireTimestamp::from_datetime(leap);

    assert_eq!(wire.seconds, 1_483_228_799);
    assert_eq!(wire.nanos, 1_500_000_000);
    assert_eq!(wire.to_datetime().unwrap(), leap);

    let json = serde_json::to_string(&wire).unwrap();
    let decoded: WireTimestamp = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded.to_datetime().unwrap(), leap);
}

#[test]
fn test_wire_timestamp_unrepresentable_seconds() {
    assert!(WireTimestamp::new(i64::MAX, 0).to_datetime().is_err());
}

#[test]
fn test_clock_now_round_trips_through_wire() {
    let now = clock::now();
    let wire = WireTimestamp::from(now);
    let back: chrono::DateTime<chrono::Utc> = wire.try_into().unwrap();
    assert_eq!(back, now);
}

#[test]
fn test_wire_timestamp_json_shape() {
    let json = serde_json::to_string(&WireTimestamp::new(7, 9)).unwrap();
    assert_eq!(json, r#"{"seconds":7,"nanos":9}"#);
}

#[test]
fn test_init_tracing_installs_once() {
    use prometheus_quota_scheduler::util::{init_tracing, DEFAULT_FILTER};

    assert!(DEFAULT_FILTER.starts_with("prometheus_quota_scheduler="));
    init_tracing();
    // A subscriber is now in place, so a second call is a no-op.
    assert!(!init_tracing());
    assert!(tracing::dispatcher::has_been_set());
}
