//! Tests for error types

use chrono::DateTime;
use prometheus_quota_scheduler::core::{ErrorKind, SchedulerError};

#[test]
fn test_invalid_timestamp_error() {
    let err = SchedulerError::InvalidTimestamp {
        seconds: 12,
        nanos: -3,
    };
    assert_eq!(format!("{}", err), "invalid timestamp: seconds=12 nanos=-3");
    assert_eq!(err.kind(), ErrorKind::InvalidTimestamp);
}

#[test]
fn test_time_regression_error() {
    let err = SchedulerError::TimeRegression {
        previous: DateTime::from_timestamp(20, 0).unwrap(),
        requested: DateTime::from_timestamp(10, 0).unwrap(),
    };
    assert_eq!(
        format!("{}", err),
        "time regression: 1970-01-01 00:00:10 UTC is before 1970-01-01 00:00:20 UTC"
    );
    assert_eq!(err.kind(), ErrorKind::TimeRegression);
}

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("account ids must not be empty".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: account ids must not be empty"
    );
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
}

#[test]
fn test_backend_error() {
    let err = SchedulerError::Backend("connection failed".to_string());
    assert_eq!(format!("{}", err), "backend error: connection failed");
    assert_eq!(err.kind(), ErrorKind::Backend);
}

#[test]
fn test_error_converts_into_anyhow() {
    fn fails() -> prometheus_quota_scheduler::core::AppResult<()> {
        let failed: Result<(), SchedulerError> = Err(SchedulerError::Backend("boom".into()));
        failed?;
        Ok(())
    }
    let err = fails().unwrap_err();
    assert!(err.downcast_ref::<SchedulerError>().is_some());
}
