//! Tests for configuration validation

use prometheus_quota_scheduler::config::{ReconcilerConfig, SchedulerConfig};
use prometheus_quota_scheduler::core::{AccountConfig, AccountId};

#[test]
fn test_default_config_is_valid() {
    assert!(SchedulerConfig::default().validate().is_ok());
}

#[test]
fn test_reconciler_config_zero_timeout_rejected() {
    let invalid = ReconcilerConfig {
        ack_timeout_secs: Some(0),
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_reconciler_config_out_of_range_timeout_rejected() {
    let invalid = ReconcilerConfig {
        ack_timeout_secs: Some(u64::MAX),
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_empty_account_rejected() {
    let invalid = SchedulerConfig::default().with_account("", AccountConfig::with_max_fanout(2));
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_from_json() {
    let json = r#"{
        "accounts": {
            "acct-a": { "max_fanout": 3 },
            "acct-b": {}
        },
        "reconciler": { "ack_timeout_secs": 45 }
    }"#;
    let cfg = SchedulerConfig::from_json_str(json).unwrap();

    assert_eq!(cfg.max_fanout(&AccountId::new("acct-a")), Some(3));
    assert_eq!(cfg.max_fanout(&AccountId::new("acct-b")), None);
    assert_eq!(cfg.reconciler.ack_timeout_secs, Some(45));
}

#[test]
fn test_scheduler_config_from_json_rejects_invalid() {
    let bad_timeout = r#"{ "reconciler": { "ack_timeout_secs": 0 } }"#;
    let err = SchedulerConfig::from_json_str(bad_timeout).unwrap_err();
    assert!(err.contains("reconciler invalid"));

    let err = SchedulerConfig::from_json_str("not json").unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_empty_json_object_uses_defaults() {
    let cfg = SchedulerConfig::from_json_str("{}").unwrap();
    assert!(cfg.accounts.is_empty());
    assert_eq!(cfg.reconciler, ReconcilerConfig::default());
}
