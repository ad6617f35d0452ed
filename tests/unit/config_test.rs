//! Tests for configuration validation

use std::time::Duration;

use jam_slot_engine::config::{EngineConfig, FeedConfig};

#[test]
fn test_engine_config_defaults() {
    let cfg = EngineConfig::default();
    assert_eq!(cfg.commit_delay_ms, 5000);
    assert_eq!(cfg.scheduler_tick_ms, 250);
    assert_eq!(cfg.event_capacity, 256);
    assert_eq!(cfg.audit_capacity, 1024);
    assert_eq!(cfg.feed, FeedConfig::default());
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_engine_config_invalid_commit_delay() {
    let cfg = EngineConfig {
        commit_delay_ms: 0,
        ..EngineConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_engine_config_invalid_event_capacity() {
    let cfg = EngineConfig {
        event_capacity: 0,
        ..EngineConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_feed_config_invalid_degrade_threshold() {
    let feed = FeedConfig {
        degrade_after_failures: 0,
        ..FeedConfig::default()
    };
    assert!(feed.validate().is_err());
    let cfg = EngineConfig {
        feed,
        ..EngineConfig::default()
    };
    assert!(cfg.validate().unwrap_err().starts_with("feed invalid"));
}

#[test]
fn test_feed_config_max_wait_must_cover_quiet_period() {
    let feed = FeedConfig {
        coalesce_quiet_ms: 500,
        coalesce_max_wait_ms: 400,
        ..FeedConfig::default()
    };
    assert!(feed.validate().is_err());
    assert_eq!(FeedConfig::default().coalesce_max_wait(), Duration::from_secs(1));
}

#[test]
fn test_from_json_str_fills_defaults() {
    let json = r#"{ "commit_delay_ms": 3000, "feed": { "poll_interval_secs": 30 } }"#;
    let cfg = EngineConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.commit_delay_ms, 3000);
    assert_eq!(cfg.feed.poll_interval_secs, 30);
    assert_eq!(cfg.feed.rate_limit_cooldown_secs, 45);
}

#[test]
fn test_from_json_str_invalid() {
    assert!(EngineConfig::from_json_str("{ not json").is_err());
    assert!(EngineConfig::from_json_str(r#"{ "scheduler_tick_ms": 0 }"#).is_err());
}

#[test]
fn test_from_lookup_reads_jam_variables() {
    let cfg = EngineConfig::from_lookup(|key| match key {
        "JAM_FEED_RATE_LIMIT_COOLDOWN_SECS" => Some("60".to_string()),
        "JAM_FEED_DEGRADE_AFTER" => Some("5".to_string()),
        _ => None,
    })
    .unwrap();
    assert_eq!(cfg.feed.rate_limit_cooldown_secs, 60);
    assert_eq!(cfg.feed.degrade_after_failures, 5);
}
