// SPDX-License-Identifier: MIT OR Apache-2.0

use cwn_config::{ConfigError, ConfigWarning, EngineConfig};

#[test]
fn defaults_are_valid_and_quiet() {
    let cfg = EngineConfig::default();
    cfg.validate().unwrap();
    assert!(cfg.warnings().is_empty());
    assert_eq!(cfg.ingest.rest_max_body_bytes, 1024 * 1024);
    assert_eq!(cfg.executor.cleanup_timeout_secs, 30);
    assert_eq!(cfg.artifact.retention_days, 183);
}

#[test]
fn toml_roundtrip() {
    let raw = r#"
        log_level = "debug"

        [ingest]
        rest_max_body_bytes = 2048
        clone_max_files = 10
        clone_max_bytes = 4096
        timeout_secs = 5

        [executor]
        timeout_secs = 30
        lease_ttl_secs = 15
        cleanup_timeout_secs = 10
    "#;
    let cfg = EngineConfig::from_toml(raw).unwrap();
    assert_eq!(cfg.log_level.as_deref(), Some("debug"));
    assert_eq!(cfg.ingest.rest_max_body_bytes, 2048);
    assert_eq!(cfg.executor.timeout_secs, 30);
    // Unspecified sections keep their defaults.
    assert_eq!(cfg.artifact.retention_days, 183);
    cfg.validate().unwrap();
}

#[test]
fn executor_timeout_must_bound_ingest_timeout() {
    let raw = r#"
        [ingest]
        timeout_secs = 120

        [executor]
        timeout_secs = 60
    "#;
    let cfg = EngineConfig::from_toml(raw).unwrap();
    let err = cfg.validate().unwrap_err();
    match err {
        ConfigError::ValidationError { reasons } => {
            assert!(reasons.iter().any(|r| r.contains("bound")));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn zero_limits_are_rejected() {
    let raw = r#"
        [ingest]
        rest_max_body_bytes = 0
        clone_max_files = 0
        timeout_secs = 0
    "#;
    let cfg = EngineConfig::from_toml(raw).unwrap();
    let err = cfg.validate().unwrap_err();
    match err {
        ConfigError::ValidationError { reasons } => assert!(reasons.len() >= 3),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn short_lease_ttl_warns() {
    let raw = r#"
        [executor]
        lease_ttl_secs = 5
    "#;
    let cfg = EngineConfig::from_toml(raw).unwrap();
    assert!(cfg
        .warnings()
        .iter()
        .any(|w| matches!(w, ConfigWarning::ShortLeaseTtl { secs: 5 })));
}

#[test]
fn merged_overlay_wins_where_it_differs() {
    let base = EngineConfig::from_toml(r#"log_level = "info""#).unwrap();
    let overlay = EngineConfig::from_toml(
        r#"
        log_level = "debug"

        [executor]
        timeout_secs = 120
        lease_ttl_secs = 30
        cleanup_timeout_secs = 30
    "#,
    )
    .unwrap();

    let merged = base.merged_with(overlay);
    assert_eq!(merged.log_level.as_deref(), Some("debug"));
    assert_eq!(merged.executor.timeout_secs, 120);
    // Untouched sections keep base values.
    assert_eq!(merged.ingest, cwn_config::IngestLimits::default());
}

#[test]
fn missing_file_is_a_typed_error() {
    let err = EngineConfig::load("/definitely/not/here.toml").unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound { .. }));
}

#[test]
fn garbage_toml_is_a_parse_error() {
    let err = EngineConfig::from_toml("not toml [").unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
}
