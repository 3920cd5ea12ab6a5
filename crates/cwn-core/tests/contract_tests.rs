// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{TimeZone, Utc};
use cwn_core::{
    canonical_json, sha512_hex, CheckpointV1, Entity, EntityEvent, EntityKind, EvalError,
    Properties, PropertyValue, RuleStatus, ENVELOPE_VERSION, PROP_DEFAULT_BRANCH, PROP_IS_PRIVATE,
};
use uuid::Uuid;

fn sample_entity() -> Entity {
    let mut properties = Properties::new();
    properties.insert(PROP_IS_PRIVATE, false);
    properties.insert(PROP_DEFAULT_BRANCH, "main");
    properties.insert("name", "acme/widgets");
    Entity {
        id: Uuid::nil(),
        upstream_id: "github:123456".into(),
        kind: EntityKind::Repository,
        project_id: Uuid::nil(),
        provider_id: "github-app".into(),
        properties,
        originated_from: None,
    }
}

#[test]
fn entity_display_name_prefers_name_property() {
    let entity = sample_entity();
    assert_eq!(entity.display_name(), "acme/widgets");

    let mut anonymous = sample_entity();
    anonymous.properties = Properties::new();
    assert_eq!(anonymous.display_name(), "github:123456");
}

#[test]
fn entity_serde_roundtrip_preserves_properties() {
    let entity = sample_entity();
    let json = serde_json::to_string(&entity).unwrap();
    let back: Entity = serde_json::from_str(&json).unwrap();
    assert_eq!(back, entity);
    assert_eq!(back.properties.bool_of(PROP_IS_PRIVATE), Some(false));
    assert_eq!(back.properties.str_of(PROP_DEFAULT_BRANCH), Some("main"));
}

#[test]
fn fingerprint_payload_excludes_freshness_metadata() {
    let ts = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let mut fresh = sample_entity();
    fresh
        .properties
        .insert_fetched(PROP_IS_PRIVATE, false, ts);

    let stale = sample_entity();
    assert_eq!(fresh.fingerprint_payload(), stale.fingerprint_payload());
}

#[test]
fn entity_event_carries_envelope_version() {
    let event = EntityEvent::new(sample_entity());
    assert_eq!(event.version, ENVELOPE_VERSION);
    assert_eq!(event.provider_id, "github-app");
    assert_eq!(event.entity.kind, EntityKind::Repository);
}

#[test]
fn property_value_conversions() {
    assert_eq!(PropertyValue::from(true).as_bool(), Some(true));
    assert_eq!(PropertyValue::from(42i64).as_int(), Some(42));
    assert_eq!(PropertyValue::from("x").as_str(), Some("x"));
    assert_eq!(PropertyValue::from(true).as_str(), None);
}

#[test]
fn canonical_json_is_deterministic() {
    let entity = sample_entity();
    let a = canonical_json(&entity).unwrap();
    let b = canonical_json(&entity).unwrap();
    assert_eq!(a, b);
}

#[test]
fn sha512_hex_is_stable_and_128_chars() {
    let d1 = sha512_hex(b"payload");
    let d2 = sha512_hex(b"payload");
    assert_eq!(d1, d2);
    assert_eq!(d1.len(), 128);
    assert_ne!(d1, sha512_hex(b"payload2"));
}

#[test]
fn checkpoint_builder_chains_and_seals() {
    let cp = CheckpointV1::now()
        .with_branch("main")
        .with_commit_hash("abc123")
        .with_digest("sha256:feed");
    assert_eq!(cp.branch.as_deref(), Some("main"));
    assert_eq!(cp.commit_hash.as_deref(), Some("abc123"));
    assert_eq!(cp.version, None);

    let sealed = cp.seal();
    let json = serde_json::to_value(&sealed).unwrap();
    assert_eq!(json["version"], "v1");
    assert_eq!(json["checkpoint"]["branch"], "main");
}

#[test]
fn checkpoint_serde_tolerates_missing_optionals() {
    let json = r#"{"version":"v1","checkpoint":{"timestamp":"2026-01-01T00:00:00Z"}}"#;
    let cp: cwn_core::Checkpoint = serde_json::from_str(json).unwrap();
    let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(cp.timestamp(), ts);
}

#[test]
fn eval_error_maps_onto_status_taxonomy() {
    assert_eq!(EvalError::failed("x").status(), RuleStatus::Failure);
    assert_eq!(EvalError::skipped("x").status(), RuleStatus::Skipped);
    assert_eq!(
        EvalError::SkippedSilently("x".into()).status(),
        RuleStatus::SkippedSilently
    );
    assert_eq!(
        EvalError::Evaluation("boom".into()).status(),
        RuleStatus::Error
    );
    assert_eq!(EvalError::Cancelled.status(), RuleStatus::Error);
    assert_eq!(EvalError::Internal("p".into()).status(), RuleStatus::Error);
}

#[test]
fn only_definitive_verdicts_drive_actions() {
    assert!(RuleStatus::Success.drives_actions());
    assert!(RuleStatus::Failure.drives_actions());
    assert!(!RuleStatus::Skipped.drives_actions());
    assert!(!RuleStatus::SkippedSilently.drives_actions());
    assert!(!RuleStatus::Error.drives_actions());
    assert!(!RuleStatus::Pending.drives_actions());
}

#[test]
fn outcome_summary_rolls_up_statuses() {
    use cwn_core::{ActionStatus, EvaluationOutcome, OutcomeSummary};

    fn outcome(status: RuleStatus) -> EvaluationOutcome {
        EvaluationOutcome {
            entity_id: Uuid::nil(),
            profile_id: Uuid::nil(),
            rule_instance_id: Uuid::new_v4(),
            status,
            remediation: ActionStatus::Skipped,
            alert: ActionStatus::Skipped,
            detail: None,
            checkpoint: None,
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            lease_id: Uuid::nil(),
        }
    }

    let summary = OutcomeSummary::from_outcomes(&[
        outcome(RuleStatus::Success),
        outcome(RuleStatus::Success),
        outcome(RuleStatus::Failure),
        outcome(RuleStatus::Skipped),
    ]);
    assert_eq!(summary.total, 4);
    assert_eq!(summary.count(RuleStatus::Success), 2);
    assert_eq!(summary.failing, 1);
    assert!(!summary.compliant);

    let clean = OutcomeSummary::from_outcomes(&[outcome(RuleStatus::Success)]);
    assert!(clean.compliant);

    // Vacuously compliant.
    assert!(OutcomeSummary::from_outcomes(&[]).compliant);
}
