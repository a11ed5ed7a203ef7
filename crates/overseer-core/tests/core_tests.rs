//! Tests for overseer-core: types, protocol payloads, errors, config

use overseer_core::*;

// ===========================================================================
// Outcome
// ===========================================================================

#[test]
fn outcome_new_and_display() {
    let outcome = Outcome::new("done");
    assert_eq!(outcome.as_str(), "done");
    assert_eq!(format!("{}", outcome), "done");
}

#[test]
fn outcome_clone_is_cheap() {
    let outcome = Outcome::new("finished");
    let cloned = outcome.clone();
    assert_eq!(outcome, cloned);
    assert_eq!(outcome.as_str(), cloned.as_str());
}

#[test]
fn outcome_from_str_and_string() {
    let a: Outcome = "failed".into();
    assert_eq!(a.as_str(), "failed");
    let b: Outcome = String::from("failed").into();
    assert_eq!(a, b);
}

#[test]
fn outcome_preempted_sentinel() {
    let outcome = Outcome::preempted();
    assert!(outcome.is_preempted());
    assert_eq!(outcome.as_str(), PREEMPTED);
    assert!(!Outcome::new("done").is_preempted());
}

#[test]
fn outcome_equality_and_hash() {
    use std::collections::HashMap;
    let mut transitions = HashMap::new();
    transitions.insert(Outcome::new("done"), "Next");
    assert_eq!(transitions.get(&Outcome::new("done")), Some(&"Next"));
    assert_eq!(transitions.get(&Outcome::new("failed")), None);
}

// ===========================================================================
// AutonomyCell
// ===========================================================================

#[test]
fn autonomy_cell_default_level() {
    let cell = AutonomyCell::default();
    assert_eq!(cell.get(), AUTONOMY_DEFAULT);
    assert!(!cell.is_unattended());
}

#[test]
fn autonomy_cell_is_shared() {
    let cell = AutonomyCell::new(1);
    let view = cell.clone();
    cell.set(200);
    assert_eq!(view.get(), 200);
}

#[test]
fn autonomy_cell_unattended_threshold() {
    let cell = AutonomyCell::new(AUTONOMY_UNATTENDED);
    assert!(cell.is_unattended());
    cell.set(AUTONOMY_UNATTENDED - 1);
    assert!(!cell.is_unattended());
}

// ===========================================================================
// path_checksum
// ===========================================================================

#[test]
fn path_checksum_none_is_zero() {
    assert_eq!(path_checksum(None), 0);
}

#[test]
fn path_checksum_is_deterministic() {
    let a = path_checksum(Some("/Root/Inner/Work"));
    let b = path_checksum(Some("/Root/Inner/Work"));
    assert_eq!(a, b);
    assert_ne!(a, 0);
}

#[test]
fn path_checksum_distinguishes_paths() {
    assert_ne!(
        path_checksum(Some("/Root/A")),
        path_checksum(Some("/Root/B"))
    );
}

#[test]
fn path_checksum_known_value() {
    // adler32 of "/A": a = 1 + 0x2f + 0x41 = 113, b = (1 + 0x2f) + 113 = 161
    assert_eq!(path_checksum(Some("/A")), (161 << 16) | 113);
}

#[test]
fn path_checksum_top_bit_is_clear() {
    for path in ["/Root", "/Root/Deep/Deeper", "/x", ""] {
        assert_eq!(path_checksum(Some(path)) & 0x8000_0000, 0);
    }
}

// ===========================================================================
// Protocol payloads
// ===========================================================================

#[test]
fn behavior_status_roundtrip() {
    let status = BehaviorStatus {
        behavior_id: 42,
        path_checksum: 12345,
    };
    let json = serde_json::to_string(&status).unwrap();
    let back: BehaviorStatus = serde_json::from_str(&json).unwrap();
    assert_eq!(status, back);
}

#[test]
fn container_entry_optional_fields_default() {
    // a leaf entry on the wire carries only path and outcomes
    let json = r#"{"path":"/Root/Work","outcomes":["done","failed"]}"#;
    let entry: ContainerEntry = serde_json::from_str(json).unwrap();
    assert_eq!(entry.path, "/Root/Work");
    assert_eq!(entry.outcomes, vec!["done", "failed"]);
    assert!(entry.children.is_empty());
    assert!(entry.transitions.is_empty());
    assert!(entry.autonomy.is_empty());
}

#[test]
fn structure_description_roundtrip() {
    let msg = StructureDescription {
        behavior_id: 7,
        containers: vec![ContainerEntry {
            path: "/Root".to_string(),
            children: vec!["Work".to_string()],
            outcomes: vec!["finished".to_string()],
            transitions: vec![],
            autonomy: vec![],
        }],
    };
    let json = serde_json::to_value(&msg).unwrap();
    let back: StructureDescription = serde_json::from_value(json).unwrap();
    assert_eq!(msg, back);
}

#[test]
fn command_ack_constructors() {
    let plain = CommandAck::new("sync");
    assert_eq!(plain.command, "sync");
    assert!(plain.args.is_empty());

    let with_args = CommandAck::with_args("attach", vec!["Patrol".to_string()]);
    assert_eq!(with_args.command, "attach");
    assert_eq!(with_args.args, vec!["Patrol"]);
}

#[test]
fn log_severity_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&LogSeverity::Warn).unwrap(), r#""warn""#);
    let back: LogSeverity = serde_json::from_str(r#""error""#).unwrap();
    assert_eq!(back, LogSeverity::Error);
}

#[test]
fn autonomy_command_accepts_negative_level() {
    let cmd: AutonomyCommand = serde_json::from_str(r#"{"level":-1}"#).unwrap();
    assert!(cmd.level < 0);
}

#[test]
fn outcome_request_roundtrip() {
    let req = OutcomeRequest {
        target: "Work".to_string(),
        outcome: 1,
    };
    let json = serde_json::to_string(&req).unwrap();
    let back: OutcomeRequest = serde_json::from_str(&json).unwrap();
    assert_eq!(req, back);
}

// ===========================================================================
// Errors
// ===========================================================================

#[test]
fn structure_error_messages_name_the_state() {
    let err = StructureError::UnknownOutcome {
        label: "Work".to_string(),
        outcome: "bogus".to_string(),
    };
    let msg = err.to_string();
    assert!(msg.contains("Work"));
    assert!(msg.contains("bogus"));
}

#[test]
fn execution_fault_preserves_source() {
    let fault = ExecutionFault::new("Work", anyhow::anyhow!("sensor offline"));
    assert_eq!(fault.label, "Work");
    assert!(format!("{:#}", fault.source).contains("sensor offline"));
}

#[test]
fn lookup_error_display() {
    let err = LookupError {
        label: "Work".to_string(),
        outcome: "done".to_string(),
    };
    let msg = err.to_string();
    assert!(msg.contains("Work"));
    assert!(msg.contains("done"));
}

// ===========================================================================
// EngineConfig
// ===========================================================================

#[test]
fn engine_config_defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.tick_interval_ms, 10);
    assert_eq!(config.channel_capacity, 1024);
    assert_eq!(config.readiness_timeout_ms, 5000);
}

#[test]
fn engine_config_deserializes_with_defaults() {
    let config: EngineConfig = serde_json::from_str(r#"{"tick_interval_ms":50}"#).unwrap();
    assert_eq!(config.tick_interval_ms, 50);
    assert_eq!(config.channel_capacity, 1024);
}
