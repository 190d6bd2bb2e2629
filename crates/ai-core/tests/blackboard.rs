use ai_core::{Blackboard, BlackboardError, EntityHandle, Value, ValueKind, Vec2};

#[test]
fn blackboard_set_get_remove_roundtrip() {
    let mut bb = Blackboard::new();
    assert!(!bb.contains("hunger"));

    bb.set("hunger", 0.5f32);
    bb.set("name", "kobold".to_string());
    bb.set("alert", true);

    assert_eq!(bb.get::<f32>("hunger"), Ok(0.5));
    assert_eq!(bb.get::<String>("name").as_deref(), Ok("kobold"));
    assert_eq!(bb.get::<bool>("alert"), Ok(true));
    assert_eq!(bb.len(), 3);

    assert_eq!(bb.remove("hunger"), Some(Value::Float(0.5)));
    assert_eq!(
        bb.get::<f32>("hunger"),
        Err(BlackboardError::Missing("hunger".to_string()))
    );
}

#[test]
fn blackboard_type_mismatch_is_an_error() {
    let mut bb = Blackboard::new();
    bb.set("target", EntityHandle(7));

    let err = bb.get::<i64>("target").unwrap_err();
    assert_eq!(
        err,
        BlackboardError::TypeMismatch {
            key: "target".to_string(),
            expected: ValueKind::Int,
            found: ValueKind::Entity,
        }
    );
    // The stored value is untouched.
    assert_eq!(bb.get_entity("target"), Ok(7));
}

#[test]
fn get_or_defaults_only_when_missing() {
    let mut bb = Blackboard::new();
    assert_eq!(bb.get_or("count", 3i64), Ok(3));

    bb.set("count", 9i64);
    assert_eq!(bb.get_or("count", 3i64), Ok(9));

    bb.set("count", "nine".to_string());
    assert!(bb.get_or("count", 3i64).is_err());
}

#[test]
fn inc_starts_from_default_and_accepts_any_numeric_kind() {
    let mut bb = Blackboard::new();
    assert_eq!(bb.inc("fear", 0.25, 1.0), 1.25);
    assert_eq!(bb.get::<f32>("fear"), Ok(1.25));

    bb.set("hits", 2i64);
    assert_eq!(bb.inc("hits", 1.0, 0.0), 3.0);
    assert_eq!(bb.value("hits").map(Value::kind), Some(ValueKind::Float));
}

#[test]
fn exp_decay_shrinks_towards_zero() {
    let mut bb = Blackboard::new();
    bb.set("alarm", 1.0f32);

    let once = bb.exp_decay("alarm", 2.0, 0.5, 0.0);
    assert!((once - (-1.0f32).exp()).abs() < 1e-6);

    let twice = bb.exp_decay("alarm", 2.0, 0.5, 0.0);
    assert!(twice < once);
    assert!(twice > 0.0);

    // Unset keys decay from the default.
    assert_eq!(bb.exp_decay("missing", 1.0, 1.0, 0.0), 0.0);
}

#[test]
fn vec2_helpers_store_points() {
    let mut bb = Blackboard::new();
    bb.set_vec2("home", 3.0, -4.0);

    let home = bb.get_vec2("home").unwrap();
    assert_eq!(home, Vec2::new(3.0, -4.0));
    assert_eq!(home.length(), 5.0);
}

#[test]
fn clear_drops_every_key_and_dump_is_sorted() {
    let mut bb = Blackboard::new();
    bb.set("zeta", 1i32);
    bb.set("alpha", false);

    assert_eq!(bb.dump(), "alpha = bool:false\nzeta = int:1\n");
    assert_eq!(bb.keys().collect::<Vec<_>>(), vec!["alpha", "zeta"]);

    bb.clear();
    assert!(bb.is_empty());
    assert_eq!(bb.dump(), "");
}
