use ai_goap::{AtomRegistry, GoapError, WorldState, MAX_ATOMS};

#[test]
fn set_then_get_roundtrips_and_unset_atoms_are_unspecified() {
    let mut atoms = AtomRegistry::default();
    atoms.register("hungry").unwrap();
    atoms.register("has_food").unwrap();

    let mut ws = WorldState::EMPTY;
    atoms.set(&mut ws, "hungry", true).unwrap();

    assert_eq!(atoms.get(&ws, "hungry"), Ok(Some(true)));
    assert_eq!(atoms.get(&ws, "has_food"), Ok(None));
    assert_eq!(
        atoms.get(&ws, "tired"),
        Err(GoapError::UnknownAtom("tired".to_string()))
    );
}

#[test]
fn set_rejects_unknown_atoms_unless_auto_register_is_enabled() {
    let mut strict = AtomRegistry::default();
    let mut ws = WorldState::EMPTY;
    assert_eq!(
        strict.set(&mut ws, "tired", true),
        Err(GoapError::UnknownAtom("tired".to_string()))
    );
    assert!(strict.is_empty());

    let mut lenient = AtomRegistry::default().with_auto_register(true);
    lenient.set(&mut ws, "tired", true).unwrap();
    assert_eq!(lenient.index_of("tired"), Some(0));
}

#[test]
fn registration_stops_at_the_cap() {
    let mut atoms = AtomRegistry::new(2);
    atoms.register("a").unwrap();
    atoms.register("b").unwrap();
    assert_eq!(atoms.register("a"), Ok(0));
    assert_eq!(
        atoms.register("c"),
        Err(GoapError::AtomCapExceeded {
            atom: "c".to_string(),
            cap: 2
        })
    );

    // The cap never exceeds the usable bits of the word.
    assert_eq!(AtomRegistry::new(500).cap(), MAX_ATOMS);
}

#[test]
fn describe_uses_case_for_truth_and_omits_unspecified_atoms() {
    let mut atoms = AtomRegistry::default();
    let ws = atoms
        .encode_registering([("hungry", true), ("has_food", false)])
        .unwrap();
    atoms.register("tired").unwrap();

    assert_eq!(atoms.describe(&ws), "HUNGRY,has_food");
    assert_eq!(atoms.describe(&WorldState::EMPTY), "");
}

#[test]
fn empty_expectation_matches_everything() {
    let mut atoms = AtomRegistry::default();
    let ws = atoms
        .encode_registering([("a", true), ("b", false)])
        .unwrap();

    assert!(ws.matches(&WorldState::EMPTY));
    assert!(WorldState::EMPTY.matches(&WorldState::EMPTY));

    let expect_b = atoms.encode([("b", true)]).unwrap();
    assert!(!ws.matches(&expect_b));
}

#[test]
fn masks_from_names_ignore_unknown_atoms() {
    let mut atoms = AtomRegistry::default();
    atoms.register("a").unwrap();
    atoms.register("b").unwrap();
    atoms.register("c").unwrap();

    assert_eq!(atoms.mask_from_names(["a", "c", "missing"]), 0b101);
    assert_eq!(atoms.all_mask(), 0b111);
    assert_eq!(atoms.describe_bits(0b110), vec!["b", "c"]);
}

#[test]
fn to_map_lists_specified_atoms() {
    let mut atoms = AtomRegistry::default();
    let ws = atoms
        .encode_registering([("hungry", true), ("has_food", false)])
        .unwrap();
    atoms.register("tired").unwrap();

    let map = atoms.to_map(&ws);
    assert_eq!(map.len(), 2);
    assert_eq!(map["hungry"], true);
    assert_eq!(map["has_food"], false);
}

#[test]
fn remap_preserves_meaning_across_tables() {
    let mut from = AtomRegistry::default();
    let ws = from
        .encode_registering([("a", true), ("b", false), ("c", true)])
        .unwrap();

    let mut to = AtomRegistry::default();
    to.register("c").unwrap();
    to.register("x").unwrap();

    let moved = ws.remap(&from, &mut to).unwrap();
    assert_eq!(to.to_map(&moved), from.to_map(&ws));
    assert_eq!(to.index_of("c"), Some(0));
    assert_eq!(to.index_of("a"), Some(2));
}
