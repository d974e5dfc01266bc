use indexmap::IndexMap;
use rstest::rstest;
use rulebook_core::{Rulebook, RulebookError, RollMode, Value};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const ENTITY_TYPES: &str = r#"{
    "item": {
        "attrs": {
            "weight": { "type": "number" },
            "cursed": { "type": "true-false" },
            "tags": { "type": "text list" },
            "label": { "type": "text" }
        }
    },
    "container": {
        "attrs": {
            "firstThing": { "type": "entity", "entityTypes": ["item"], "reverse": "owner" },
            "inventory": { "type": "entity list", "entityTypes": ["item"], "reverse": "holder" }
        }
    },
    "oddity": {},
    "trinket": { "includes": ["item"] }
}"#;

#[test]
fn test_round_trip_of_stored_values() {
    init();
    let mut book = Rulebook::from_json(ENTITY_TYPES).unwrap();
    let id = book
        .create_from_json("item", r#"{ "weight": 5.5, "cursed": true, "tags": ["iron", "old"], "label": "Sword" }"#)
        .unwrap();
    assert_eq!(book.get(id, "weight"), Ok(&Value::Number(5.5)));
    assert_eq!(book.get(id, "cursed"), Ok(&Value::Bool(true)));
    assert_eq!(book.get(id, "tags"), Ok(&Value::from(vec!["iron", "old"])));
    assert_eq!(book.get(id, "label"), Ok(&Value::from("Sword")));
}

#[test]
fn test_missing_and_unknown_keys() {
    init();
    let mut book = Rulebook::from_json(ENTITY_TYPES).unwrap();
    let id = book.create_from_json("item", r#"{ "colour": "red" }"#).unwrap();
    assert_eq!(book.get(id, "weight"), Ok(&Value::Number(0.0)));
    assert_eq!(book.get(id, "cursed"), Ok(&Value::Bool(false)));
    assert_eq!(book.get(id, "tags"), Ok(&Value::TextList(vec![])));
    assert_eq!(book.get(id, "owner"), Ok(&Value::Entity(None)));
    assert!(book.get(id, "colour").is_err());
}

#[rstest]
#[case("weight", Value::from("foo"))]
#[case("weight", Value::Bool(true))]
#[case("cursed", Value::from("true"))]
#[case("cursed", Value::Number(1.0))]
#[case("label", Value::from(vec!["a", "b"]))]
fn test_rejected_assignment_changes_nothing(#[case] attr: &str, #[case] value: Value) {
    init();
    let mut book = Rulebook::from_json(ENTITY_TYPES).unwrap();
    let id = book.create_from_json("item", r#"{ "weight": 5 }"#).unwrap();
    let before = book.get(id, attr).unwrap().clone();
    assert!(matches!(book.set(id, attr, value), Err(RulebookError::AttributeType(_))));
    assert_eq!(book.get(id, attr), Ok(&before));
}

#[test]
fn test_boolean_text_is_explained() {
    init();
    let mut book = Rulebook::from_json(ENTITY_TYPES).unwrap();
    let id = book.create_from_json("item", "{}").unwrap();
    let err = book.set(id, "cursed", "true").unwrap_err();
    assert!(err.to_string().contains("true-false"));
}

#[test]
fn test_scalar_coercions() {
    init();
    let mut book = Rulebook::from_json(ENTITY_TYPES).unwrap();
    let id = book.create_from_json("item", "{}").unwrap();
    book.set(id, "weight", "12").unwrap();
    assert_eq!(book.get(id, "weight"), Ok(&Value::Number(12.0)));
    book.set(id, "label", 14.7).unwrap();
    assert_eq!(book.get(id, "label"), Ok(&Value::from("14.7")));
    book.set(id, "tags", "single").unwrap();
    assert_eq!(book.get(id, "tags"), Ok(&Value::from(vec!["single"])));
}

#[test]
fn test_entity_type_acceptance() {
    init();
    let mut book = Rulebook::from_json(ENTITY_TYPES).unwrap();
    let item = book.create_from_json("item", r#"{ "weight": 5 }"#).unwrap();
    let trinket = book.create_from_json("trinket", "{}").unwrap();
    let oddity = book.create_from_json("oddity", "{}").unwrap();
    let container = book.create_from_json("container", "{}").unwrap();

    book.set(container, "firstThing", item).unwrap();
    assert_eq!(book.get(container, "firstThing"), Ok(&Value::from(item)));
    assert_eq!(book.get(item, "owner"), Ok(&Value::from(container)));

    // Included templates count as their includes.
    book.set(container, "firstThing", trinket).unwrap();
    assert_eq!(book.get(trinket, "owner"), Ok(&Value::from(container)));
    assert_eq!(book.get(item, "owner"), Ok(&Value::Entity(None)));

    let err = book.set(container, "firstThing", oddity).unwrap_err();
    assert!(err.to_string().contains("oddity"));
    assert_eq!(book.get(container, "firstThing"), Ok(&Value::from(trinket)));
}

#[test]
fn test_entity_list_is_all_or_nothing() {
    init();
    let mut book = Rulebook::from_json(ENTITY_TYPES).unwrap();
    let a = book.create_from_json("item", r#"{ "weight": 5 }"#).unwrap();
    let odd = book.create_from_json("oddity", "{}").unwrap();
    let b = book.create_from_json("item", r#"{ "weight": 2 }"#).unwrap();
    let container = book.create_from_json("container", "{}").unwrap();

    assert!(book.set(container, "inventory", vec![a, odd, b]).is_err());
    assert_eq!(book.get(container, "inventory"), Ok(&Value::EntityList(vec![])));
    assert_eq!(book.get(a, "holder"), Ok(&Value::Entity(None)));

    book.set(container, "inventory", vec![a, b]).unwrap();
    assert_eq!(book.get(container, "inventory"), Ok(&Value::EntityList(vec![a, b])));
}

#[test]
fn test_calculated_attributes_are_read_only() {
    init();
    let mut book = Rulebook::from_json(
        r#"{ "creature": { "attrs": {
            "dexterity": { "type": "number" },
            "dexMod": { "type": "number", "calc": "floor((dexterity - 10) / 2)" }
        } } }"#,
    )
    .unwrap();
    let id = book.create("creature", IndexMap::from([("dexterity".to_string(), Value::Number(14.0))])).unwrap();
    assert!(matches!(book.set(id, "dexMod", 5), Err(RulebookError::AttributeType(_))));
    assert_eq!(book.get(id, "dexMod"), Ok(&Value::Number(2.0)));
}

#[test]
fn test_valid_formula_guards_assignment() {
    init();
    let mut book = Rulebook::from_json(
        r#"{ "creature": { "attrs": {
            "level": { "type": "number", "valid": "level >= 1 && level <= 20" }
        } } }"#,
    )
    .unwrap();
    let id = book.create_from_json("creature", r#"{ "level": 3 }"#).unwrap();
    book.set(id, "level", 20).unwrap();
    assert!(book.set(id, "level", 21).is_err());
    assert_eq!(book.get(id, "level"), Ok(&Value::Number(20.0)));
    assert!(book.create_from_json("creature", r#"{ "level": 0 }"#).is_err());
    assert_eq!(book.entity_count(), 1);
}

#[rstest]
#[case::calc_type_mismatch(
    r#"{ "t": { "attrs": { "a": { "type": "number" }, "b": { "type": "text", "calc": "a + 1" } } } }"#
)]
#[case::boolean_valid_required(r#"{ "t": { "attrs": { "a": { "type": "number", "valid": "a + 1" } } } }"#)]
fn test_type_check_rejection_at_build(#[case] schema: &str) {
    init();
    assert!(matches!(Rulebook::from_json(schema), Err(RulebookError::AttributeType(_))));
}

#[rstest]
#[case::unknown_identifier(r#"{ "t": { "attrs": { "a": { "type": "number", "calc": "b * 2" } } } }"#)]
#[case::unknown_function(r#"{ "t": { "attrs": { "a": { "type": "number", "calc": "sqrt(4)" } } } }"#)]
#[case::no_overload(r#"{ "t": { "attrs": { "a": { "type": "number", "calc": "\"x\" * 2" } } } }"#)]
#[case::syntax(r#"{ "t": { "attrs": { "a": { "type": "number", "calc": "(1 + " } } } }"#)]
fn test_formula_errors_at_build(#[case] schema: &str) {
    init();
    assert!(matches!(Rulebook::from_json(schema), Err(RulebookError::Expression { .. })));
}

#[rstest]
#[case::calc_and_valid(r#"{ "t": { "attrs": { "a": { "type": "number", "calc": "1", "valid": "true" } } } }"#)]
#[case::unknown_include(r#"{ "t": { "includes": ["ghost"] } }"#)]
#[case::unknown_target(r#"{ "t": { "attrs": { "a": { "type": "entity", "entityTypes": ["ghost"] } } } }"#)]
#[case::conflicting_reverse(
    r#"{
        "item": { "attrs": { "owner": { "type": "number" } } },
        "box": { "attrs": { "inside": { "type": "entity list", "entityTypes": ["item"], "reverse": "owner" } } }
    }"#
)]
fn test_malformed_schemas(#[case] schema: &str) {
    init();
    assert!(matches!(Rulebook::from_json(schema), Err(RulebookError::MalformedSchema(_))));
}

#[test]
fn test_cyclic_formulas_name_the_chain() {
    init();
    let schema = r#"{ "monster": { "attrs": {
        "strMod": { "type": "number" },
        "challengeRating": { "type": "number", "calc": "floor(attackMod / 5)" },
        "profBonus": { "type": "number", "calc": "floor((challengeRating + 5) / 4)" },
        "attackMod": { "type": "number", "calc": "profBonus + strMod" }
    } } }"#;
    match Rulebook::from_json(schema) {
        Err(RulebookError::CircularDependency { chain }) => {
            assert_eq!(chain.first(), chain.last());
            assert_eq!(chain.len(), 4);
            assert!(chain.iter().all(|link| link.starts_with("monster.")));
        }
        other => panic!("expected a circular dependency, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_cyclic_includes() {
    init();
    let schema = r#"{ "a": { "includes": ["b"] }, "b": { "includes": ["a"] } }"#;
    assert!(matches!(Rulebook::from_json(schema), Err(RulebookError::CircularDependency { .. })));
}

#[test]
fn test_preview_and_describe() {
    init();
    let mut book = Rulebook::from_json(
        r#"{ "creature": { "attrs": {
            "dexterity": { "type": "number" },
            "dexMod": { "type": "number", "calc": "floor((dexterity - 10) / 2)" },
            "attack": { "type": "number", "calc": "2d6 + dexMod" }
        } } }"#,
    )
    .unwrap();
    let id = book.create_from_json("creature", r#"{ "dexterity": 16 }"#).unwrap();
    assert_eq!(book.preview(id, "attack", RollMode::ForceMin), Ok(Value::Number(5.0)));
    assert_eq!(book.preview(id, "attack", RollMode::ForceMax), Ok(Value::Number(15.0)));
    assert_eq!(book.describe(id, "attack", true).unwrap(), "2d6 + 3");

    let trace = book.trace(id, "attack").unwrap();
    assert!(trace.contains("[L1] attack"));
    assert!(trace.contains("dexterity[16] -> Input"));
}
