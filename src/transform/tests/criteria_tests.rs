use serde_json::{json, Value};

use crate::error::SqlError;
use crate::transform::criteria::{Criteria, CriteriaValue};

#[test]
fn permissive_json_form() {
    let c = Criteria::from_json_str(
        r#"{"id": 42, "name": {"like": "%a%"}, "price": {"min": 1, "max": 9}, "tag": ["a", "b"], "x": null, "low": {"gte": 5}}"#,
    )
    .expect("criteria");
    assert_eq!(c.entries().len(), 6);
    let active = c.active();
    assert_eq!(
        active,
        vec![
            ("id".to_string(), CriteriaValue::Equals(json!(42))),
            ("name".to_string(), CriteriaValue::Like("%a%".into())),
            ("price".to_string(), CriteriaValue::Range { min: Some(json!(1)), max: Some(json!(9)) }),
            ("tag".to_string(), CriteriaValue::In(vec![json!("a"), json!("b")])),
            ("low".to_string(), CriteriaValue::GreaterOrEqual(json!(5))),
        ]
    );
}

#[test]
fn single_bound_ranges_degrade_to_comparisons() {
    assert_eq!(CriteriaValue::Range { min: None, max: Some(json!(3)) }.normalized(), CriteriaValue::LessOrEqual(json!(3)));
    assert!(CriteriaValue::Range { min: None, max: None }.is_omitted());
    let c = Criteria::from_json(&json!({"p": {"min": null, "max": null}})).expect("criteria");
    assert!(c.is_empty());
}

#[test]
fn operator_errors() {
    for bad in [
        json!({"a": {"between": 1}}),
        json!({"a": {}}),
        json!({"a": {"like": 3}}),
        json!({"a": {"in": "x"}}),
        json!({"a": {"min": 1, "eq": 2}}),
        json!(["not", "an", "object"]),
    ] {
        let err = Criteria::from_json(&bad).unwrap_err();
        assert!(matches!(err, SqlError::InvalidArgument(_)), "{} gave {:?}", bad, err);
    }
}

#[test]
fn keys_replace_case_insensitively_in_place() {
    let c = Criteria::new().equals("Id", 1).like("name", "a%").equals("id", 2);
    assert_eq!(c.entries().len(), 2);
    assert_eq!(c.entries()[0], ("Id".to_string(), CriteriaValue::Equals(json!(2))));
}

#[test]
fn deserializes_through_serde() {
    let c: Criteria = serde_json::from_str(r#"{"status": ["open", "held"], "gone": null}"#).expect("serde");
    assert_eq!(c.active(), vec![("status".to_string(), CriteriaValue::In(vec![json!("open"), json!("held")]))]);
    let c = Criteria::try_from(json!({"flag": true})).expect("try_from");
    assert_eq!(c.entries()[0].1, CriteriaValue::Equals(Value::Bool(true)));
}
