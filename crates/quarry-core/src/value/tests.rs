use crate::{
    model::ScalarType,
    value::{TextMode, Value, canonical_cmp, strict_order_cmp, values_equal},
};
use rust_decimal::Decimal;
use serde_json::json;
use std::{cmp::Ordering, str::FromStr};

fn dec(text: &str) -> Decimal {
    Decimal::from_str(text).expect("decimal literal")
}

#[test]
fn decimal_strings_keep_their_scale() {
    let value = Value::from_json(&json!("1250.50"), &ScalarType::Decimal).expect("decimal");

    assert_eq!(value, Value::Decimal(dec("1250.50")));
    assert_eq!(value.to_json(), json!("1250.50"));
}

#[test]
fn decimal_accepts_numbers_and_scientific_notation() {
    assert_eq!(
        Value::from_json(&json!(12), &ScalarType::Decimal).expect("int"),
        Value::Decimal(dec("12"))
    );
    assert_eq!(
        Value::from_json(&json!("1.5e2"), &ScalarType::Decimal).expect("scientific"),
        Value::Decimal(dec("150"))
    );
}

#[test]
fn datetime_parses_rfc3339_and_calendar_dates() {
    let ts = Value::from_json(&json!("2024-03-01T08:30:00Z"), &ScalarType::DateTime)
        .expect("timestamp");
    assert_eq!(ts.to_json(), json!("2024-03-01T08:30:00Z"));

    let date = Value::from_json(&json!("2024-03-01"), &ScalarType::DateTime).expect("date");
    assert_eq!(date.to_json(), json!("2024-03-01T00:00:00Z"));
}

#[test]
fn mismatched_operands_report_expected_type() {
    let err = Value::from_json(&json!("ten"), &ScalarType::Int).expect_err("text is not int");

    assert_eq!(err.expected, "Int");
    assert_eq!(err.found, "string");

    let err = Value::from_json(&json!(1.5), &ScalarType::Int).expect_err("fraction");
    assert_eq!(err.found, "number");
}

#[test]
fn list_conversion_rejects_null_elements() {
    let err = Value::from_json_list(&json!(["a", null]), &ScalarType::Text)
        .expect_err("null element");

    assert_eq!(err.found, "null");
}

#[test]
fn numeric_kinds_compare_across_representations() {
    assert_eq!(
        strict_order_cmp(&Value::Int(2), &Value::Decimal(dec("1.99"))),
        Some(Ordering::Greater)
    );
    assert_eq!(
        strict_order_cmp(&Value::Float(0.5), &Value::Decimal(dec("0.5"))),
        Some(Ordering::Equal)
    );
    assert!(values_equal(
        &Value::Int(3),
        &Value::Decimal(dec("3.00")),
        TextMode::Default
    ));
    assert_eq!(strict_order_cmp(&Value::Int(1), &Value::from("1")), None);
}

#[test]
fn insensitive_mode_folds_case() {
    let left = Value::from("Alice");
    let right = Value::from("aLiCe");

    assert!(!values_equal(&left, &right, TextMode::Default));
    assert!(values_equal(&left, &right, TextMode::Insensitive));
}

#[test]
fn canonical_order_places_null_first() {
    let mut values = vec![Value::Int(3), Value::Null, Value::Int(1)];
    values.sort_by(canonical_cmp);

    assert_eq!(values, vec![Value::Null, Value::Int(1), Value::Int(3)]);
}

#[test]
fn coerce_reads_backend_text_as_declared_type() {
    assert_eq!(
        Value::from("19.90").coerce_to(&ScalarType::Decimal),
        Some(Value::Decimal(dec("19.90")))
    );
    assert_eq!(
        Value::Int(7).coerce_to(&ScalarType::Float),
        Some(Value::Float(7.0))
    );
    assert_eq!(Value::from("x").coerce_to(&ScalarType::Int), None);
}
