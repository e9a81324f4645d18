use crate::{
    db::query::{
        ValidateError,
        predicate::{
            CompareOp, ComparePredicate, MAX_IN_LIST, Predicate, Quantifier, RelationPredicate,
            build_predicate, render_filter,
        },
    },
    test_support::test_schema,
    value::{TextMode, Value},
};
use chrono::DateTime;
use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::{Value as Json, json};

fn build(raw: Json) -> Result<Predicate, ValidateError> {
    build_predicate(&test_schema(), "Employee", &raw)
}

fn cmp(field: &str, op: CompareOp, value: Value) -> Predicate {
    Predicate::Compare(ComparePredicate {
        field: field.to_string(),
        op,
        value,
        mode: TextMode::Default,
    })
}

fn rel(relation: &str, quantifier: Quantifier, predicate: Predicate) -> Predicate {
    Predicate::Relation(RelationPredicate {
        relation: relation.to_string(),
        quantifier,
        predicate: Box::new(predicate),
    })
}

//
// Shapes
//

#[test]
fn bare_values_mean_equals() {
    let predicate = build(json!({ "employeeCode": "E-100" })).expect("filter");

    assert_eq!(predicate, cmp("employeeCode", CompareOp::Eq, Value::from("E-100")));
}

#[test]
fn multiple_keys_combine_with_and() {
    let predicate = build(json!({ "active": true, "age": { "gte": 18, "lt": 65 } })).expect("filter");

    assert_eq!(
        predicate,
        Predicate::And(vec![
            cmp("active", CompareOp::Eq, Value::Bool(true)),
            Predicate::And(vec![
                cmp("age", CompareOp::Gte, Value::Int(18)),
                cmp("age", CompareOp::Lt, Value::Int(65)),
            ]),
        ])
    );
}

#[test]
fn null_on_nullable_field_means_is_null() {
    assert_eq!(
        build(json!({ "age": null })).expect("bare null"),
        Predicate::IsNull { field: "age".to_string() }
    );
    assert_eq!(
        build(json!({ "age": { "not": null } })).expect("not null"),
        Predicate::IsNotNull { field: "age".to_string() }
    );
}

#[test]
fn null_on_required_field_is_a_type_mismatch() {
    let err = build(json!({ "name": null })).expect_err("required field");

    assert!(matches!(err, ValidateError::TypeMismatch { ref field, .. } if field == "name"));
}

#[test]
fn empty_combinators_have_fixed_meaning() {
    assert_eq!(build(json!({ "AND": [] })).expect("and"), Predicate::True);
    assert_eq!(build(json!({ "OR": [] })).expect("or"), Predicate::False);
    assert_eq!(build(json!({ "NOT": [] })).expect("not"), Predicate::True);
    assert_eq!(build(json!({})).expect("empty"), Predicate::True);
}

#[test]
fn combinators_accept_a_single_child() {
    let single = build(json!({ "AND": { "name": "Ada" } })).expect("single and");
    assert_eq!(single, cmp("name", CompareOp::Eq, Value::from("Ada")));

    let negated = build(json!({ "NOT": [{ "name": "Ada" }, { "age": 3 }] })).expect("not list");
    assert_eq!(
        negated,
        Predicate::And(vec![
            Predicate::Not(Box::new(cmp("name", CompareOp::Eq, Value::from("Ada")))),
            Predicate::Not(Box::new(cmp("age", CompareOp::Eq, Value::Int(3)))),
        ])
    );
}

#[test]
fn not_accepts_a_nested_operator_object() {
    let predicate = build(json!({ "age": { "not": { "in": [1, 2] } } })).expect("filter");

    assert_eq!(
        predicate,
        Predicate::Not(Box::new(cmp(
            "age",
            CompareOp::In,
            Value::List(vec![Value::Int(1), Value::Int(2)])
        )))
    );
}

#[test]
fn insensitive_mode_applies_to_text_operators() {
    let predicate =
        build(json!({ "name": { "startsWith": "ad", "mode": "insensitive" } })).expect("filter");

    assert_eq!(
        predicate,
        Predicate::Compare(ComparePredicate {
            field: "name".to_string(),
            op: CompareOp::StartsWith,
            value: Value::from("ad"),
            mode: TextMode::Insensitive,
        })
    );
}

#[test]
fn list_fields_support_element_operators() {
    assert_eq!(
        build(json!({ "tags": { "has": "remote" } })).expect("has"),
        cmp("tags", CompareOp::Has, Value::from("remote"))
    );
    assert_eq!(
        build(json!({ "tags": { "isEmpty": false } })).expect("isEmpty"),
        Predicate::Not(Box::new(Predicate::IsEmpty { field: "tags".to_string() }))
    );
}

//
// Relations
//

#[test]
fn to_one_relation_accepts_bare_filter_and_null() {
    let bare = build(json!({ "department": { "name": "Ops" } })).expect("bare");
    assert_eq!(
        bare,
        rel("department", Quantifier::Is, cmp("name", CompareOp::Eq, Value::from("Ops")))
    );

    let absent = build(json!({ "department": null })).expect("null");
    assert_eq!(absent, rel("department", Quantifier::IsNot, Predicate::True));

    let is_null = build(json!({ "department": { "is": null } })).expect("is null");
    assert_eq!(is_null, absent);
}

#[test]
fn to_many_relation_requires_a_quantifier() {
    let some = build(json!({ "attendance": { "some": { "note": null } } })).expect("some");
    assert_eq!(
        some,
        rel("attendance", Quantifier::Some, Predicate::IsNull { field: "note".to_string() })
    );

    let err = build(json!({ "attendance": { "note": null } })).expect_err("bare filter");
    assert!(matches!(err, ValidateError::ExpectedShape { .. }));
}

#[test]
fn relation_filters_validate_against_the_target_entity() {
    let err = build(json!({ "department": { "is": { "salary": 3 } } })).expect_err("wrong entity");

    assert!(matches!(
        err,
        ValidateError::UnknownField { ref entity, ref field } if entity == "Department" && field == "salary"
    ));
}

//
// Errors
//

#[test]
fn unknown_keys_are_named() {
    let err = build(json!({ "salry": 5 })).expect_err("typo");

    assert_eq!(
        err,
        ValidateError::UnknownField {
            entity: "Employee".to_string(),
            field: "salry".to_string(),
        }
    );

    let err = build(json!({ "salary": { "greater": 5 } })).expect_err("unknown operator");
    assert!(matches!(err, ValidateError::UnknownField { ref field, .. } if field == "salary.greater"));
}

#[test]
fn inapplicable_operators_are_type_errors() {
    for raw in [
        json!({ "active": { "lt": true } }),
        json!({ "age": { "contains": "4" } }),
        json!({ "age": { "mode": "insensitive", "equals": 4 } }),
        json!({ "name": { "has": "x" } }),
        json!({ "tags": { "gt": "x" } }),
    ] {
        let err = build(raw.clone()).expect_err("inapplicable operator");
        assert!(err.is_type_error(), "{raw} should be a type error, got {err:?}");
    }
}

#[test]
fn operands_must_match_the_field_type() {
    let err = build(json!({ "salary": { "gt": true } })).expect_err("boolean decimal");
    assert!(matches!(
        err,
        ValidateError::TypeMismatch { ref expected, ref found, .. } if expected == "Decimal" && found == "boolean"
    ));

    let err = build(json!({ "status": "retired" })).expect_err("unknown variant");
    assert!(matches!(err, ValidateError::TypeMismatch { ref expected, .. } if expected == "EmployeeStatus"));
}

#[test]
fn oversized_in_lists_are_rejected() {
    let values: Vec<i64> = (0..=i64::try_from(MAX_IN_LIST).expect("fits")).collect();
    let err = build(json!({ "age": { "in": values } })).expect_err("too many");

    assert!(matches!(err, ValidateError::InListTooLarge { .. }));
}

#[test]
fn deeply_nested_filters_are_rejected() {
    let mut raw = json!({ "name": "x" });
    for _ in 0..80 {
        raw = json!({ "NOT": raw });
    }

    let err = build(raw).expect_err("too deep");
    assert!(matches!(err, ValidateError::PredicateTooDeep { .. }));
}

//
// Rendering
//

#[test]
fn render_uses_canonical_operator_objects() {
    let predicate = Predicate::And(vec![
        Predicate::IsNull { field: "age".to_string() },
        rel("department", Quantifier::IsNot, Predicate::True),
        Predicate::False,
    ]);

    assert_eq!(
        render_filter(&predicate),
        json!({ "AND": [
            { "age": { "equals": null } },
            { "department": { "isNot": {} } },
            { "OR": [] }
        ]})
    );
}

//
// Round trip
//

fn arb_text() -> impl Strategy<Value = String> {
    "[a-z]{0,6}"
}

fn arb_mode() -> impl Strategy<Value = TextMode> {
    prop_oneof![Just(TextMode::Default), Just(TextMode::Insensitive)]
}

fn arb_text_leaf() -> impl Strategy<Value = Predicate> {
    (
        prop_oneof![
            Just(CompareOp::Eq),
            Just(CompareOp::Ne),
            Just(CompareOp::Lt),
            Just(CompareOp::Gte),
            Just(CompareOp::Contains),
            Just(CompareOp::StartsWith),
            Just(CompareOp::EndsWith),
        ],
        arb_text(),
        arb_mode(),
    )
        .prop_map(|(op, text, mode)| {
            Predicate::Compare(ComparePredicate {
                field: "name".to_string(),
                op,
                value: Value::Text(text),
                mode,
            })
        })
}

fn arb_scalar_leaf() -> impl Strategy<Value = Predicate> {
    prop_oneof![
        arb_text_leaf(),
        (
            prop_oneof![
                Just(CompareOp::Eq),
                Just(CompareOp::Ne),
                Just(CompareOp::Lt),
                Just(CompareOp::Lte),
                Just(CompareOp::Gt),
                Just(CompareOp::Gte),
            ],
            any::<i32>()
        )
            .prop_map(|(op, n)| cmp("age", op, Value::Int(i64::from(n)))),
        prop::collection::vec(any::<i32>(), 1..4).prop_map(|items| cmp(
            "age",
            CompareOp::NotIn,
            Value::List(items.into_iter().map(Value::from).collect())
        )),
        Just(Predicate::IsNull { field: "age".to_string() }),
        Just(Predicate::IsNotNull { field: "departmentId".to_string() }),
        (any::<i64>(), 0u32..4).prop_map(|(n, scale)| cmp(
            "salary",
            CompareOp::Gt,
            Value::Decimal(Decimal::new(n, scale))
        )),
        prop_oneof![Just("active"), Just("inactive"), Just("deleted")]
            .prop_map(|s| cmp("status", CompareOp::Eq, Value::Enum(s.to_string()))),
        any::<bool>().prop_map(|b| cmp("active", CompareOp::Eq, Value::Bool(b))),
        arb_text().prop_map(|t| cmp("tags", CompareOp::Has, Value::Text(t))),
        prop::collection::vec(arb_text(), 0..3).prop_map(|items| cmp(
            "tags",
            CompareOp::HasSome,
            Value::List(items.into_iter().map(Value::Text).collect())
        )),
        Just(Predicate::IsEmpty { field: "tags".to_string() }),
    ]
}

fn arb_employee_leaf() -> impl Strategy<Value = Predicate> {
    prop_oneof![
        arb_scalar_leaf(),
        (0i64..4_000_000_000).prop_map(|secs| cmp(
            "hiredAt",
            CompareOp::Gte,
            DateTime::from_timestamp(secs, 0).map_or(Value::Null, Value::DateTime)
        )),
        (
            prop_oneof![Just(Quantifier::Is), Just(Quantifier::IsNot)],
            prop_oneof![
                Just(Predicate::True),
                arb_text().prop_map(|t| cmp("name", CompareOp::Eq, Value::Text(t))),
            ]
        )
            .prop_map(|(q, inner)| rel("department", q, inner)),
        (
            prop_oneof![
                Just(Quantifier::Some),
                Just(Quantifier::Every),
                Just(Quantifier::None)
            ],
            prop_oneof![
                Just(Predicate::True),
                (0i64..10_000).prop_map(|n| cmp("hours", CompareOp::Lte, Value::Decimal(Decimal::new(n, 1)))),
                Just(Predicate::IsNotNull { field: "note".to_string() }),
            ]
        )
            .prop_map(|(q, inner)| rel("attendance", q, inner)),
    ]
}

fn arb_predicate() -> impl Strategy<Value = Predicate> {
    arb_employee_leaf().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Predicate::And),
            prop::collection::vec(inner.clone(), 1..4).prop_map(Predicate::Or),
            inner.prop_map(|p| Predicate::Not(Box::new(p))),
        ]
    })
}

proptest! {
    #[test]
    fn render_then_build_round_trips(predicate in arb_predicate()) {
        let rendered = render_filter(&predicate);
        let rebuilt = build(rendered.clone());

        prop_assert_eq!(rebuilt, Ok(predicate), "rendered as {}", rendered);
    }

    #[test]
    fn rebuilding_is_idempotent(predicate in arb_predicate()) {
        let once = build(render_filter(&predicate)).expect("canonical filter");
        let twice = build(render_filter(&once)).expect("canonical filter");

        prop_assert_eq!(once, twice);
    }
}
