use crate::{
    config::ClientConfig,
    db::query::{
        Operation, OperationKind, PlanContext, Planner, QueryPlan, ValidateError,
        args::{CountArgs, CreateManyArgs, FindManyArgs, FindUniqueArgs, IntoArgs},
        order::{Direction, NullsOrder, OrderTarget, OrderTerm, build_order},
        predicate::Predicate,
        unique::build_unique_where,
    },
    model::Schema,
    test_support::test_schema,
    value::Value,
};
use chrono::DateTime;
use serde_json::{Value as Json, json};

fn plan<A>(
    schema: &Schema,
    entity: &str,
    raw: Json,
    build: impl FnOnce(&Planner<'_>, &A) -> Result<QueryPlan, ValidateError>,
) -> Result<QueryPlan, ValidateError>
where
    Json: IntoArgs<A>,
{
    let config = ClientConfig::new();
    let planner = Planner::new(PlanContext::new(schema, &config), entity)?;
    let args = raw.into_args("test")?;

    build(&planner, &args)
}

//
// Unique where
//

#[test]
fn unique_where_prefers_the_primary_key() {
    let schema = test_schema();
    let entity = schema.entity("Employee").expect("entity");

    let target = build_unique_where(&schema, entity, &json!({ "id": 4, "email": "a@b.c" }))
        .expect("unique");
    assert_eq!(target.key.constraint, "id");
    assert_eq!(target.key.value("id"), Some(&Value::Int(4)));
    assert_eq!(target.filter, Predicate::eq("email", "a@b.c"));
}

#[test]
fn unique_where_accepts_equals_and_compound_selectors() {
    let schema = test_schema();
    let employee = schema.entity("Employee").expect("entity");
    let target = build_unique_where(&schema, employee, &json!({ "email": { "equals": "a@b.c" } }))
        .expect("equals");
    assert_eq!(target.key.constraint, "email");

    let attendance = schema.entity("Attendance").expect("entity");
    let target = build_unique_where(
        &schema,
        attendance,
        &json!({ "employeeId_date": { "employeeId": 1, "date": "2024-03-01" } }),
    )
    .expect("compound");
    assert_eq!(target.key.constraint, "employeeId_date");
    assert_eq!(
        target.key.value("date"),
        Some(&Value::DateTime(
            DateTime::parse_from_rfc3339("2024-03-01T00:00:00Z")
                .expect("date")
                .to_utc()
        ))
    );
}

#[test]
fn non_unique_where_lists_the_candidates() {
    let schema = test_schema();
    let entity = schema.entity("Employee").expect("entity");

    let err = build_unique_where(&schema, entity, &json!({ "name": "Ada" })).expect_err("name");
    let ValidateError::NotUnique { detail, .. } = err else {
        panic!("expected NotUnique, got {err:?}");
    };
    assert_eq!(detail, "expected one of: id, employeeCode, email");
}

#[test]
fn incomplete_compound_selector_is_not_unique() {
    let schema = test_schema();
    let entity = schema.entity("Attendance").expect("entity");

    let err = build_unique_where(
        &schema,
        entity,
        &json!({ "employeeId_date": { "employeeId": 1 } }),
    )
    .expect_err("incomplete");
    assert!(matches!(err, ValidateError::NotUnique { .. }));
}

#[test]
fn range_operators_do_not_identify_a_row() {
    let schema = test_schema();
    let entity = schema.entity("Employee").expect("entity");

    let err = build_unique_where(&schema, entity, &json!({ "id": { "gt": 3 } })).expect_err("range");
    assert!(matches!(err, ValidateError::NotUnique { .. }));
}

//
// Order
//

#[test]
fn order_through_to_one_relations() {
    let schema = test_schema();
    let entity = schema.entity("Attendance").expect("entity");

    let terms = build_order(
        &schema,
        entity,
        &json!([{ "employee": { "department": { "name": "asc" } } }, { "date": "desc" }]),
        false,
    )
    .expect("order");

    assert_eq!(
        terms[0].target,
        OrderTarget::Relation {
            path: vec!["employee".to_string(), "department".to_string()],
            field: "name".to_string(),
        }
    );
    assert_eq!(terms[1], OrderTerm::field("date", Direction::Desc));
}

#[test]
fn order_nulls_requires_nullable_field() {
    let schema = test_schema();
    let entity = schema.entity("Employee").expect("entity");

    let terms = build_order(
        &schema,
        entity,
        &json!({ "age": { "sort": "asc", "nulls": "last" } }),
        false,
    )
    .expect("nullable");
    assert_eq!(terms[0].nulls, Some(NullsOrder::Last));

    let err = build_order(
        &schema,
        entity,
        &json!({ "name": { "sort": "asc", "nulls": "first" } }),
        false,
    )
    .expect_err("required");
    assert!(matches!(err, ValidateError::InvalidOrderBy { .. }));
}

#[test]
fn to_many_relations_order_by_count_only() {
    let schema = test_schema();
    let entity = schema.entity("Employee").expect("entity");

    let terms = build_order(&schema, entity, &json!({ "attendance": { "_count": "desc" } }), false)
        .expect("count order");
    assert_eq!(terms[0].target, OrderTarget::RelationCount("attendance".to_string()));

    let err = build_order(&schema, entity, &json!({ "attendance": { "hours": "asc" } }), false)
        .expect_err("field through to-many");
    assert!(matches!(err, ValidateError::InvalidOrderBy { .. }));
}

#[test]
fn order_objects_take_exactly_one_key() {
    let schema = test_schema();
    let entity = schema.entity("Employee").expect("entity");

    let err = build_order(&schema, entity, &json!({ "name": "asc", "age": "desc" }), false)
        .expect_err("two keys");
    assert!(matches!(err, ValidateError::InvalidOrderBy { .. }));
}

//
// Planner
//

#[test]
fn unknown_entity_is_rejected() {
    let schema = test_schema();
    let config = ClientConfig::new();

    let err = Planner::new(PlanContext::new(&schema, &config), "Invoice")
        .err()
        .expect("unknown entity");
    assert_eq!(err, ValidateError::UnknownEntity("Invoice".to_string()));
}

#[test]
fn unknown_argument_keys_are_malformed() {
    let schema = test_schema();
    let err = plan(&schema, "Employee", json!({ "limit": 3 }), |p, a: &FindManyArgs| {
        p.find_many(a)
    })
    .expect_err("unknown argument");

    assert!(matches!(err, ValidateError::MalformedArguments { .. }));
}

#[test]
fn find_unique_plans_the_unique_target() {
    let schema = test_schema();
    let plan = plan(
        &schema,
        "Employee",
        json!({ "where": { "employeeCode": "E-1" }, "select": { "id": true } }),
        |p, a: &FindUniqueArgs| p.find_unique(a),
    )
    .expect("plan");

    assert_eq!(plan.kind(), OperationKind::FindUnique);
    let Operation::FindUnique { target, selection } = plan.operation else {
        panic!("expected findUnique");
    };
    assert_eq!(target.key.constraint, "employeeCode");
    assert_eq!(selection.fields, ["id"]);
}

#[test]
fn find_many_cursor_defaults_to_primary_key_order() {
    let schema = test_schema();
    let plan = plan(
        &schema,
        "Employee",
        json!({ "cursor": { "id": 3 }, "take": 2 }),
        |p, a: &FindManyArgs| p.find_many(a),
    )
    .expect("plan");

    let Operation::FindMany(read) = plan.operation else {
        panic!("expected findMany");
    };
    assert_eq!(read.scope.order, vec![OrderTerm::field("id", Direction::Asc)]);
    assert_eq!(read.scope.take, Some(2));
}

#[test]
fn find_first_cursor_requires_order_by() {
    let schema = test_schema();
    let err = plan(
        &schema,
        "Employee",
        json!({ "cursor": { "id": 3 } }),
        |p, a: &FindManyArgs| p.find_first(a),
    )
    .expect_err("cursor without order");

    assert!(matches!(err, ValidateError::CursorWithoutOrder { .. }));
}

#[test]
fn find_first_takes_one_row() {
    let schema = test_schema();
    let plan = plan(
        &schema,
        "Employee",
        json!({ "take": -5, "orderBy": { "id": "asc" } }),
        |p, a: &FindManyArgs| p.find_first(a),
    )
    .expect("plan");

    let Operation::FindFirst(read) = plan.operation else {
        panic!("expected findFirst");
    };
    assert_eq!(read.scope.take, Some(-1));
}

#[test]
fn create_many_rejects_nested_writes() {
    let schema = test_schema();
    let err = plan(
        &schema,
        "Department",
        json!({ "data": [{ "name": "R&D", "employees": { "connect": { "id": 1 } } }] }),
        |p, a: &CreateManyArgs| p.create_many(a),
    )
    .expect_err("nested write");

    assert!(matches!(err, ValidateError::NestedWriteInBatch { .. }));
}

#[test]
fn count_select_lists_requested_keys() {
    let schema = test_schema();
    let plan = plan(
        &schema,
        "Employee",
        json!({ "select": { "_all": true, "age": true, "rating": false } }),
        |p, a: &CountArgs| p.count(a),
    )
    .expect("plan");

    let Operation::Count { fields, .. } = plan.operation else {
        panic!("expected count");
    };
    assert_eq!(fields, Some(vec!["_all".to_string(), "age".to_string()]));
}

#[test]
fn distinct_accepts_scalar_fields_only() {
    let schema = test_schema();
    let err = plan(
        &schema,
        "Employee",
        json!({ "distinct": ["tags"] }),
        |p, a: &FindManyArgs| p.find_many(a),
    )
    .expect_err("list distinct");

    assert!(matches!(err, ValidateError::ExpectedShape { .. }));
}
