use crate::{
    db::query::{
        ValidateError,
        write::{CreateData, FieldUpdate, RelationOp, UpdateData, WriteBuilder},
    },
    model::Schema,
    test_support::test_schema,
    value::Value,
};
use rust_decimal::Decimal;
use serde_json::{Value as Json, json};

fn create(schema: &Schema, entity: &str, raw: Json) -> Result<CreateData, ValidateError> {
    let model = schema.entity(entity).expect("entity");
    WriteBuilder::new(schema).create(model, &raw)
}

fn update(schema: &Schema, entity: &str, raw: Json) -> Result<UpdateData, ValidateError> {
    let model = schema.entity(entity).expect("entity");
    WriteBuilder::new(schema).update(model, &raw)
}

fn employee() -> Json {
    json!({
        "employeeCode": "E-1",
        "email": "e1@example.com",
        "name": "Ada",
        "password": "secret",
        "salary": "1200.50",
    })
}

//
// Create
//

#[test]
fn create_values_follow_schema_order() {
    let schema = test_schema();
    let data = create(&schema, "Employee", employee()).expect("create");

    let names: Vec<&str> = data.values.iter().map(|(f, _)| f.as_str()).collect();
    assert_eq!(names, ["employeeCode", "email", "name", "password", "salary"]);
    assert_eq!(
        data.value("salary"),
        Some(&Value::Decimal(Decimal::new(120_050, 2)))
    );
    assert!(!data.has_nested_writes());
}

#[test]
fn missing_required_scalar_is_reported() {
    let schema = test_schema();
    let mut raw = employee();
    raw.as_object_mut().expect("object").remove("email");

    let err = create(&schema, "Employee", raw).expect_err("missing email");
    assert!(matches!(
        err,
        ValidateError::MissingRequired { ref field, kind: "field", .. } if field == "email"
    ));
}

#[test]
fn missing_required_relation_names_the_relation() {
    let schema = test_schema();
    let err = create(
        &schema,
        "Attendance",
        json!({ "date": "2024-03-01T00:00:00Z", "hours": 8 }),
    )
    .expect_err("missing employee");

    assert!(matches!(
        err,
        ValidateError::MissingRequired { ref field, kind: "relation", .. } if field == "employee"
    ));
}

#[test]
fn connect_satisfies_a_required_relation() {
    let schema = test_schema();
    let data = create(
        &schema,
        "Attendance",
        json!({
            "date": "2024-03-01T00:00:00Z",
            "hours": 8,
            "employee": { "connect": { "employeeCode": "E-1" } },
        }),
    )
    .expect("create");

    assert_eq!(data.relations.len(), 1);
    let RelationOp::Connect(target) = &data.relations[0].ops[0] else {
        panic!("expected connect");
    };
    assert_eq!(target.key.constraint, "employeeCode");
}

#[test]
fn raw_foreign_key_satisfies_a_required_relation() {
    let schema = test_schema();
    create(
        &schema,
        "Attendance",
        json!({ "employeeId": 1, "date": "2024-03-01T00:00:00Z", "hours": 8 }),
    )
    .expect("raw foreign key");
}

#[test]
fn relation_write_and_foreign_key_conflict() {
    let schema = test_schema();
    let err = create(
        &schema,
        "Attendance",
        json!({
            "employeeId": 1,
            "date": "2024-03-01T00:00:00Z",
            "hours": 8,
            "employee": { "connect": { "id": 1 } },
        }),
    )
    .expect_err("both set");

    assert!(matches!(
        err,
        ValidateError::RelationAndForeignKey { ref relation, ref field, .. }
            if relation == "employee" && field == "employeeId"
    ));
}

#[test]
fn nested_create_through_inverse_relation_implies_the_foreign_key() {
    let schema = test_schema();
    let mut raw = employee();
    raw["attendance"] = json!({
        "create": [
            { "date": "2024-03-01T00:00:00Z", "hours": 8 },
            { "date": "2024-03-02T00:00:00Z", "hours": "7.5" },
        ]
    });

    let data = create(&schema, "Employee", raw).expect("nested create");
    assert_eq!(data.relations[0].ops.len(), 2);
    assert!(matches!(data.relations[0].ops[0], RelationOp::Create(_)));
}

#[test]
fn nested_create_cannot_set_the_implied_foreign_key() {
    let schema = test_schema();
    let mut raw = employee();
    raw["profile"] = json!({ "create": { "employeeId": 9, "bio": "hi" } });

    let err = create(&schema, "Employee", raw).expect_err("implied key set");
    assert!(matches!(err, ValidateError::InvalidRelationWrite { .. }));
}

#[test]
fn batch_rows_reject_relation_keys() {
    let schema = test_schema();
    let model = schema.entity("Employee").expect("entity");
    let mut raw = employee();
    raw["department"] = json!({ "connect": { "id": 1 } });

    let err = WriteBuilder::flat(&schema)
        .create(model, &raw)
        .expect_err("nested in batch");
    assert!(matches!(err, ValidateError::NestedWriteInBatch { .. }));
}

#[test]
fn disconnect_is_rejected_in_create() {
    let schema = test_schema();
    let mut raw = employee();
    raw["department"] = json!({ "disconnect": true });

    let err = create(&schema, "Employee", raw).expect_err("disconnect in create");
    assert!(matches!(err, ValidateError::InvalidRelationWrite { .. }));
}

#[test]
fn list_fields_accept_set_wrapper() {
    let schema = test_schema();
    let mut raw = employee();
    raw["tags"] = json!({ "set": ["rust", "sql"] });

    let data = create(&schema, "Employee", raw).expect("create");
    assert_eq!(
        data.value("tags"),
        Some(&Value::List(vec![Value::from("rust"), Value::from("sql")]))
    );
}

#[test]
fn unknown_enum_variant_is_a_type_mismatch() {
    let schema = test_schema();
    let mut raw = employee();
    raw["status"] = json!("retired");

    let err = create(&schema, "Employee", raw).expect_err("bad variant");
    assert!(err.is_type_error());
}

#[test]
fn unknown_keys_are_rejected() {
    let schema = test_schema();
    let mut raw = employee();
    raw["nickname"] = json!("A");

    let err = create(&schema, "Employee", raw).expect_err("unknown");
    assert!(matches!(err, ValidateError::UnknownField { ref field, .. } if field == "nickname"));
}

//
// Update
//

#[test]
fn update_accepts_values_and_operations() {
    let schema = test_schema();
    let data = update(
        &schema,
        "Employee",
        json!({
            "name": "Grace",
            "salary": { "increment": "100" },
            "age": { "set": null },
            "tags": { "push": "lead" },
        }),
    )
    .expect("update");

    assert_eq!(
        data.values,
        vec![
            ("name".to_string(), FieldUpdate::Set(Value::from("Grace"))),
            (
                "salary".to_string(),
                FieldUpdate::Increment(Value::Decimal(Decimal::new(100, 0)))
            ),
            ("age".to_string(), FieldUpdate::Set(Value::Null)),
            ("tags".to_string(), FieldUpdate::Push(Value::from("lead"))),
        ]
    );
}

#[test]
fn arithmetic_requires_numeric_fields() {
    let schema = test_schema();
    let err = update(&schema, "Employee", json!({ "name": { "increment": 1 } }))
        .expect_err("increment text");

    assert!(matches!(
        err,
        ValidateError::InvalidAtomicOperation { ref operation, .. } if operation == "increment"
    ));
}

#[test]
fn push_requires_list_fields() {
    let schema = test_schema();
    let err = update(&schema, "Employee", json!({ "name": { "push": "x" } })).expect_err("push");

    assert!(matches!(err, ValidateError::InvalidAtomicOperation { .. }));
}

#[test]
fn update_cannot_null_a_required_field() {
    let schema = test_schema();
    let err = update(&schema, "Employee", json!({ "name": null })).expect_err("null name");

    assert!(err.is_type_error());
}

#[test]
fn disconnect_requires_an_optional_relation() {
    let schema = test_schema();

    let data = update(&schema, "Employee", json!({ "department": { "disconnect": true } }))
        .expect("optional relation");
    assert_eq!(data.relations[0].ops, vec![RelationOp::Disconnect(None)]);

    let err = update(
        &schema,
        "Employee",
        json!({ "attendance": { "disconnect": { "id": 3 } } }),
    )
    .expect_err("attendance requires an employee");
    assert!(matches!(err, ValidateError::InvalidRelationWrite { .. }));
}

#[test]
fn bulk_updates_reject_relation_writes() {
    let schema = test_schema();
    let model = schema.entity("Employee").expect("entity");

    let err = WriteBuilder::flat(&schema)
        .update(model, &json!({ "department": { "connect": { "id": 1 } } }))
        .expect_err("relation in bulk");
    assert!(matches!(err, ValidateError::InvalidRelationWrite { .. }));
}
