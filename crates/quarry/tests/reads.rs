//! Selection, pagination and decoding through the public client.

use quarry::prelude::*;
use quarry_testing_hr_fixtures::{Department, Employee, hr_schema, memory_client, seed};
use std::{collections::BTreeSet, sync::Arc};

fn codes(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.value("employeeCode").and_then(Value::as_text).unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn paging_by_cursor_walks_every_row_once() {
    let client = memory_client();
    seed(&client).await;
    let employees = client.entity("Employee").unwrap();

    let all = employees
        .find_many(json!({ "orderBy": [{ "salary": "desc" }, { "id": "asc" }] }))
        .await
        .unwrap();
    assert_eq!(all.len(), 10);

    let mut seen = Vec::new();
    let mut cursor: Option<i64> = None;
    loop {
        let mut args = json!({ "orderBy": [{ "salary": "desc" }, { "id": "asc" }], "take": 3 });
        if let Some(id) = cursor {
            args["cursor"] = json!({ "id": id });
            args["skip"] = json!(1);
        }
        let page = employees.find_many(args).await.unwrap();
        if page.is_empty() {
            break;
        }
        cursor = page.last().and_then(|r| r.value("id")).and_then(Value::as_i64);
        seen.extend(page);
    }

    assert_eq!(codes(&seen), codes(&all));
}

#[tokio::test]
async fn skip_take_pages_are_stable() {
    let client = memory_client();
    seed(&client).await;
    let employees = client.entity("Employee").unwrap();
    let page = |skip: u64| {
        json!({ "orderBy": { "employeeCode": "asc" }, "skip": skip, "take": 4 })
    };

    let first = employees.find_many(page(0)).await.unwrap();
    let again = employees.find_many(page(0)).await.unwrap();
    let second = employees.find_many(page(4)).await.unwrap();

    assert_eq!(codes(&first), codes(&again));
    assert_eq!(codes(&first), ["E-001", "E-002", "E-003", "E-004"]);
    assert_eq!(codes(&second), ["E-005", "E-006", "E-007", "E-008"]);
}

#[tokio::test]
async fn negative_take_reads_backwards() {
    let client = memory_client();
    seed(&client).await;
    let employees = client.entity("Employee").unwrap();

    let last = employees
        .find_many(json!({ "orderBy": { "employeeCode": "asc" }, "take": -2 }))
        .await
        .unwrap();

    assert_eq!(codes(&last), ["E-009", "E-010"]);
}

#[tokio::test]
async fn find_unique_returns_at_most_one_row() {
    let client = memory_client();
    seed(&client).await;
    let employees = client.entity("Employee").unwrap();

    let by_code = employees
        .find_unique(json!({ "where": { "employeeCode": "E-005" } }))
        .await
        .unwrap()
        .unwrap();
    let by_email = employees
        .find_unique(json!({ "where": { "email": "e-005@example.com" } }))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_code, by_email);

    // A unique key with an extra filter that excludes the row.
    let filtered = employees
        .find_unique(json!({ "where": { "employeeCode": "E-005", "status": "inactive" } }))
        .await
        .unwrap();
    assert!(filtered.is_none());

    let err = employees
        .find_unique(json!({ "where": { "firstName": "Test" } }))
        .await
        .expect_err("not a unique key");
    assert_eq!(err.code(), "NotUnique");
}

#[tokio::test]
async fn selection_returns_exactly_the_selected_keys() {
    let schema = hr_schema();
    let client = memory_client();
    seed(&client).await;

    for entity in schema.entities() {
        let delegate = client.entity(&entity.name).unwrap();

        // Primary key plus the first relation, when there is one.
        let mut select = serde_json::Map::new();
        select.insert(entity.primary_key[0].clone(), json!(true));
        if let Some(relation) = entity.relations.first() {
            select.insert(relation.name.clone(), json!(true));
        }
        let expected: BTreeSet<&str> = select.keys().map(String::as_str).collect();

        let records = delegate
            .find_many(json!({ "select": select.clone() }))
            .await
            .unwrap();
        for record in &records {
            let keys: BTreeSet<&str> = record.keys().collect();
            assert_eq!(keys, expected, "{}", entity.name);
        }
    }
}

#[tokio::test]
async fn default_selection_is_every_scalar_field() {
    let schema = hr_schema();
    let client = memory_client();
    let seeded = seed(&client).await;

    let department = client
        .entity("Department")
        .unwrap()
        .find_unique(json!({ "where": { "id": seeded.engineering } }))
        .await
        .unwrap()
        .unwrap();

    let model = schema.entity("Department").unwrap();
    let expected: Vec<&str> = model.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(department.keys().collect::<Vec<_>>(), expected);
}

#[tokio::test]
async fn include_loads_relations_and_counts() {
    let client = memory_client();
    let seeded = seed(&client).await;

    let departments = client
        .entity("Department")
        .unwrap()
        .find_many(json!({
            "orderBy": { "name": "asc" },
            "include": {
                "employees": {
                    "where": { "status": "active" },
                    "orderBy": { "salary": "desc" },
                    "take": 1,
                },
                "_count": { "select": { "employees": true } },
            },
        }))
        .await
        .unwrap();

    let engineering = departments
        .iter()
        .find(|d| d.value("id").and_then(Value::as_i64) == Some(seeded.engineering))
        .unwrap();
    let top = engineering.many("employees").unwrap();
    assert_eq!(codes(top), ["E-001"]);

    let counts = engineering.one("_count").unwrap();
    assert_eq!(counts.value("employees"), Some(&Value::Int(4)));
}

#[tokio::test]
async fn relation_filters_apply_quantifiers() {
    let client = memory_client();
    seed(&client).await;
    let departments = client.entity("Department").unwrap();

    let every_active = departments
        .find_many(json!({ "where": { "employees": { "every": { "status": "active" } } } }))
        .await
        .unwrap();
    assert!(every_active.is_empty());

    let rich = departments
        .find_many(json!({
            "where": { "employees": { "some": { "salary": { "gte": 8000 } } } },
        }))
        .await
        .unwrap();
    assert_eq!(rich.len(), 1);
    assert_eq!(rich[0].value("code"), Some(&Value::Text("ENG".into())));

    let unassigned = client
        .entity("Employee")
        .unwrap()
        .find_many(json!({ "where": { "department": { "is": null } } }))
        .await
        .unwrap();
    assert_eq!(codes(&unassigned), ["E-010"]);
}

#[tokio::test]
async fn typed_delegates_decode_rows() {
    let client = memory_client();
    let seeded = seed(&client).await;

    let staff = client
        .typed::<Employee>()
        .unwrap()
        .find_many(json!({
            "where": { "departmentId": seeded.sales },
            "orderBy": { "employeeCode": "asc" },
        }))
        .await
        .unwrap();
    assert_eq!(staff.len(), 3);
    assert_eq!(staff[0].employee_code, "E-005");
    assert_eq!(staff[0].salary, Decimal::from(5000));
    assert_eq!(staff[1].status, "inactive");

    let departments = client.typed::<Department>().unwrap();
    let ops = departments
        .find_unique(json!({ "where": { "code": "OPS" } }))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ops.budget, None);

    // Deref reaches the untyped surface.
    assert_eq!(departments.count(json!({})).await.unwrap().total(), Some(3));
}

#[tokio::test]
async fn decode_failures_are_type_errors() {
    let client = memory_client();
    seed(&client).await;

    let err = client
        .typed::<Employee>()
        .unwrap()
        .find_first(json!({ "select": { "id": true } }))
        .await
        .expect_err("missing fields");

    assert_eq!(err.class(), ErrorClass::Type);
}

#[tokio::test]
async fn omit_policy_hides_fields_unless_overridden() {
    let schema = hr_schema();
    let config = ClientConfig::new().omit("User", "passwordHash");
    let client = Client::builder(Arc::clone(&schema))
        .config(config)
        .backend(Arc::new(MemoryBackend::new(schema)))
        .build()
        .unwrap();
    let users = client.entity("User").unwrap();

    let user = users
        .create(json!({ "data": { "email": "root@example.com", "passwordHash": "x" } }))
        .await
        .unwrap();
    assert!(user.get("passwordHash").is_none());
    assert!(user.get("email").is_some());

    let err = users
        .find_many(json!({ "omit": { "passwordHash": false } }))
        .await
        .expect_err("overrides are disabled");
    assert_eq!(err.code(), "OmitPolicy");
}
