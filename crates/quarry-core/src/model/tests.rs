use crate::{
    error::ConfigError,
    model::{
        EntityModel, EnumModel, FieldModel, ReferentialAction, RelationModel, ScalarType, Schema,
        UniqueModel,
    },
    test_support::test_schema,
};
use serde_json::json;

fn person() -> EntityModel {
    EntityModel::new("Person")
        .with_field(FieldModel::new("id", ScalarType::Int))
        .with_primary_key(&["id"])
}

#[test]
fn describe_lists_entities_in_declaration_order() {
    let schema = test_schema();
    let description = schema.describe();

    let names: Vec<_> = description.entities.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["Department", "Employee", "Attendance", "Profile"]);
    assert_eq!(description.enums.len(), 1);
}

#[test]
fn unique_sets_start_with_primary_key() {
    let schema = test_schema();
    let attendance = schema.entity("Attendance").expect("entity");

    let sets = attendance.unique_sets();
    assert_eq!(sets[0].fields, ["id"]);
    assert_eq!(sets[1].name, "employeeId_date");
    assert!(sets[1].is_compound());
    assert!(attendance.is_unique_set(&["date".to_string(), "employeeId".to_string()]));
    assert!(!attendance.is_unique_set(&["date".to_string()]));
}

#[test]
fn join_keys_resolve_both_sides_of_a_relation() {
    let schema = test_schema();
    let employee = schema.entity("Employee").expect("employee");
    let department = schema.entity("Department").expect("department");

    let owned = schema
        .join_keys(employee, employee.relation("department").expect("relation"))
        .expect("owned keys");
    assert_eq!(owned.local, ["departmentId"]);
    assert_eq!(owned.remote, ["id"]);

    let inverse = schema
        .join_keys(department, department.relation("employees").expect("relation"))
        .expect("inverse keys");
    assert_eq!(inverse.local, ["id"]);
    assert_eq!(inverse.remote, ["departmentId"]);
}

#[test]
fn back_references_find_owning_relations() {
    let schema = test_schema();

    let owners: Vec<_> = schema
        .back_references("Employee")
        .map(|(entity, rel)| format!("{}.{}", entity.name, rel.name))
        .collect();
    assert_eq!(owners, ["Attendance.employee", "Profile.employee"]);
}

#[test]
fn delete_action_defaults_follow_nullability() {
    let schema = test_schema();
    let employee = schema.entity("Employee").expect("employee");
    let attendance = schema.entity("Attendance").expect("attendance");

    assert_eq!(
        employee.relation("department").and_then(RelationModel::delete_action),
        Some(ReferentialAction::SetNull)
    );
    assert_eq!(
        attendance.relation("employee").and_then(RelationModel::delete_action),
        Some(ReferentialAction::Cascade)
    );
}

#[test]
fn empty_schema_is_rejected() {
    let err = Schema::builder().build().expect_err("no entities");

    assert!(matches!(err, ConfigError::EmptySchema));
}

#[test]
fn duplicate_members_are_rejected() {
    let err = Schema::builder()
        .entity(person().with_field(FieldModel::new("id", ScalarType::Text)))
        .build()
        .expect_err("duplicate field");

    assert!(matches!(err, ConfigError::DuplicateMember { ref name, .. } if name == "id"));
}

#[test]
fn reserved_names_are_rejected() {
    let err = Schema::builder()
        .entity(person().with_field(FieldModel::new("_count", ScalarType::Int)))
        .build()
        .expect_err("reserved name");

    assert!(matches!(err, ConfigError::ReservedName { .. }));
}

#[test]
fn unique_constraint_must_name_known_fields() {
    let err = Schema::builder()
        .entity(person().with_unique(UniqueModel::new(&["email"])))
        .build()
        .expect_err("unknown unique field");

    assert!(matches!(
        err,
        ConfigError::UnknownKeyField { ref field, context: "unique constraint", .. } if field == "email"
    ));
}

#[test]
fn missing_primary_key_is_rejected() {
    let err = Schema::builder()
        .entity(EntityModel::new("Loose").with_field(FieldModel::new("id", ScalarType::Int)))
        .build()
        .expect_err("no primary key");

    assert!(matches!(err, ConfigError::MissingPrimaryKey { .. }));
}

#[test]
fn unknown_enum_reference_is_rejected() {
    let err = Schema::builder()
        .entity(person().with_field(FieldModel::new(
            "mood",
            ScalarType::Enum("Mood".to_string()),
        )))
        .build()
        .expect_err("unknown enum");

    assert!(matches!(err, ConfigError::UnknownEnum { ref name, .. } if name == "Mood"));
}

#[test]
fn static_enum_default_must_be_a_declared_variant() {
    let err = Schema::builder()
        .enumeration(EnumModel::new("Mood", &["calm"]))
        .entity(
            person().with_field(
                FieldModel::new("mood", ScalarType::Enum("Mood".to_string())).default(
                    crate::model::DefaultValue::Static(crate::value::Value::Enum(
                        "angry".to_string(),
                    )),
                ),
            ),
        )
        .build()
        .expect_err("bad default");

    assert!(matches!(err, ConfigError::InvalidDefault { .. }));
}

#[test]
fn relation_to_unknown_entity_is_rejected() {
    let err = Schema::builder()
        .entity(
            person()
                .with_field(FieldModel::new("teamId", ScalarType::Int))
                .with_relation(RelationModel::belongs_to("team", "Team", &["teamId"], &["id"])),
        )
        .build()
        .expect_err("unknown target");

    assert!(matches!(err, ConfigError::UnknownRelationTarget { ref target, .. } if target == "Team"));
}

#[test]
fn foreign_key_type_must_match_reference() {
    let err = Schema::builder()
        .entity(person())
        .entity(
            EntityModel::new("Pet")
                .with_field(FieldModel::new("id", ScalarType::Int))
                .with_field(FieldModel::new("ownerId", ScalarType::Text))
                .with_relation(RelationModel::belongs_to("owner", "Person", &["ownerId"], &["id"]))
                .with_primary_key(&["id"]),
        )
        .build()
        .expect_err("type mismatch");

    assert!(matches!(err, ConfigError::InvalidRelation { ref relation, .. } if relation == "owner"));
}

#[test]
fn optional_relation_requires_nullable_foreign_key() {
    let err = Schema::builder()
        .entity(person())
        .entity(
            EntityModel::new("Pet")
                .with_field(FieldModel::new("id", ScalarType::Int))
                .with_field(FieldModel::new("ownerId", ScalarType::Int))
                .with_relation(
                    RelationModel::belongs_to("owner", "Person", &["ownerId"], &["id"]).optional(),
                )
                .with_primary_key(&["id"]),
        )
        .build()
        .expect_err("nullability mismatch");

    assert!(matches!(err, ConfigError::InvalidRelation { .. }));
}

#[test]
fn inverse_relation_must_resolve_to_an_owner() {
    let err = Schema::builder()
        .entity(person().with_relation(RelationModel::has_many("pets", "Pet", "owner")))
        .entity(
            EntityModel::new("Pet")
                .with_field(FieldModel::new("id", ScalarType::Int))
                .with_primary_key(&["id"]),
        )
        .build()
        .expect_err("dangling inverse");

    assert!(matches!(err, ConfigError::InvalidRelation { ref relation, .. } if relation == "pets"));
}

#[test]
fn json_descriptor_builds_an_equivalent_schema() {
    let schema = Schema::from_json(&json!({
        "enums": [{ "name": "Role", "variants": ["admin", "staff"] }],
        "entities": [
            {
                "name": "User",
                "primaryKey": ["id"],
                "uniques": [{ "fields": ["email"] }],
                "fields": [
                    { "name": "id", "type": "Int", "default": "autoincrement" },
                    { "name": "email", "type": "Text" },
                    { "name": "role", "type": "Role", "default": { "value": "staff" } },
                    { "name": "createdAt", "type": "DateTime", "default": "now" }
                ],
                "relations": [
                    { "name": "sessions", "target": "Session", "cardinality": "many", "inverse": "user" }
                ]
            },
            {
                "name": "Session",
                "primaryKey": ["token"],
                "fields": [
                    { "name": "token", "type": "Text", "default": "uuid" },
                    { "name": "userId", "type": "Int" }
                ],
                "relations": [
                    {
                        "name": "user", "target": "User", "cardinality": "one",
                        "fields": ["userId"], "references": ["id"], "onDelete": "Cascade"
                    }
                ]
            }
        ]
    }))
    .expect("descriptor should build");

    let user = schema.entity("User").expect("user");
    assert_eq!(user.field("role").map(|f| f.ty.clone()), Some(ScalarType::Enum("Role".to_string())));
    assert!(user.field("createdAt").is_some_and(FieldModel::has_default));
    assert!(user.relation("sessions").is_some_and(RelationModel::is_to_many));
    assert_eq!(user.unique_sets()[1].name, "email");
}

#[test]
fn json_descriptor_rejects_unknown_keys() {
    let err = Schema::from_json(&json!({
        "entities": [{ "name": "A", "primaryKey": ["id"], "fields": [], "comment": "x" }]
    }))
    .expect_err("unknown key");

    assert!(matches!(err, ConfigError::InvalidDescriptor(_)));
}
