//! Shared fixtures for unit tests.

use crate::model::{
    DefaultValue, EntityModel, EnumModel, FieldModel, ReferentialAction, RelationModel,
    ScalarType, Schema, UniqueModel,
};
use crate::value::Value;

/// Small personnel schema covering every relation shape:
/// Department 1─n Employee 1─n Attendance, Employee 1─1 Profile.
pub(crate) fn test_schema() -> Schema {
    Schema::builder()
        .enumeration(EnumModel::new(
            "EmployeeStatus",
            &["active", "inactive", "deleted"],
        ))
        .entity(
            EntityModel::new("Department")
                .with_field(FieldModel::new("id", ScalarType::Int).auto_increment())
                .with_field(FieldModel::new("name", ScalarType::Text))
                .with_field(FieldModel::new("budget", ScalarType::Decimal).optional())
                .with_relation(RelationModel::has_many("employees", "Employee", "department"))
                .with_primary_key(&["id"])
                .with_unique(UniqueModel::new(&["name"])),
        )
        .entity(
            EntityModel::new("Employee")
                .with_field(FieldModel::new("id", ScalarType::Int).auto_increment())
                .with_field(FieldModel::new("employeeCode", ScalarType::Text))
                .with_field(FieldModel::new("email", ScalarType::Text))
                .with_field(FieldModel::new("name", ScalarType::Text))
                .with_field(FieldModel::new("password", ScalarType::Text))
                .with_field(
                    FieldModel::new("status", ScalarType::Enum("EmployeeStatus".to_string()))
                        .default(DefaultValue::Static(Value::Enum("active".to_string()))),
                )
                .with_field(FieldModel::new("salary", ScalarType::Decimal))
                .with_field(FieldModel::new("age", ScalarType::Int).optional())
                .with_field(FieldModel::new("rating", ScalarType::Float).optional())
                .with_field(
                    FieldModel::new("active", ScalarType::Boolean)
                        .default(DefaultValue::Static(Value::Bool(true))),
                )
                .with_field(FieldModel::new("tags", ScalarType::Text).list())
                .with_field(FieldModel::new("hiredAt", ScalarType::DateTime).default_now())
                .with_field(
                    FieldModel::new("updatedAt", ScalarType::DateTime)
                        .optional()
                        .updated_at(),
                )
                .with_field(FieldModel::new("departmentId", ScalarType::Int).optional())
                .with_relation(
                    RelationModel::belongs_to("department", "Department", &["departmentId"], &["id"])
                        .optional(),
                )
                .with_relation(RelationModel::has_many("attendance", "Attendance", "employee"))
                .with_relation(RelationModel::has_one("profile", "Profile", "employee"))
                .with_primary_key(&["id"])
                .with_unique(UniqueModel::new(&["employeeCode"]))
                .with_unique(UniqueModel::new(&["email"])),
        )
        .entity(
            EntityModel::new("Attendance")
                .with_field(FieldModel::new("id", ScalarType::Int).auto_increment())
                .with_field(FieldModel::new("employeeId", ScalarType::Int))
                .with_field(FieldModel::new("date", ScalarType::DateTime))
                .with_field(FieldModel::new("hours", ScalarType::Decimal))
                .with_field(FieldModel::new("note", ScalarType::Text).optional())
                .with_relation(
                    RelationModel::belongs_to("employee", "Employee", &["employeeId"], &["id"])
                        .on_delete(ReferentialAction::Cascade),
                )
                .with_primary_key(&["id"])
                .with_unique(UniqueModel::new(&["employeeId", "date"])),
        )
        .entity(
            EntityModel::new("Profile")
                .with_field(FieldModel::new("id", ScalarType::Int).auto_increment())
                .with_field(FieldModel::new("employeeId", ScalarType::Int))
                .with_field(FieldModel::new("bio", ScalarType::Text).optional())
                .with_relation(
                    RelationModel::belongs_to("employee", "Employee", &["employeeId"], &["id"])
                        .on_delete(ReferentialAction::Cascade),
                )
                .with_primary_key(&["id"])
                .with_unique(UniqueModel::new(&["employeeId"])),
        )
        .build()
        .expect("test schema should validate")
}
