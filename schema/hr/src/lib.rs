//! HR schema and seed data shared by the Quarry integration tests.
//!
//! The schema covers every relation shape the client supports: optional
//! and required to-one links, self references, compound unique keys,
//! composite primary keys on a join entity, and each referential action.

use chrono::{DateTime, Utc};
use quarry::prelude::*;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value as Json, json};
use std::sync::Arc;

//
// Schema
//

/// Build the HR schema.
///
/// # Panics
/// Panics if the fixture definitions stop validating.
#[must_use]
pub fn hr_schema() -> Arc<Schema> {
    let schema = Schema::builder()
        .enumeration(EnumModel::new("EmployeeStatus", &["active", "inactive", "deleted"]))
        .enumeration(EnumModel::new("AttendanceStatus", &["present", "absent", "late", "remote"]))
        .enumeration(EnumModel::new("LeaveStatus", &["pending", "approved", "rejected"]))
        .enumeration(EnumModel::new("NotificationKind", &["info", "warning", "alert"]))
        .enumeration(EnumModel::new("EventKind", &["meeting", "holiday", "training"]))
        .entity(department())
        .entity(position())
        .entity(employee())
        .entity(attendance())
        .entity(leave_request())
        .entity(address())
        .entity(user())
        .entity(role())
        .entity(user_role())
        .entity(token())
        .entity(audit_log())
        .entity(notification())
        .entity(customer())
        .entity(qr_code())
        .entity(event())
        .build()
        .expect("hr schema should validate");

    Arc::new(schema)
}

fn id() -> FieldModel {
    FieldModel::new("id", ScalarType::Int).auto_increment()
}

fn created_at() -> FieldModel {
    FieldModel::new("createdAt", ScalarType::DateTime).default_now()
}

fn enumerated(name: &str, enum_name: &str) -> FieldModel {
    FieldModel::new(name, ScalarType::Enum(enum_name.to_string()))
}

fn flag(name: &str, value: bool) -> FieldModel {
    FieldModel::new(name, ScalarType::Boolean).default(DefaultValue::Static(Value::Bool(value)))
}

fn department() -> EntityModel {
    EntityModel::new("Department")
        .with_field(id())
        .with_field(FieldModel::new("name", ScalarType::Text))
        .with_field(FieldModel::new("code", ScalarType::Text))
        .with_field(FieldModel::new("budget", ScalarType::Decimal).optional())
        .with_field(created_at())
        .with_relation(RelationModel::has_many("employees", "Employee", "department"))
        .with_relation(RelationModel::has_many("positions", "Position", "department"))
        .with_relation(RelationModel::has_many("events", "Event", "department"))
        .with_primary_key(&["id"])
        .with_unique(UniqueModel::new(&["name"]))
        .with_unique(UniqueModel::new(&["code"]))
}

fn position() -> EntityModel {
    EntityModel::new("Position")
        .with_field(id())
        .with_field(FieldModel::new("title", ScalarType::Text))
        .with_field(FieldModel::new("level", ScalarType::Int))
        .with_field(FieldModel::new("minSalary", ScalarType::Decimal))
        .with_field(FieldModel::new("maxSalary", ScalarType::Decimal))
        .with_field(FieldModel::new("departmentId", ScalarType::Int))
        .with_relation(
            RelationModel::belongs_to("department", "Department", &["departmentId"], &["id"])
                .on_delete(ReferentialAction::Cascade),
        )
        .with_relation(RelationModel::has_many("employees", "Employee", "position"))
        .with_primary_key(&["id"])
        .with_unique(UniqueModel::new(&["departmentId", "title"]))
}

fn employee() -> EntityModel {
    EntityModel::new("Employee")
        .with_field(id())
        .with_field(FieldModel::new("employeeCode", ScalarType::Text))
        .with_field(FieldModel::new("email", ScalarType::Text))
        .with_field(FieldModel::new("firstName", ScalarType::Text))
        .with_field(FieldModel::new("lastName", ScalarType::Text))
        .with_field(
            enumerated("status", "EmployeeStatus")
                .default(DefaultValue::Static(Value::Enum("active".to_string()))),
        )
        .with_field(FieldModel::new("salary", ScalarType::Decimal))
        .with_field(FieldModel::new("age", ScalarType::Int).optional())
        .with_field(FieldModel::new("skills", ScalarType::Text).list())
        .with_field(FieldModel::new("hiredAt", ScalarType::DateTime).default_now())
        .with_field(
            FieldModel::new("updatedAt", ScalarType::DateTime)
                .optional()
                .updated_at(),
        )
        .with_field(FieldModel::new("departmentId", ScalarType::Int).optional())
        .with_field(FieldModel::new("positionId", ScalarType::Int).optional())
        .with_field(FieldModel::new("managerId", ScalarType::Int).optional())
        .with_relation(
            RelationModel::belongs_to("department", "Department", &["departmentId"], &["id"])
                .optional()
                .on_delete(ReferentialAction::SetNull),
        )
        .with_relation(
            RelationModel::belongs_to("position", "Position", &["positionId"], &["id"])
                .optional()
                .on_delete(ReferentialAction::SetNull),
        )
        .with_relation(
            RelationModel::belongs_to("manager", "Employee", &["managerId"], &["id"])
                .optional()
                .on_delete(ReferentialAction::SetNull),
        )
        .with_relation(RelationModel::has_many("reports", "Employee", "manager"))
        .with_relation(RelationModel::has_many("attendance", "Attendance", "employee"))
        .with_relation(RelationModel::has_many("leaveRequests", "LeaveRequest", "employee"))
        .with_relation(RelationModel::has_many("addresses", "Address", "employee"))
        .with_relation(RelationModel::has_one("user", "User", "employee"))
        .with_primary_key(&["id"])
        .with_unique(UniqueModel::new(&["employeeCode"]))
        .with_unique(UniqueModel::new(&["email"]))
}

fn attendance() -> EntityModel {
    EntityModel::new("Attendance")
        .with_field(id())
        .with_field(FieldModel::new("employeeId", ScalarType::Int))
        .with_field(FieldModel::new("date", ScalarType::DateTime))
        .with_field(enumerated("status", "AttendanceStatus"))
        .with_field(FieldModel::new("hours", ScalarType::Decimal).optional())
        .with_relation(
            RelationModel::belongs_to("employee", "Employee", &["employeeId"], &["id"])
                .on_delete(ReferentialAction::Cascade),
        )
        .with_primary_key(&["id"])
        .with_unique(UniqueModel::new(&["employeeId", "date"]))
}

fn leave_request() -> EntityModel {
    EntityModel::new("LeaveRequest")
        .with_field(id())
        .with_field(FieldModel::new("employeeId", ScalarType::Int))
        .with_field(FieldModel::new("startDate", ScalarType::DateTime))
        .with_field(FieldModel::new("endDate", ScalarType::DateTime))
        .with_field(FieldModel::new("days", ScalarType::Int))
        .with_field(FieldModel::new("reason", ScalarType::Text).optional())
        .with_field(
            enumerated("status", "LeaveStatus")
                .default(DefaultValue::Static(Value::Enum("pending".to_string()))),
        )
        .with_field(created_at())
        .with_relation(
            RelationModel::belongs_to("employee", "Employee", &["employeeId"], &["id"])
                .on_delete(ReferentialAction::Cascade),
        )
        .with_primary_key(&["id"])
}

fn address() -> EntityModel {
    EntityModel::new("Address")
        .with_field(id())
        .with_field(FieldModel::new("employeeId", ScalarType::Int))
        .with_field(FieldModel::new("line1", ScalarType::Text))
        .with_field(FieldModel::new("city", ScalarType::Text))
        .with_field(FieldModel::new("country", ScalarType::Text))
        .with_field(FieldModel::new("postalCode", ScalarType::Text).optional())
        .with_field(flag("primary", false))
        .with_relation(
            RelationModel::belongs_to("employee", "Employee", &["employeeId"], &["id"])
                .on_delete(ReferentialAction::Cascade),
        )
        .with_primary_key(&["id"])
}

fn user() -> EntityModel {
    EntityModel::new("User")
        .with_field(id())
        .with_field(FieldModel::new("email", ScalarType::Text))
        .with_field(FieldModel::new("passwordHash", ScalarType::Text))
        .with_field(FieldModel::new("employeeId", ScalarType::Int).optional())
        .with_field(FieldModel::new("lastLoginAt", ScalarType::DateTime).optional())
        .with_field(created_at())
        .with_relation(
            RelationModel::belongs_to("employee", "Employee", &["employeeId"], &["id"])
                .optional()
                .on_delete(ReferentialAction::SetNull),
        )
        .with_relation(RelationModel::has_many("roles", "UserRole", "user"))
        .with_relation(RelationModel::has_many("tokens", "Token", "user"))
        .with_relation(RelationModel::has_many("logs", "AuditLog", "user"))
        .with_relation(RelationModel::has_many("notifications", "Notification", "user"))
        .with_primary_key(&["id"])
        .with_unique(UniqueModel::new(&["email"]))
        .with_unique(UniqueModel::new(&["employeeId"]))
}

fn role() -> EntityModel {
    EntityModel::new("Role")
        .with_field(id())
        .with_field(FieldModel::new("name", ScalarType::Text))
        .with_field(FieldModel::new("description", ScalarType::Text).optional())
        .with_relation(RelationModel::has_many("users", "UserRole", "role"))
        .with_primary_key(&["id"])
        .with_unique(UniqueModel::new(&["name"]))
}

fn user_role() -> EntityModel {
    EntityModel::new("UserRole")
        .with_field(FieldModel::new("userId", ScalarType::Int))
        .with_field(FieldModel::new("roleId", ScalarType::Int))
        .with_field(FieldModel::new("assignedAt", ScalarType::DateTime).default_now())
        .with_relation(
            RelationModel::belongs_to("user", "User", &["userId"], &["id"])
                .on_delete(ReferentialAction::Cascade),
        )
        .with_relation(
            RelationModel::belongs_to("role", "Role", &["roleId"], &["id"])
                .on_delete(ReferentialAction::Restrict),
        )
        .with_primary_key(&["userId", "roleId"])
}

fn token() -> EntityModel {
    EntityModel::new("Token")
        .with_field(FieldModel::new("id", ScalarType::Text).default(DefaultValue::Uuid))
        .with_field(FieldModel::new("userId", ScalarType::Int))
        .with_field(FieldModel::new("expiresAt", ScalarType::DateTime))
        .with_field(flag("revoked", false))
        .with_relation(
            RelationModel::belongs_to("user", "User", &["userId"], &["id"])
                .on_delete(ReferentialAction::Cascade),
        )
        .with_primary_key(&["id"])
}

fn audit_log() -> EntityModel {
    EntityModel::new("AuditLog")
        .with_field(id())
        .with_field(FieldModel::new("userId", ScalarType::Int).optional())
        .with_field(FieldModel::new("action", ScalarType::Text))
        .with_field(FieldModel::new("payload", ScalarType::Json).optional())
        .with_field(created_at())
        .with_relation(
            RelationModel::belongs_to("user", "User", &["userId"], &["id"])
                .optional()
                .on_delete(ReferentialAction::SetNull),
        )
        .with_primary_key(&["id"])
}

fn notification() -> EntityModel {
    EntityModel::new("Notification")
        .with_field(id())
        .with_field(FieldModel::new("userId", ScalarType::Int))
        .with_field(enumerated("kind", "NotificationKind"))
        .with_field(FieldModel::new("message", ScalarType::Text))
        .with_field(flag("read", false))
        .with_field(created_at())
        .with_relation(
            RelationModel::belongs_to("user", "User", &["userId"], &["id"])
                .on_delete(ReferentialAction::Cascade),
        )
        .with_primary_key(&["id"])
}

fn customer() -> EntityModel {
    EntityModel::new("Customer")
        .with_field(id())
        .with_field(FieldModel::new("name", ScalarType::Text))
        .with_field(FieldModel::new("email", ScalarType::Text))
        .with_field(FieldModel::new("phone", ScalarType::Text).optional())
        .with_field(FieldModel::new("country", ScalarType::Text))
        .with_field(
            FieldModel::new("lifetimeValue", ScalarType::Decimal)
                .default(DefaultValue::Static(Value::Decimal(Decimal::ZERO))),
        )
        .with_relation(RelationModel::has_many("qrCodes", "QrCode", "customer"))
        .with_primary_key(&["id"])
        .with_unique(UniqueModel::new(&["email"]))
}

fn qr_code() -> EntityModel {
    EntityModel::new("QrCode")
        .with_field(FieldModel::new("id", ScalarType::Text).default(DefaultValue::Uuid))
        .with_field(FieldModel::new("customerId", ScalarType::Int))
        .with_field(FieldModel::new("payload", ScalarType::Text))
        .with_field(
            FieldModel::new("scans", ScalarType::Int).default(DefaultValue::Static(Value::Int(0))),
        )
        .with_field(created_at())
        .with_relation(
            RelationModel::belongs_to("customer", "Customer", &["customerId"], &["id"])
                .on_delete(ReferentialAction::Cascade),
        )
        .with_primary_key(&["id"])
}

fn event() -> EntityModel {
    EntityModel::new("Event")
        .with_field(id())
        .with_field(FieldModel::new("title", ScalarType::Text))
        .with_field(enumerated("kind", "EventKind"))
        .with_field(FieldModel::new("startsAt", ScalarType::DateTime))
        .with_field(FieldModel::new("endsAt", ScalarType::DateTime).optional())
        .with_field(FieldModel::new("departmentId", ScalarType::Int).optional())
        .with_relation(
            RelationModel::belongs_to("department", "Department", &["departmentId"], &["id"])
                .optional()
                .on_delete(ReferentialAction::SetNull),
        )
        .with_primary_key(&["id"])
}

//
// Typed rows
//

///
/// Employee
///

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: i64,
    pub employee_code: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub status: String,
    pub salary: Decimal,
    pub age: Option<i64>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub hired_at: DateTime<Utc>,
    pub department_id: Option<i64>,
}

impl EntityKind for Employee {
    const ENTITY: &'static str = "Employee";
}

///
/// Department
///

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub budget: Option<Decimal>,
}

impl EntityKind for Department {
    const ENTITY: &'static str = "Department";
}

///
/// Customer
///

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub country: String,
    pub lifetime_value: Decimal,
}

impl EntityKind for Customer {
    const ENTITY: &'static str = "Customer";
}

//
// Seed data
//

/// Required fields for an employee, keyed off a short code.
#[must_use]
pub fn employee_input(code: &str, salary: i64) -> Json {
    json!({
        "employeeCode": code,
        "email": format!("{}@example.com", code.to_lowercase()),
        "firstName": "Test",
        "lastName": code,
        "salary": salary,
    })
}

/// Client over a fresh in-memory backend.
///
/// # Panics
/// Panics if the client cannot be constructed.
#[must_use]
pub fn memory_client() -> Client {
    let schema = hr_schema();
    let backend = Arc::new(MemoryBackend::new(Arc::clone(&schema)));

    Client::builder(schema)
        .backend(backend)
        .build()
        .expect("memory client should build")
}

///
/// Seeded
///
/// Ids of the rows created by `seed`.
///

#[derive(Clone, Copy, Debug)]
pub struct Seeded {
    pub engineering: i64,
    pub sales: i64,
    pub operations: i64,
}

/// Populate three departments and ten employees.
///
/// Engineering holds four employees, Sales three, Operations two, and one
/// employee has no department. Statuses mix active and inactive.
///
/// # Panics
/// Panics if any seed write fails.
pub async fn seed(client: &Client) -> Seeded {
    let departments = client.entity("Department").expect("department delegate");
    let mut ids = Vec::new();
    for (name, code, budget) in [
        ("Engineering", "ENG", json!("250000.00")),
        ("Sales", "SAL", json!("120000.00")),
        ("Operations", "OPS", Json::Null),
    ] {
        let row = departments
            .create(json!({ "data": { "name": name, "code": code, "budget": budget } }))
            .await
            .expect("seed department");
        ids.push(row.value("id").and_then(Value::as_i64).expect("department id"));
    }
    let seeded = Seeded {
        engineering: ids[0],
        sales: ids[1],
        operations: ids[2],
    };

    let staff: [(&str, i64, &str, Option<i64>, i64); 10] = [
        ("E-001", 9000, "active", Some(seeded.engineering), 41),
        ("E-002", 8000, "active", Some(seeded.engineering), 35),
        ("E-003", 7000, "inactive", Some(seeded.engineering), 29),
        ("E-004", 6500, "active", Some(seeded.engineering), 52),
        ("E-005", 5000, "active", Some(seeded.sales), 33),
        ("E-006", 4500, "inactive", Some(seeded.sales), 27),
        ("E-007", 4000, "active", Some(seeded.sales), 45),
        ("E-008", 3500, "active", Some(seeded.operations), 38),
        ("E-009", 3000, "inactive", Some(seeded.operations), 24),
        ("E-010", 2500, "active", None, 30),
    ];

    let employees = client.entity("Employee").expect("employee delegate");
    for (code, salary, status, department, age) in staff {
        let mut data = employee_input(code, salary);
        data["status"] = json!(status);
        data["age"] = json!(age);
        data["departmentId"] = json!(department);
        employees
            .create(json!({ "data": data }))
            .await
            .expect("seed employee");
    }

    seeded
}
