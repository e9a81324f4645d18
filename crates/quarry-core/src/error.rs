use crate::{config::ErrorFormat, db::query::ValidateError};
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Public error surface of the client.
/// Every failure belongs to exactly one class. Validation errors are raised
/// before dispatch; the remaining classes surface through the same async
/// result channel as success values.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidateError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    ConstraintViolation(#[from] ConstraintViolation),

    #[error(transparent)]
    UnknownBackend(#[from] BackendFailure),

    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

impl Error {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(err) if err.is_type_error() => ErrorClass::Type,
            Self::Validation(_) => ErrorClass::Validation,
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::ConstraintViolation(_) => ErrorClass::ConstraintViolation,
            Self::UnknownBackend(_) => ErrorClass::UnknownBackend,
            Self::Configuration(_) => ErrorClass::Configuration,
        }
    }

    /// Stable machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(err) => err.code(),
            Self::NotFound(_) => "NotFound",
            Self::ConstraintViolation(err) => err.kind.code(),
            Self::UnknownBackend(_) => "UnknownBackend",
            Self::Configuration(err) => err.code(),
        }
    }

    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub const fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation(_))
    }

    /// Render the error using the client's configured verbosity.
    #[must_use]
    pub fn render(&self, format: ErrorFormat) -> String {
        match format {
            ErrorFormat::Minimal => self.to_string(),
            ErrorFormat::Pretty => format!("[{}] {}: {}", self.code(), self.class(), self),
        }
    }
}

///
/// ErrorClass
///
/// Coarse classification shared by every error variant.
/// `Type` is the type-mismatch subset of validation failures.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Validation,
    Type,
    NotFound,
    ConstraintViolation,
    UnknownBackend,
    Configuration,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Validation => "validation",
            Self::Type => "type",
            Self::NotFound => "not_found",
            Self::ConstraintViolation => "constraint_violation",
            Self::UnknownBackend => "unknown_backend",
            Self::Configuration => "configuration",
        };

        f.write_str(label)
    }
}

///
/// NotFoundError
///
/// A `*OrThrow` read or a targeted update/delete matched zero rows.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("no '{entity}' record found for {operation}{}", detail_suffix(.detail.as_deref()))]
pub struct NotFoundError {
    pub entity: String,
    pub operation: String,
    pub detail: Option<String>,
}

impl NotFoundError {
    pub fn new(entity: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            operation: operation.into(),
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

///
/// ConstraintKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    Check,
}

impl ConstraintKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Unique => "UniqueConstraintViolation",
            Self::ForeignKey => "ForeignKeyConstraintViolation",
            Self::Check => "CheckConstraintViolation",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unique => "unique",
            Self::ForeignKey => "foreign key",
            Self::Check => "check",
        };

        f.write_str(label)
    }
}

///
/// ConstraintViolation
///
/// The backend rejected a write. Constraint name and fields are carried
/// whenever the backend reports them.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error(
    "{kind} constraint{} violated on '{entity}'{}{}",
    name_suffix(.constraint.as_deref()),
    fields_suffix(.fields),
    detail_suffix(.detail.as_deref())
)]
pub struct ConstraintViolation {
    pub entity: String,
    pub kind: ConstraintKind,
    pub constraint: Option<String>,
    pub fields: Vec<String>,
    pub detail: Option<String>,
}

///
/// BackendFailure
///
/// Backend failure that does not fit any other class. The raw backend error
/// is kept as the source for diagnostics.
///

#[derive(Debug, ThisError)]
#[error("backend failure{}: {message}", entity_suffix(.entity.as_deref()))]
pub struct BackendFailure {
    pub entity: Option<String>,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BackendFailure {
    pub fn new(entity: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            entity: entity.map(str::to_string),
            message: message.into(),
            source: None,
        }
    }

    /// The backend returned data that does not match the plan it was given.
    pub(crate) fn malformed(entity: &str, message: impl Into<String>) -> Self {
        Self::new(
            Some(entity),
            format!("malformed backend result: {}", message.into()),
        )
    }
}

///
/// ConfigError
///
/// Fatal construction-time failures: invalid schema descriptors, invalid
/// client configuration, or a client assembled without a backend.
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("client has no execution backend")]
    MissingBackend,

    #[error("schema declares no entities")]
    EmptySchema,

    #[error("entity '{entity}' is declared more than once")]
    DuplicateEntity { entity: String },

    #[error("enum '{name}' is declared more than once")]
    DuplicateEnum { name: String },

    #[error("enum '{name}' declares no variants")]
    EmptyEnum { name: String },

    #[error("'{entity}.{name}' is declared more than once")]
    DuplicateMember { entity: String, name: String },

    #[error("'{entity}.{name}' uses a name reserved by the query syntax")]
    ReservedName { entity: String, name: String },

    #[error("entity '{entity}' has no primary key")]
    MissingPrimaryKey { entity: String },

    #[error("{context} on '{entity}' references unknown field '{field}'")]
    UnknownKeyField {
        entity: String,
        field: String,
        context: &'static str,
    },

    #[error("{context} on '{entity}' cannot use list field '{field}'")]
    ListKeyField {
        entity: String,
        field: String,
        context: &'static str,
    },

    #[error("field '{entity}.{field}' references unknown enum '{name}'")]
    UnknownEnum {
        entity: String,
        field: String,
        name: String,
    },

    #[error("default for '{entity}.{field}' is invalid: {reason}")]
    InvalidDefault {
        entity: String,
        field: String,
        reason: String,
    },

    #[error("relation '{entity}.{relation}' targets unknown entity '{target}'")]
    UnknownRelationTarget {
        entity: String,
        relation: String,
        target: String,
    },

    #[error("relation '{entity}.{relation}' is invalid: {reason}")]
    InvalidRelation {
        entity: String,
        relation: String,
        reason: String,
    },

    #[error("omit policy references unknown field '{entity}.{field}'")]
    UnknownOmitTarget { entity: String, field: String },

    #[error("invalid schema descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingBackend => "MissingBackend",
            Self::EmptySchema
            | Self::DuplicateEntity { .. }
            | Self::DuplicateEnum { .. }
            | Self::EmptyEnum { .. }
            | Self::DuplicateMember { .. }
            | Self::ReservedName { .. }
            | Self::MissingPrimaryKey { .. }
            | Self::UnknownKeyField { .. }
            | Self::ListKeyField { .. }
            | Self::UnknownEnum { .. }
            | Self::InvalidDefault { .. }
            | Self::UnknownRelationTarget { .. }
            | Self::InvalidRelation { .. }
            | Self::InvalidDescriptor(_) => "InvalidSchema",
            Self::UnknownOmitTarget { .. } | Self::InvalidConfig(_) | Self::Io(_) => {
                "InvalidConfig"
            }
        }
    }
}

fn detail_suffix(detail: Option<&str>) -> String {
    detail.map(|d| format!(": {d}")).unwrap_or_default()
}

fn name_suffix(name: Option<&str>) -> String {
    name.map(|n| format!(" '{n}'")).unwrap_or_default()
}

fn entity_suffix(entity: Option<&str>) -> String {
    entity.map(|e| format!(" on '{e}'")).unwrap_or_default()
}

fn fields_suffix(fields: &[String]) -> String {
    if fields.is_empty() {
        String::new()
    } else {
        format!(" ({})", fields.join(", "))
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_render_includes_code_and_class() {
        let err = Error::from(NotFoundError::new("Employee", "update"));

        assert_eq!(
            err.render(ErrorFormat::Minimal),
            "no 'Employee' record found for update"
        );
        assert_eq!(
            err.render(ErrorFormat::Pretty),
            "[NotFound] not_found: no 'Employee' record found for update"
        );
    }

    #[test]
    fn constraint_violation_message_lists_fields() {
        let err = ConstraintViolation {
            entity: "Employee".to_string(),
            kind: ConstraintKind::Unique,
            constraint: Some("employeeCode".to_string()),
            fields: vec!["employeeCode".to_string()],
            detail: None,
        };

        assert_eq!(
            err.to_string(),
            "unique constraint 'employeeCode' violated on 'Employee' (employeeCode)"
        );
        assert_eq!(
            Error::from(err).code(),
            "UniqueConstraintViolation"
        );
    }

    #[test]
    fn type_mismatch_is_classified_as_type_error() {
        let err = Error::from(ValidateError::TypeMismatch {
            entity: "Employee".to_string(),
            field: "salary".to_string(),
            expected: "Decimal".to_string(),
            found: "boolean".to_string(),
        });

        assert_eq!(err.class(), ErrorClass::Type);
        assert!(err.is_validation());
    }
}
