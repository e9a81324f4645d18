use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

///
/// ScalarType
///
/// Declared type of one scalar field. Enum fields carry the enum name.
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ScalarType {
    Text,
    Int,
    Float,
    Decimal,
    Boolean,
    DateTime,
    Json,
    Enum(String),
}

impl ScalarType {
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Float | Self::Decimal)
    }

    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Text)
    }

    /// Types accepted by range operators (`lt`, `gte`, ...) and `_min`/`_max`.
    #[must_use]
    pub const fn is_orderable(&self) -> bool {
        matches!(
            self,
            Self::Text | Self::Int | Self::Float | Self::Decimal | Self::DateTime
        )
    }
}

impl Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("Text"),
            Self::Int => f.write_str("Int"),
            Self::Float => f.write_str("Float"),
            Self::Decimal => f.write_str("Decimal"),
            Self::Boolean => f.write_str("Boolean"),
            Self::DateTime => f.write_str("DateTime"),
            Self::Json => f.write_str("Json"),
            Self::Enum(name) => f.write_str(name),
        }
    }
}

///
/// DefaultValue
///
/// Column default applied by the backend when a create omits the field.
///

#[derive(Clone, Debug, PartialEq)]
pub enum DefaultValue {
    Static(Value),
    AutoIncrement,
    Now,
    Uuid,
}

///
/// FieldModel
///

#[derive(Clone, Debug, PartialEq)]
pub struct FieldModel {
    pub name: String,
    pub ty: ScalarType,
    pub nullable: bool,
    pub list: bool,
    pub default: Option<DefaultValue>,

    /// Stamped with the current time by the backend on every update.
    pub updated_at: bool,
}

impl FieldModel {
    #[must_use]
    pub fn new(name: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            list: false,
            default: None,
            updated_at: false,
        }
    }

    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub const fn list(mut self) -> Self {
        self.list = true;
        self
    }

    #[must_use]
    pub fn default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub fn auto_increment(self) -> Self {
        self.default(DefaultValue::AutoIncrement)
    }

    #[must_use]
    pub fn default_now(self) -> Self {
        self.default(DefaultValue::Now)
    }

    #[must_use]
    pub const fn updated_at(mut self) -> Self {
        self.updated_at = true;
        self
    }

    #[must_use]
    pub const fn has_default(&self) -> bool {
        self.default.is_some() || self.updated_at
    }

    /// A create payload must name this field (directly or through a relation).
    #[must_use]
    pub const fn is_required_on_create(&self) -> bool {
        !self.nullable && !self.list && !self.has_default()
    }

    /// Human-readable type including list and nullability markers.
    #[must_use]
    pub fn type_label(&self) -> String {
        let mut label = self.ty.to_string();
        if self.list {
            label.push_str("[]");
        }
        if self.nullable {
            label.push('?');
        }

        label
    }
}
