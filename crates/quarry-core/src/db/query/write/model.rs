use crate::{db::query::unique::UniqueWhere, value::Value};

///
/// CreateData
///
/// Validated create payload. Scalar values are listed in schema order;
/// fields left out are filled by backend defaults.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CreateData {
    pub values: Vec<(String, Value)>,
    pub relations: Vec<RelationWrite>,
}

impl CreateData {
    #[must_use]
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values.iter().find(|(f, _)| f == field).map(|(_, v)| v)
    }

    #[must_use]
    pub const fn has_nested_writes(&self) -> bool {
        !self.relations.is_empty()
    }
}

///
/// UpdateData
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateData {
    pub values: Vec<(String, FieldUpdate)>,
    pub relations: Vec<RelationWrite>,
}

impl UpdateData {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.relations.is_empty()
    }
}

///
/// FieldUpdate
///
/// Arithmetic variants apply to numeric scalars; `Push` appends to lists.
/// Arithmetic on a null column leaves it null.
///

#[derive(Clone, Debug, PartialEq)]
pub enum FieldUpdate {
    Set(Value),
    Increment(Value),
    Decrement(Value),
    Multiply(Value),
    Divide(Value),
    Push(Value),
}

impl FieldUpdate {
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Set(_) => "set",
            Self::Increment(_) => "increment",
            Self::Decrement(_) => "decrement",
            Self::Multiply(_) => "multiply",
            Self::Divide(_) => "divide",
            Self::Push(_) => "push",
        }
    }
}

///
/// RelationWrite
///

#[derive(Clone, Debug, PartialEq)]
pub struct RelationWrite {
    pub relation: String,
    pub ops: Vec<RelationOp>,
}

///
/// RelationOp
///
/// Connect    → link an existing target row found by unique key
/// Create     → insert a target row and link it
/// Disconnect → unlink; `None` for to-one relations, a unique key for to-many
///

#[derive(Clone, Debug, PartialEq)]
pub enum RelationOp {
    Connect(UniqueWhere),
    Create(CreateData),
    Disconnect(Option<UniqueWhere>),
}
