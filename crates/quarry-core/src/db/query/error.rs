use thiserror::Error as ThisError;

///
/// ValidateError
///
/// Malformed call arguments, detected before anything is dispatched to the
/// backend. Messages always name the offending entity and key.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ValidateError {
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("unknown field '{field}' on '{entity}'")]
    UnknownField { entity: String, field: String },

    #[error("invalid {operation} arguments: {message}")]
    MalformedArguments { operation: String, message: String },

    #[error("'{path}' on '{entity}' must be {expected}")]
    ExpectedShape {
        entity: String,
        path: String,
        expected: &'static str,
    },

    #[error("type mismatch on '{entity}.{field}': expected {expected}, found {found}")]
    TypeMismatch {
        entity: String,
        field: String,
        expected: String,
        found: String,
    },

    #[error("filter nesting exceeds {max} levels")]
    PredicateTooDeep { max: usize },

    #[error("'in' list on '{entity}.{field}' has {len} values (max {max})")]
    InListTooLarge {
        entity: String,
        field: String,
        len: usize,
        max: usize,
    },

    #[error("choose select or include, not both ('{entity}')")]
    SelectAndInclude { entity: String },

    #[error("select cannot be combined with omit: true on '{entity}'")]
    SelectAndOmit { entity: String },

    #[error("selection on '{entity}' returns no fields")]
    EmptySelection { entity: String },

    #[error("'{entity}.{field}' is a scalar field and cannot be included")]
    IncludeScalar { entity: String, field: String },

    #[error("'{entity}.{field}' is hidden by the omit policy")]
    OmittedField { entity: String, field: String },

    #[error("re-including '{entity}.{field}' requires allow_omit_override")]
    OmitOverrideDisabled { entity: String, field: String },

    #[error("'{argument}' is not valid on to-one relation '{entity}.{relation}'")]
    RelationArgumentsOnToOne {
        entity: String,
        relation: String,
        argument: String,
    },

    #[error("where on '{entity}' does not identify a unique row: {detail}")]
    NotUnique { entity: String, detail: String },

    #[error("cursor on '{entity}' requires orderBy")]
    CursorWithoutOrder { entity: String },

    #[error("invalid orderBy on '{entity}': {reason}")]
    InvalidOrderBy { entity: String, reason: String },

    #[error("missing required {kind} '{field}' on '{entity}'")]
    MissingRequired {
        entity: String,
        field: String,
        kind: &'static str,
    },

    #[error("relation '{entity}.{relation}' and its foreign key '{field}' cannot both be set")]
    RelationAndForeignKey {
        entity: String,
        relation: String,
        field: String,
    },

    #[error("invalid write to relation '{entity}.{relation}': {reason}")]
    InvalidRelationWrite {
        entity: String,
        relation: String,
        reason: String,
    },

    #[error("'{operation}' cannot be applied to '{entity}.{field}'")]
    InvalidAtomicOperation {
        entity: String,
        field: String,
        operation: String,
    },

    #[error("nested write to '{entity}.{relation}' is not allowed in createMany")]
    NestedWriteInBatch { entity: String, relation: String },

    #[error("by must not be empty ('{entity}')")]
    EmptyGroupBy { entity: String },

    #[error("cannot group '{entity}' by '{field}': {reason}")]
    GroupByInvalidField {
        entity: String,
        field: String,
        reason: &'static str,
    },

    #[error("'{field}' is used in {clause} but is not in by ('{entity}')")]
    FieldNotInGroupBy {
        entity: String,
        field: String,
        clause: &'static str,
    },

    #[error("{function} cannot be applied to '{entity}.{field}' ({ty})")]
    AggregateNotApplicable {
        entity: String,
        field: String,
        function: &'static str,
        ty: String,
    },

    #[error("take/skip on '{entity}' requires orderBy")]
    PaginationWithoutOrder { entity: String },

    #[error("invalid pagination on '{entity}': {reason}")]
    InvalidPagination { entity: String, reason: String },

    #[error("raw query references {placeholders} parameter(s) but {params} were supplied")]
    RawParameterCount { placeholders: usize, params: usize },

    #[error("cannot decode '{entity}' record: {message}")]
    ResultDecode { entity: String, message: String },
}

impl ValidateError {
    /// Operand or operator did not fit the declared field type.
    #[must_use]
    pub const fn is_type_error(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. } | Self::ResultDecode { .. })
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownEntity(_) => "UnknownEntity",
            Self::UnknownField { .. } => "UnknownField",
            Self::MalformedArguments { .. } | Self::ExpectedShape { .. } => "MalformedArguments",
            Self::TypeMismatch { .. } => "TypeMismatch",
            Self::PredicateTooDeep { .. } | Self::InListTooLarge { .. } => "FilterTooLarge",
            Self::SelectAndInclude { .. } => "SelectAndInclude",
            Self::SelectAndOmit { .. } | Self::EmptySelection { .. } => "InvalidSelection",
            Self::IncludeScalar { .. } | Self::RelationArgumentsOnToOne { .. } => {
                "InvalidInclude"
            }
            Self::OmittedField { .. } | Self::OmitOverrideDisabled { .. } => "OmitPolicy",
            Self::NotUnique { .. } => "NotUnique",
            Self::CursorWithoutOrder { .. }
            | Self::PaginationWithoutOrder { .. }
            | Self::InvalidPagination { .. } => "InvalidPagination",
            Self::InvalidOrderBy { .. } => "InvalidOrderBy",
            Self::MissingRequired { .. } => "MissingRequired",
            Self::RelationAndForeignKey { .. }
            | Self::InvalidRelationWrite { .. }
            | Self::NestedWriteInBatch { .. } => "InvalidRelationWrite",
            Self::InvalidAtomicOperation { .. } => "InvalidAtomicOperation",
            Self::EmptyGroupBy { .. } => "EmptyGroupBy",
            Self::GroupByInvalidField { .. } | Self::FieldNotInGroupBy { .. } => {
                "InvalidGroupBy"
            }
            Self::AggregateNotApplicable { .. } => "AggregateNotApplicable",
            Self::RawParameterCount { .. } => "RawParameterCount",
            Self::ResultDecode { .. } => "ResultDecode",
        }
    }
}
