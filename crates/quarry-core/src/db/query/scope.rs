use crate::{
    db::query::{
        ValidateError,
        order::{Direction, OrderTerm, build_order},
        predicate::{Predicate, PredicateBuilder},
        unique::{UniqueKey, build_cursor},
    },
    model::{EntityModel, ScalarType, Schema},
};
use serde_json::Value as Json;

///
/// Scope
///
/// The row window of a read: filter, ordering, cursor and pagination.
/// A negative `take` reads backwards from the cursor (or from the end).
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scope {
    pub filter: Predicate,
    pub order: Vec<OrderTerm>,
    pub cursor: Option<UniqueKey>,
    pub take: Option<i64>,
    pub skip: Option<u64>,
    pub distinct: Vec<String>,
}

impl Scope {
    #[must_use]
    pub fn filtered(filter: Predicate) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn is_paginated(&self) -> bool {
        self.cursor.is_some() || self.take.is_some() || self.skip.is_some()
    }
}

///
/// ScopeInputs
///

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ScopeInputs<'a> {
    pub filter: Option<&'a Json>,
    pub order_by: Option<&'a Json>,
    pub cursor: Option<&'a Json>,
    pub take: Option<i64>,
    pub skip: Option<u64>,
    pub distinct: Option<&'a Json>,
}

///
/// CursorOrder
///
/// What to do with a cursor that comes without an explicit `orderBy`.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum CursorOrder {
    PrimaryKey,
    Reject,
}

pub(crate) fn build_scope(
    schema: &Schema,
    entity: &EntityModel,
    inputs: ScopeInputs<'_>,
    cursor_order: CursorOrder,
) -> Result<Scope, ValidateError> {
    let filter = match inputs.filter {
        Some(raw) if !raw.is_null() => PredicateBuilder::new(schema).filter(entity, raw)?,
        _ => Predicate::True,
    };

    let mut order = match inputs.order_by {
        Some(raw) if !raw.is_null() => build_order(schema, entity, raw, false)?,
        _ => Vec::new(),
    };

    let cursor = match inputs.cursor {
        Some(raw) if !raw.is_null() => Some(build_cursor(schema, entity, raw)?),
        _ => None,
    };

    if cursor.is_some() && order.is_empty() {
        match cursor_order {
            CursorOrder::Reject => {
                return Err(ValidateError::CursorWithoutOrder {
                    entity: entity.name.clone(),
                });
            }
            CursorOrder::PrimaryKey => {
                order = entity
                    .primary_key
                    .iter()
                    .map(|field| OrderTerm::field(field.clone(), Direction::Asc))
                    .collect();
            }
        }
    }

    let distinct = match inputs.distinct {
        Some(raw) if !raw.is_null() => distinct_fields(entity, raw)?,
        _ => Vec::new(),
    };

    Ok(Scope {
        filter,
        order,
        cursor,
        take: inputs.take,
        skip: inputs.skip,
        distinct,
    })
}

fn distinct_fields(entity: &EntityModel, raw: &Json) -> Result<Vec<String>, ValidateError> {
    let shape = || ValidateError::ExpectedShape {
        entity: entity.name.clone(),
        path: "distinct".to_string(),
        expected: "a field name or a list of field names",
    };

    let names: Vec<&str> = match raw {
        Json::String(name) => vec![name.as_str()],
        Json::Array(items) => items
            .iter()
            .map(|item| item.as_str().ok_or_else(shape))
            .collect::<Result<_, _>>()?,
        _ => return Err(shape()),
    };

    let mut fields: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let field = entity.field(name).ok_or_else(|| ValidateError::UnknownField {
            entity: entity.name.clone(),
            field: name.to_string(),
        })?;
        if field.list || field.ty == ScalarType::Json {
            return Err(ValidateError::ExpectedShape {
                entity: entity.name.clone(),
                path: format!("distinct.{name}"),
                expected: "a non-list, non-Json scalar field",
            });
        }
        if !fields.iter().any(|f| f == name) {
            fields.push(name.to_string());
        }
    }

    Ok(fields)
}
