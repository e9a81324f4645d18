use crate::{
    db::query::{
        ValidateError, operand,
        predicate::{Predicate, PredicateBuilder},
    },
    model::{EntityModel, Schema, UniqueModel},
    value::Value,
};
use serde_json::{Map, Value as Json};

///
/// UniqueKey
///
/// Equality values for every field of one unique constraint, in
/// constraint order.
///

#[derive(Clone, Debug, PartialEq)]
pub struct UniqueKey {
    pub constraint: String,
    pub values: Vec<(String, Value)>,
}

impl UniqueKey {
    #[must_use]
    pub fn to_predicate(&self) -> Predicate {
        Predicate::and(
            self.values
                .iter()
                .map(|(field, value)| Predicate::eq(field.clone(), value.clone()))
                .collect(),
        )
    }

    #[must_use]
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values.iter().find(|(f, _)| f == field).map(|(_, v)| v)
    }
}

///
/// UniqueWhere
///
/// A `where` that identifies at most one row: a complete unique key plus
/// optional extra filter conditions.
///

#[derive(Clone, Debug, PartialEq)]
pub struct UniqueWhere {
    pub key: UniqueKey,
    pub filter: Predicate,
}

impl UniqueWhere {
    #[must_use]
    pub fn to_predicate(&self) -> Predicate {
        Predicate::and(vec![self.key.to_predicate(), self.filter.clone()])
    }
}

/// Resolve a unique `where` document.
///
/// Single-field constraints are matched by a bare value or `{ equals }`;
/// compound constraints by their selector key (`{ a_b: { a, b } }`).
/// Constraints are tried in order, primary key first. Keys not consumed by
/// the chosen constraint are validated as an ordinary filter.
pub(crate) fn build_unique_where(
    schema: &Schema,
    entity: &EntityModel,
    raw: &Json,
) -> Result<UniqueWhere, ValidateError> {
    let Json::Object(map) = raw else {
        return Err(ValidateError::ExpectedShape {
            entity: entity.name.clone(),
            path: "where".to_string(),
            expected: "an object",
        });
    };

    let sets = entity.unique_sets();
    let mut chosen = None;
    for set in &sets {
        if let Some(key) = match_set(schema, entity, set, map)? {
            chosen = Some((set, key));
            break;
        }
    }

    let Some((set, key)) = chosen else {
        let expected: Vec<&str> = sets.iter().map(|s| s.name.as_str()).collect();
        return Err(ValidateError::NotUnique {
            entity: entity.name.clone(),
            detail: format!("expected one of: {}", expected.join(", ")),
        });
    };

    let consumed: Vec<&str> = if set.is_compound() {
        vec![set.name.as_str()]
    } else {
        set.fields.iter().map(String::as_str).collect()
    };

    let mut rest = Map::new();
    let mut extra = Vec::new();
    for (k, v) in map {
        if consumed.contains(&k.as_str()) {
            continue;
        }
        // Other compound selectors are plain equality conditions here.
        if let Some(other) = sets.iter().find(|s| s.is_compound() && s.name == *k) {
            let key = compound_key(schema, entity, other, v)?;
            extra.push(key.to_predicate());
        } else {
            rest.insert(k.clone(), v.clone());
        }
    }

    let mut filter = PredicateBuilder::new(schema).filter(entity, &Json::Object(rest))?;
    if !extra.is_empty() {
        extra.push(filter);
        filter = Predicate::and(extra);
    }

    Ok(UniqueWhere { key, filter })
}

/// Resolve a cursor: a unique key with no extra conditions.
pub(crate) fn build_cursor(
    schema: &Schema,
    entity: &EntityModel,
    raw: &Json,
) -> Result<UniqueKey, ValidateError> {
    let target = build_unique_where(schema, entity, raw)?;
    if !target.filter.is_trivially_true() {
        return Err(ValidateError::InvalidPagination {
            entity: entity.name.clone(),
            reason: "cursor must name exactly one unique key".to_string(),
        });
    }

    Ok(target.key)
}

fn match_set(
    schema: &Schema,
    entity: &EntityModel,
    set: &UniqueModel,
    map: &Map<String, Json>,
) -> Result<Option<UniqueKey>, ValidateError> {
    if set.is_compound() {
        return match map.get(&set.name) {
            Some(raw) => compound_key(schema, entity, set, raw).map(Some),
            None => Ok(None),
        };
    }

    let Some(name) = set.fields.first() else {
        return Ok(None);
    };
    let Some(field) = entity.field(name) else {
        return Ok(None);
    };
    let operand = match map.get(name) {
        Some(Json::Object(ops)) => match (ops.len(), ops.get("equals")) {
            (1, Some(v)) if !v.is_null() => v,
            _ => return Ok(None),
        },
        Some(Json::Null) | None => return Ok(None),
        Some(v) => v,
    };

    let value = operand::scalar(schema, entity, field, operand)?;

    Ok(Some(UniqueKey {
        constraint: set.name.clone(),
        values: vec![(name.clone(), value)],
    }))
}

fn compound_key(
    schema: &Schema,
    entity: &EntityModel,
    set: &UniqueModel,
    raw: &Json,
) -> Result<UniqueKey, ValidateError> {
    let incomplete = || ValidateError::NotUnique {
        entity: entity.name.clone(),
        detail: format!("'{}' requires {}", set.name, set.fields.join(", ")),
    };

    let Json::Object(parts) = raw else {
        return Err(incomplete());
    };
    if parts.len() != set.fields.len() {
        return Err(incomplete());
    }

    let mut values = Vec::with_capacity(set.fields.len());
    for name in &set.fields {
        let (Some(field), Some(raw)) = (entity.field(name), parts.get(name)) else {
            return Err(incomplete());
        };
        values.push((name.clone(), operand::scalar(schema, entity, field, raw)?));
    }

    Ok(UniqueKey {
        constraint: set.name.clone(),
        values,
    })
}
