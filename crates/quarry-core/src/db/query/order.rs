use crate::{
    db::query::{ValidateError, aggregate::AggregateFn},
    model::{EntityModel, ScalarType, Schema},
};
use serde_json::{Map, Value as Json};

///
/// Direction
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    #[must_use]
    pub const fn reverse(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

///
/// NullsOrder
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NullsOrder {
    First,
    Last,
}

///
/// OrderTarget
///
/// Field           → scalar of the queried entity
/// Relation        → scalar reached through a chain of to-one relations
/// RelationCount   → number of rows in a to-many relation
/// Aggregate       → aggregate output (groupBy only); field `_all` for row count
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OrderTarget {
    Field(String),
    Relation { path: Vec<String>, field: String },
    RelationCount(String),
    Aggregate { function: AggregateFn, field: String },
}

///
/// OrderTerm
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OrderTerm {
    pub target: OrderTarget,
    pub direction: Direction,
    pub nulls: Option<NullsOrder>,
}

impl OrderTerm {
    #[must_use]
    pub fn field(name: impl Into<String>, direction: Direction) -> Self {
        Self {
            target: OrderTarget::Field(name.into()),
            direction,
            nulls: None,
        }
    }
}

/// Build ordering terms from an `orderBy` document (one object or a list).
///
/// Aggregate targets are only accepted when `aggregates` is set.
pub(crate) fn build_order(
    schema: &Schema,
    entity: &EntityModel,
    raw: &Json,
    aggregates: bool,
) -> Result<Vec<OrderTerm>, ValidateError> {
    let items: Vec<&Json> = match raw {
        Json::Array(items) => items.iter().collect(),
        Json::Object(_) => vec![raw],
        _ => return Err(invalid(entity, "expected an object or a list of objects")),
    };

    let mut terms = Vec::with_capacity(items.len());
    for item in items {
        let (key, value) = single_entry(entity, item)?;
        terms.push(term(schema, entity, key, value, aggregates, Vec::new())?);
    }

    Ok(terms)
}

fn term(
    schema: &Schema,
    entity: &EntityModel,
    key: &str,
    value: &Json,
    aggregates: bool,
    path: Vec<String>,
) -> Result<OrderTerm, ValidateError> {
    if let Some(function) = AggregateFn::from_key(key) {
        if !aggregates || !path.is_empty() {
            return Err(invalid(entity, &format!("'{key}' is only valid in groupBy")));
        }
        let (field, sort) = single_entry(entity, value)?;
        function.check_field(entity, field)?;
        let (direction, nulls) = sort_spec(entity, sort, false)?;

        return Ok(OrderTerm {
            target: OrderTarget::Aggregate {
                function,
                field: field.to_string(),
            },
            direction,
            nulls,
        });
    }

    if let Some(field) = entity.field(key) {
        if field.list || field.ty == ScalarType::Json {
            return Err(invalid(
                entity,
                &format!("cannot order by '{key}' ({})", field.type_label()),
            ));
        }
        let (direction, nulls) = sort_spec(entity, value, field.nullable)?;
        let target = if path.is_empty() {
            OrderTarget::Field(key.to_string())
        } else {
            OrderTarget::Relation {
                path,
                field: key.to_string(),
            }
        };

        return Ok(OrderTerm {
            target,
            direction,
            nulls,
        });
    }

    if let Some(relation) = entity.relation(key) {
        if relation.is_to_many() {
            let (inner, sort) = single_entry(entity, value)?;
            if inner != "_count" || !path.is_empty() {
                return Err(invalid(
                    entity,
                    &format!("to-many relation '{key}' can only be ordered by _count"),
                ));
            }
            let (direction, _) = sort_spec(entity, sort, false)?;

            return Ok(OrderTerm {
                target: OrderTarget::RelationCount(key.to_string()),
                direction,
                nulls: None,
            });
        }

        let target = schema
            .entity(&relation.target)
            .ok_or_else(|| ValidateError::UnknownEntity(relation.target.clone()))?;
        let (inner, sort) = single_entry(target, value)?;
        let mut path = path;
        path.push(key.to_string());

        return term(schema, target, inner, sort, false, path);
    }

    Err(ValidateError::UnknownField {
        entity: entity.name.clone(),
        field: key.to_string(),
    })
}

fn sort_spec(
    entity: &EntityModel,
    value: &Json,
    nullable: bool,
) -> Result<(Direction, Option<NullsOrder>), ValidateError> {
    match value {
        Json::String(dir) => Ok((direction(entity, dir)?, None)),
        Json::Object(map) => {
            let mut sort = None;
            let mut nulls = None;
            for (key, value) in map {
                match (key.as_str(), value.as_str()) {
                    ("sort", Some(dir)) => sort = Some(direction(entity, dir)?),
                    ("nulls", Some("first")) => nulls = Some(NullsOrder::First),
                    ("nulls", Some("last")) => nulls = Some(NullsOrder::Last),
                    _ => return Err(invalid(entity, &format!("unexpected sort option '{key}'"))),
                }
            }
            if nulls.is_some() && !nullable {
                return Err(invalid(entity, "nulls ordering requires a nullable field"));
            }
            let sort = sort.ok_or_else(|| invalid(entity, "sort object requires 'sort'"))?;

            Ok((sort, nulls))
        }
        _ => Err(invalid(entity, "expected \"asc\", \"desc\" or a sort object")),
    }
}

fn direction(entity: &EntityModel, raw: &str) -> Result<Direction, ValidateError> {
    match raw {
        "asc" => Ok(Direction::Asc),
        "desc" => Ok(Direction::Desc),
        other => Err(invalid(entity, &format!("unknown sort direction '{other}'"))),
    }
}

fn single_entry<'a>(entity: &EntityModel, raw: &'a Json) -> Result<(&'a str, &'a Json), ValidateError> {
    let Json::Object(map) = raw else {
        return Err(invalid(entity, "expected an object"));
    };

    one_key(map).ok_or_else(|| invalid(entity, "each orderBy object must have exactly one key"))
}

fn one_key(map: &Map<String, Json>) -> Option<(&str, &Json)> {
    let mut entries = map.iter();
    let (key, value) = entries.next()?;

    entries.next().is_none().then_some((key.as_str(), value))
}

fn invalid(entity: &EntityModel, reason: &str) -> ValidateError {
    ValidateError::InvalidOrderBy {
        entity: entity.name.clone(),
        reason: reason.to_string(),
    }
}
