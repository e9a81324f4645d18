use crate::{
    db::{
        backend::{AggregateRow, GroupRow, RawCell, RawRow},
        query::{
            aggregate::{AggregateFn, AggregateSelection, GroupBySpec},
            selection::Selection,
        },
        response::{Field, Record},
    },
    error::BackendFailure,
    model::{EntityModel, FieldModel, ScalarType, Schema},
    value::Value,
};

/// Shape raw backend rows into records matching `selection`.
pub fn shape(schema: &Schema, rows: Vec<RawRow>, selection: &Selection) -> Result<Vec<Record>, BackendFailure> {
    rows.into_iter()
        .map(|row| shape_row(schema, row, selection))
        .collect()
}

pub(crate) fn shape_row(schema: &Schema, mut row: RawRow, selection: &Selection) -> Result<Record, BackendFailure> {
    let entity = schema
        .entity(&selection.entity)
        .ok_or_else(|| BackendFailure::malformed(&selection.entity, "unknown entity"))?;
    let mut record = Record::new(&entity.name);

    for name in &selection.fields {
        let field = entity
            .field(name)
            .ok_or_else(|| BackendFailure::malformed(&entity.name, format!("unknown field '{name}'")))?;
        let value = match row.remove(name) {
            None => Value::Null,
            Some(RawCell::Value(value)) => coerce(entity, field, value)?,
            Some(_) => {
                return Err(BackendFailure::malformed(
                    &entity.name,
                    format!("'{name}' came back as a relation"),
                ));
            }
        };
        record.push(name.clone(), Field::Value(value));
    }

    // Relations follow the schema's declaration order.
    let mut included: Vec<_> = selection.relations.iter().collect();
    included.sort_by_key(|r| entity.relations.iter().position(|m| m.name == r.relation));

    for relation in included {
        let malformed = || {
            BackendFailure::malformed(
                &entity.name,
                format!("relation '{}' has the wrong cardinality", relation.relation),
            )
        };
        let field = match (relation.to_many, row.remove(&relation.relation)) {
            (true, None | Some(RawCell::Value(Value::Null))) => Field::Many(Vec::new()),
            (true, Some(RawCell::Many(rows))) => Field::Many(shape(schema, rows, &relation.selection)?),
            (false, None | Some(RawCell::One(None) | RawCell::Value(Value::Null))) => Field::One(None),
            (false, Some(RawCell::One(Some(nested)))) => {
                Field::One(Some(shape_row(schema, nested, &relation.selection)?))
            }
            _ => return Err(malformed()),
        };
        record.push(relation.relation.clone(), field);
    }

    if !selection.counts.is_empty() {
        let mut raw = match row.remove("_count") {
            Some(RawCell::One(Some(raw))) => raw,
            None | Some(RawCell::One(None)) => RawRow::new(),
            Some(_) => return Err(BackendFailure::malformed(&entity.name, "'_count' is not an object")),
        };
        let mut counts = Record::new(&entity.name);
        for count in &selection.counts {
            let value = match raw.remove(&count.relation) {
                None => Value::Int(0),
                Some(RawCell::Value(value)) => value.coerce_to(&ScalarType::Int).ok_or_else(|| {
                    BackendFailure::malformed(&entity.name, format!("_count.{} is not an integer", count.relation))
                })?,
                Some(_) => {
                    return Err(BackendFailure::malformed(
                        &entity.name,
                        format!("_count.{} is not an integer", count.relation),
                    ));
                }
            };
            counts.push(count.relation.clone(), Field::Value(value));
        }
        record.push("_count", Field::Object(counts));
    }

    Ok(record)
}

/// `{ _count: {..}, _min: {..}, ... }` with only the requested functions.
pub(crate) fn shape_aggregate(
    entity: &EntityModel,
    selection: &AggregateSelection,
    row: &AggregateRow,
) -> Result<Record, BackendFailure> {
    let mut record = Record::new(&entity.name);
    append_aggregates(entity, selection, row, &mut record)?;

    Ok(record)
}

/// One record per group: the `by` keys in request order, then aggregates.
pub(crate) fn shape_groups(
    entity: &EntityModel,
    spec: &GroupBySpec,
    groups: Vec<GroupRow>,
) -> Result<Vec<Record>, BackendFailure> {
    groups
        .into_iter()
        .map(|group| {
            let mut record = Record::new(&entity.name);
            let mut keys = group.keys;
            for name in &spec.by {
                let field = entity
                    .field(name)
                    .ok_or_else(|| BackendFailure::malformed(&entity.name, format!("unknown field '{name}'")))?;
                let value = keys
                    .iter()
                    .position(|(k, _)| k == name)
                    .map_or(Value::Null, |i| keys.swap_remove(i).1);
                record.push(name.clone(), Field::Value(coerce(entity, field, value)?));
            }
            append_aggregates(entity, &spec.aggregates, &group.aggregates, &mut record)?;

            Ok(record)
        })
        .collect()
}

fn append_aggregates(
    entity: &EntityModel,
    selection: &AggregateSelection,
    row: &AggregateRow,
    record: &mut Record,
) -> Result<(), BackendFailure> {
    for function in AggregateFn::ALL {
        let fields = selection.fields(function);
        if fields.is_empty() {
            continue;
        }

        let mut object = Record::new(&entity.name);
        for name in fields {
            let ty = function.output_type(entity.field(name));
            let value = match row.get(function, name) {
                Some(value) => value.clone().coerce_to(&ty).ok_or_else(|| {
                    BackendFailure::malformed(
                        &entity.name,
                        format!("{function}.{name} is not {ty}"),
                    )
                })?,
                None if function == AggregateFn::Count => Value::Int(0),
                None => Value::Null,
            };
            object.push(name.clone(), Field::Value(value));
        }
        record.push(function.key(), Field::Object(object));
    }

    Ok(())
}

fn coerce(entity: &EntityModel, field: &FieldModel, value: Value) -> Result<Value, BackendFailure> {
    let mismatch = |found: &str| {
        BackendFailure::malformed(
            &entity.name,
            format!("'{}' expected {}, got {found}", field.name, field.type_label()),
        )
    };

    match value {
        Value::List(items) if field.list => items
            .into_iter()
            .map(|item| {
                let found = item.kind_label();
                item.coerce_to(&field.ty).ok_or_else(|| mismatch(found))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Value::Null => Ok(Value::Null),
        _ if field.list => Err(mismatch(value.kind_label())),
        other => {
            let found = other.kind_label();
            other.coerce_to(&field.ty).ok_or_else(|| mismatch(found))
        }
    }
}
