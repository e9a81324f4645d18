use crate::{
    db::query::{
        ValidateError, operand,
        unique::build_unique_where,
        write::{CreateData, FieldUpdate, RelationOp, RelationWrite, UpdateData},
    },
    model::{EntityModel, FieldModel, RelationLink, RelationModel, ScalarType, Schema},
};
use serde_json::{Map, Value as Json};
use std::collections::BTreeSet;

///
/// WriteBuilder
///
/// Validates create/update payloads against one schema.
///

pub(crate) struct WriteBuilder<'a> {
    schema: &'a Schema,
    nested: bool,
}

impl<'a> WriteBuilder<'a> {
    /// Builder for single-row writes, which may carry nested relation writes.
    pub(crate) const fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            nested: true,
        }
    }

    /// Builder for batch rows: relation keys are rejected.
    pub(crate) const fn flat(schema: &'a Schema) -> Self {
        Self {
            schema,
            nested: false,
        }
    }

    //
    // Create
    //

    pub(crate) fn create(&self, entity: &EntityModel, raw: &Json) -> Result<CreateData, ValidateError> {
        self.create_with(entity, raw, &[])
    }

    // `implied` names foreign key fields the parent of a nested create fills in.
    fn create_with(
        &self,
        entity: &EntityModel,
        raw: &Json,
        implied: &[String],
    ) -> Result<CreateData, ValidateError> {
        let map = object(entity, raw, "data")?;
        let mut values = Vec::new();
        let mut relations = Vec::new();

        for (key, value) in map {
            if let Some(field) = entity.field(key) {
                if implied.contains(key) {
                    return Err(ValidateError::InvalidRelationWrite {
                        entity: entity.name.clone(),
                        relation: key.clone(),
                        reason: "set by the parent of this nested create".to_string(),
                    });
                }
                let value = unwrap_set(field, value);
                values.push((key.clone(), operand::field_value(self.schema, entity, field, value)?));
            } else if let Some(relation) = entity.relation(key) {
                if !self.nested {
                    return Err(ValidateError::NestedWriteInBatch {
                        entity: entity.name.clone(),
                        relation: key.clone(),
                    });
                }
                relations.push(self.relation_write(entity, relation, value, false)?);
            } else {
                return Err(unknown(entity, key));
            }
        }

        check_foreign_keys(entity, values.iter().map(|(f, _)| f.as_str()), &relations)?;

        // Required scalars must come from the payload, a relation write, or the parent.
        let mut covered: BTreeSet<&str> = values.iter().map(|(f, _)| f.as_str()).collect();
        covered.extend(implied.iter().map(String::as_str));
        for write in &relations {
            if let Some((fields, _)) = entity
                .relation(&write.relation)
                .and_then(RelationModel::owned_keys)
            {
                covered.extend(fields.iter().map(String::as_str));
            }
        }

        for field in entity.fields.iter().filter(|f| f.is_required_on_create()) {
            if covered.contains(field.name.as_str()) {
                continue;
            }
            let owner = entity.relations.iter().find(|r| {
                r.owned_keys()
                    .is_some_and(|(fields, _)| fields.contains(&field.name))
            });

            return Err(match owner {
                Some(relation) => ValidateError::MissingRequired {
                    entity: entity.name.clone(),
                    field: relation.name.clone(),
                    kind: "relation",
                },
                None => ValidateError::MissingRequired {
                    entity: entity.name.clone(),
                    field: field.name.clone(),
                    kind: "field",
                },
            });
        }

        // Schema order keeps plans deterministic.
        values.sort_by_key(|(name, _)| entity.fields.iter().position(|f| &f.name == name));

        Ok(CreateData { values, relations })
    }

    //
    // Update
    //

    pub(crate) fn update(&self, entity: &EntityModel, raw: &Json) -> Result<UpdateData, ValidateError> {
        let map = object(entity, raw, "data")?;
        let mut values = Vec::new();
        let mut relations = Vec::new();

        for (key, value) in map {
            if let Some(field) = entity.field(key) {
                values.push((key.clone(), self.field_update(entity, field, value)?));
            } else if let Some(relation) = entity.relation(key) {
                if !self.nested {
                    return Err(ValidateError::InvalidRelationWrite {
                        entity: entity.name.clone(),
                        relation: key.clone(),
                        reason: "relation writes are not allowed in bulk updates".to_string(),
                    });
                }
                relations.push(self.relation_write(entity, relation, value, true)?);
            } else {
                return Err(unknown(entity, key));
            }
        }

        check_foreign_keys(entity, values.iter().map(|(f, _)| f.as_str()), &relations)?;
        values.sort_by_key(|(name, _)| entity.fields.iter().position(|f| &f.name == name));

        Ok(UpdateData { values, relations })
    }

    fn field_update(
        &self,
        entity: &EntityModel,
        field: &FieldModel,
        raw: &Json,
    ) -> Result<FieldUpdate, ValidateError> {
        let ops = match raw {
            Json::Object(ops) if field.ty != ScalarType::Json || is_single(ops, "set") => ops,
            _ => {
                return Ok(FieldUpdate::Set(operand::field_value(
                    self.schema, entity, field, raw,
                )?));
            }
        };

        let mut entries = ops.iter();
        let (Some((key, operand)), None) = (entries.next(), entries.next()) else {
            return Err(ValidateError::ExpectedShape {
                entity: entity.name.clone(),
                path: field.name.clone(),
                expected: "a value or an object with exactly one update operation",
            });
        };

        let atomic = |wrap: fn(crate::value::Value) -> FieldUpdate| {
            if field.list || !field.ty.is_numeric() {
                return Err(ValidateError::InvalidAtomicOperation {
                    entity: entity.name.clone(),
                    field: field.name.clone(),
                    operation: key.clone(),
                });
            }

            Ok(wrap(operand::scalar(self.schema, entity, field, operand)?))
        };

        match key.as_str() {
            "set" => Ok(FieldUpdate::Set(operand::field_value(
                self.schema, entity, field, operand,
            )?)),
            "increment" => atomic(FieldUpdate::Increment),
            "decrement" => atomic(FieldUpdate::Decrement),
            "multiply" => atomic(FieldUpdate::Multiply),
            "divide" => atomic(FieldUpdate::Divide),
            "push" if field.list => {
                let value = if operand.is_array() {
                    operand::list(self.schema, entity, field, operand)?
                } else {
                    operand::scalar(self.schema, entity, field, operand)?
                };

                Ok(FieldUpdate::Push(value))
            }
            "push" => Err(ValidateError::InvalidAtomicOperation {
                entity: entity.name.clone(),
                field: field.name.clone(),
                operation: key.clone(),
            }),
            other => Err(unknown(entity, &format!("{}.{other}", field.name))),
        }
    }

    //
    // Relations
    //

    fn relation_write(
        &self,
        entity: &EntityModel,
        relation: &RelationModel,
        raw: &Json,
        updating: bool,
    ) -> Result<RelationWrite, ValidateError> {
        let invalid = |reason: &str| ValidateError::InvalidRelationWrite {
            entity: entity.name.clone(),
            relation: relation.name.clone(),
            reason: reason.to_string(),
        };

        let target = self
            .schema
            .entity(&relation.target)
            .ok_or_else(|| ValidateError::UnknownEntity(relation.target.clone()))?;
        let map = object(entity, raw, &relation.name)?;
        if map.is_empty() {
            return Err(invalid("expected connect, create or disconnect"));
        }

        // Fields on the target filled in by linking it to this row.
        let implied: Vec<String> = match &relation.link {
            RelationLink::Inverse { relation: inverse } => target
                .relation(inverse)
                .and_then(RelationModel::owned_keys)
                .map(|(fields, _)| fields.to_vec())
                .unwrap_or_default(),
            RelationLink::Owned { .. } => Vec::new(),
        };

        let mut ops = Vec::new();
        for (key, value) in map {
            let items: Vec<&Json> = match value {
                Json::Array(items) if relation.is_to_many() => items.iter().collect(),
                Json::Array(_) => return Err(invalid("to-one relations take a single object")),
                other => vec![other],
            };

            for item in items {
                let op = match key.as_str() {
                    "connect" => RelationOp::Connect(build_unique_where(self.schema, target, item)?),
                    "create" => RelationOp::Create(self.create_with(target, item, &implied)?),
                    "disconnect" if !updating => {
                        return Err(invalid("disconnect is only valid in updates"));
                    }
                    "disconnect" => self.disconnect(entity, relation, target, item)?,
                    other => return Err(invalid(&format!("unknown operation '{other}'"))),
                };
                ops.push(op);
            }
        }

        if !relation.is_to_many() && ops.len() > 1 {
            return Err(invalid("a to-one relation takes exactly one operation"));
        }

        Ok(RelationWrite {
            relation: relation.name.clone(),
            ops,
        })
    }

    fn disconnect(
        &self,
        entity: &EntityModel,
        relation: &RelationModel,
        target: &EntityModel,
        raw: &Json,
    ) -> Result<RelationOp, ValidateError> {
        let invalid = |reason: &str| ValidateError::InvalidRelationWrite {
            entity: entity.name.clone(),
            relation: relation.name.clone(),
            reason: reason.to_string(),
        };

        // The side holding the foreign key must be able to go null.
        let optional = match &relation.link {
            RelationLink::Owned { .. } => relation.nullable,
            RelationLink::Inverse { relation: inverse } => {
                target.relation(inverse).is_some_and(|owner| owner.nullable)
            }
        };
        if !optional {
            return Err(invalid("cannot disconnect a required relation"));
        }

        if relation.is_to_many() {
            return Ok(RelationOp::Disconnect(Some(build_unique_where(
                self.schema,
                target,
                raw,
            )?)));
        }

        match raw {
            Json::Bool(true) => Ok(RelationOp::Disconnect(None)),
            _ => Err(invalid("to-one disconnect takes `true`")),
        }
    }
}

fn check_foreign_keys<'f>(
    entity: &EntityModel,
    scalars: impl Iterator<Item = &'f str>,
    relations: &[RelationWrite],
) -> Result<(), ValidateError> {
    let scalars: BTreeSet<&str> = scalars.collect();

    for write in relations {
        let Some((fields, _)) = entity
            .relation(&write.relation)
            .and_then(RelationModel::owned_keys)
        else {
            continue;
        };
        if let Some(field) = fields.iter().find(|f| scalars.contains(f.as_str())) {
            return Err(ValidateError::RelationAndForeignKey {
                entity: entity.name.clone(),
                relation: write.relation.clone(),
                field: field.clone(),
            });
        }
    }

    Ok(())
}

// Create payloads accept `{ set: [...] }` for list fields.
fn unwrap_set<'j>(field: &FieldModel, raw: &'j Json) -> &'j Json {
    match raw {
        Json::Object(map) if field.list && is_single(map, "set") => &map["set"],
        _ => raw,
    }
}

fn is_single(map: &Map<String, Json>, key: &str) -> bool {
    map.len() == 1 && map.contains_key(key)
}

fn object<'j>(entity: &EntityModel, raw: &'j Json, path: &str) -> Result<&'j Map<String, Json>, ValidateError> {
    raw.as_object().ok_or_else(|| ValidateError::ExpectedShape {
        entity: entity.name.clone(),
        path: path.to_string(),
        expected: "an object",
    })
}

fn unknown(entity: &EntityModel, key: &str) -> ValidateError {
    ValidateError::UnknownField {
        entity: entity.name.clone(),
        field: key.to_string(),
    }
}
