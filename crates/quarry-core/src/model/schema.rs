use crate::{
    error::ConfigError,
    model::{
        entity::EntityModel,
        field::{DefaultValue, FieldModel, ScalarType},
        relation::{Cardinality, RelationLink, RelationModel},
    },
    value::Value,
};
use std::collections::{BTreeMap, BTreeSet};

// Keys with a fixed meaning in filter, selection and aggregate arguments.
const RESERVED_NAMES: [&str; 3] = ["AND", "OR", "NOT"];

///
/// EnumModel
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EnumModel {
    pub name: String,
    pub variants: Vec<String>,
}

impl EnumModel {
    #[must_use]
    pub fn new(name: impl Into<String>, variants: &[&str]) -> Self {
        Self {
            name: name.into(),
            variants: variants.iter().map(ToString::to_string).collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, variant: &str) -> bool {
        self.variants.iter().any(|v| v == variant)
    }
}

///
/// SchemaDescription
///
/// Read-only view returned by `Schema::describe`.
///

#[derive(Clone, Copy, Debug)]
pub struct SchemaDescription<'a> {
    pub entities: &'a [EntityModel],
    pub enums: &'a [EnumModel],
}

///
/// JoinKeys
///
/// Column pairing for one relation hop: `row[local[i]] == related[remote[i]]`.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JoinKeys {
    pub local: Vec<String>,
    pub remote: Vec<String>,
}

///
/// Schema
///
/// Validated registry of entities and enums. Built once, then shared
/// read-only (typically behind an `Arc`).
///

#[derive(Clone, Debug)]
pub struct Schema {
    entities: Vec<EntityModel>,
    enums: Vec<EnumModel>,
    entity_index: BTreeMap<String, usize>,
}

impl Schema {
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    #[must_use]
    pub fn describe(&self) -> SchemaDescription<'_> {
        SchemaDescription {
            entities: &self.entities,
            enums: &self.enums,
        }
    }

    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&EntityModel> {
        self.entity_index.get(name).map(|&i| &self.entities[i])
    }

    #[must_use]
    pub fn entities(&self) -> &[EntityModel] {
        &self.entities
    }

    #[must_use]
    pub fn enum_model(&self, name: &str) -> Option<&EnumModel> {
        self.enums.iter().find(|e| e.name == name)
    }

    /// Resolve how rows of `entity` pair with rows reached through `relation`.
    #[must_use]
    pub fn join_keys(&self, entity: &EntityModel, relation: &RelationModel) -> Option<JoinKeys> {
        match &relation.link {
            RelationLink::Owned {
                fields, references, ..
            } => Some(JoinKeys {
                local: fields.clone(),
                remote: references.clone(),
            }),
            RelationLink::Inverse { relation: inverse } => {
                let owner = self.entity(&relation.target)?.relation(inverse)?;
                let (fields, references) = owner.owned_keys()?;
                debug_assert_eq!(owner.target, entity.name);

                Some(JoinKeys {
                    local: references.to_vec(),
                    remote: fields.to_vec(),
                })
            }
        }
    }

    /// Owning relations on any entity that point at `target`.
    pub fn back_references<'a>(
        &'a self,
        target: &'a str,
    ) -> impl Iterator<Item = (&'a EntityModel, &'a RelationModel)> + 'a {
        self.entities.iter().flat_map(move |entity| {
            entity
                .relations
                .iter()
                .filter(move |rel| rel.is_owning() && rel.target == target)
                .map(move |rel| (entity, rel))
        })
    }
}

///
/// SchemaBuilder
///

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entities: Vec<EntityModel>,
    enums: Vec<EnumModel>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn entity(mut self, entity: EntityModel) -> Self {
        self.entities.push(entity);
        self
    }

    #[must_use]
    pub fn enumeration(mut self, model: EnumModel) -> Self {
        self.enums.push(model);
        self
    }

    /// Validate every cross reference and freeze the schema.
    pub fn build(self) -> Result<Schema, ConfigError> {
        if self.entities.is_empty() {
            return Err(ConfigError::EmptySchema);
        }

        let mut enum_names = BTreeSet::new();
        for model in &self.enums {
            if !enum_names.insert(model.name.as_str()) {
                return Err(ConfigError::DuplicateEnum {
                    name: model.name.clone(),
                });
            }
            if model.variants.is_empty() {
                return Err(ConfigError::EmptyEnum {
                    name: model.name.clone(),
                });
            }
        }

        let mut entity_index = BTreeMap::new();
        for (i, entity) in self.entities.iter().enumerate() {
            if entity_index.insert(entity.name.clone(), i).is_some() {
                return Err(ConfigError::DuplicateEntity {
                    entity: entity.name.clone(),
                });
            }
        }

        let schema = Schema {
            entities: self.entities,
            enums: self.enums,
            entity_index,
        };

        for entity in &schema.entities {
            validate_members(entity)?;
            validate_keys(entity)?;
            for field in &entity.fields {
                validate_field(&schema, entity, field)?;
            }
        }

        // Relations are checked once every entity's own members are known good.
        for entity in &schema.entities {
            for relation in &entity.relations {
                validate_relation(&schema, entity, relation)?;
            }
        }

        Ok(schema)
    }
}

fn validate_members(entity: &EntityModel) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    let names = entity
        .fields
        .iter()
        .map(|f| f.name.as_str())
        .chain(entity.relations.iter().map(|r| r.name.as_str()));

    for name in names {
        if name.starts_with('_') || RESERVED_NAMES.contains(&name) {
            return Err(ConfigError::ReservedName {
                entity: entity.name.clone(),
                name: name.to_string(),
            });
        }
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateMember {
                entity: entity.name.clone(),
                name: name.to_string(),
            });
        }
    }

    Ok(())
}

fn validate_keys(entity: &EntityModel) -> Result<(), ConfigError> {
    if entity.primary_key.is_empty() {
        return Err(ConfigError::MissingPrimaryKey {
            entity: entity.name.clone(),
        });
    }

    let key_sets = std::iter::once(("primary key", &entity.primary_key))
        .chain(entity.uniques.iter().map(|u| ("unique constraint", &u.fields)));

    for (context, fields) in key_sets {
        for name in fields {
            let Some(field) = entity.field(name) else {
                return Err(ConfigError::UnknownKeyField {
                    entity: entity.name.clone(),
                    field: name.clone(),
                    context,
                });
            };
            if field.list {
                return Err(ConfigError::ListKeyField {
                    entity: entity.name.clone(),
                    field: name.clone(),
                    context,
                });
            }
        }
    }

    Ok(())
}

fn validate_field(
    schema: &Schema,
    entity: &EntityModel,
    field: &FieldModel,
) -> Result<(), ConfigError> {
    let invalid_default = |reason: &str| ConfigError::InvalidDefault {
        entity: entity.name.clone(),
        field: field.name.clone(),
        reason: reason.to_string(),
    };

    let enum_model = match &field.ty {
        ScalarType::Enum(name) => Some(schema.enum_model(name).ok_or_else(|| {
            ConfigError::UnknownEnum {
                entity: entity.name.clone(),
                field: field.name.clone(),
                name: name.clone(),
            }
        })?),
        _ => None,
    };

    if field.updated_at && field.ty != ScalarType::DateTime {
        return Err(invalid_default("updated_at requires a DateTime field"));
    }

    match &field.default {
        None => {}
        Some(DefaultValue::AutoIncrement) if field.ty != ScalarType::Int || field.list => {
            return Err(invalid_default("autoincrement requires a scalar Int field"));
        }
        Some(DefaultValue::Now) if field.ty != ScalarType::DateTime || field.list => {
            return Err(invalid_default("now requires a scalar DateTime field"));
        }
        Some(DefaultValue::Uuid) if field.ty != ScalarType::Text || field.list => {
            return Err(invalid_default("uuid requires a scalar Text field"));
        }
        Some(DefaultValue::Static(value)) => {
            check_static_default(field, value, enum_model)
                .map_err(|reason| invalid_default(&reason))?;
        }
        Some(_) => {}
    }

    Ok(())
}

fn check_static_default(
    field: &FieldModel,
    value: &Value,
    enum_model: Option<&EnumModel>,
) -> Result<(), String> {
    if value.is_null() {
        return if field.nullable {
            Ok(())
        } else {
            Err("null default on a required field".to_string())
        };
    }

    let items: Vec<&Value> = match (field.list, value) {
        (true, Value::List(items)) => items.iter().collect(),
        (true, other) => return Err(format!("expected a list, found {}", other.kind_label())),
        (false, other) => vec![other],
    };

    for item in items {
        let Some(coerced) = item.clone().coerce_to(&field.ty) else {
            return Err(format!(
                "expected {}, found {}",
                field.ty,
                item.kind_label()
            ));
        };
        if let (Some(model), Value::Enum(variant)) = (enum_model, &coerced)
            && !model.contains(variant)
        {
            return Err(format!("'{variant}' is not a variant of {}", model.name));
        }
    }

    Ok(())
}

fn validate_relation(
    schema: &Schema,
    entity: &EntityModel,
    relation: &RelationModel,
) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidRelation {
        entity: entity.name.clone(),
        relation: relation.name.clone(),
        reason,
    };

    let Some(target) = schema.entity(&relation.target) else {
        return Err(ConfigError::UnknownRelationTarget {
            entity: entity.name.clone(),
            relation: relation.name.clone(),
            target: relation.target.clone(),
        });
    };

    if relation.is_to_many() && relation.nullable {
        return Err(invalid("to-many relations cannot be nullable".to_string()));
    }

    match &relation.link {
        RelationLink::Owned {
            fields, references, ..
        } => {
            if relation.cardinality == Cardinality::Many {
                return Err(invalid(
                    "a to-many relation cannot hold foreign key fields".to_string(),
                ));
            }
            if fields.is_empty() || fields.len() != references.len() {
                return Err(invalid(format!(
                    "{} foreign key field(s) for {} reference(s)",
                    fields.len(),
                    references.len()
                )));
            }

            for (local, remote) in fields.iter().zip(references) {
                let Some(local_field) = entity.field(local) else {
                    return Err(invalid(format!("unknown foreign key field '{local}'")));
                };
                let Some(remote_field) = target.field(remote) else {
                    return Err(invalid(format!(
                        "unknown referenced field '{}.{remote}'",
                        target.name
                    )));
                };
                if local_field.ty != remote_field.ty || local_field.list || remote_field.list {
                    return Err(invalid(format!(
                        "'{local}' ({}) does not match '{}.{remote}' ({})",
                        local_field.type_label(),
                        target.name,
                        remote_field.type_label()
                    )));
                }
                if local_field.nullable != relation.nullable {
                    return Err(invalid(format!(
                        "nullability of '{local}' does not match the relation"
                    )));
                }
            }

            if !target.is_unique_set(references) {
                return Err(invalid(format!(
                    "referenced fields on '{}' are not a unique set",
                    target.name
                )));
            }
        }
        RelationLink::Inverse { relation: inverse } => {
            let owner = target.relation(inverse).ok_or_else(|| {
                invalid(format!("'{}' has no relation '{inverse}'", target.name))
            })?;
            if !owner.is_owning() || owner.target != entity.name {
                return Err(invalid(format!(
                    "'{}.{inverse}' is not an owning relation to '{}'",
                    target.name, entity.name
                )));
            }
        }
    }

    Ok(())
}
