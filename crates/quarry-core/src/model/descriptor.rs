//! Declarative JSON schema descriptor.
//!
//! ```json
//! {
//!   "enums": [{ "name": "Role", "variants": ["admin", "staff"] }],
//!   "entities": [{
//!     "name": "User",
//!     "primaryKey": ["id"],
//!     "uniques": [{ "fields": ["email"] }],
//!     "fields": [
//!       { "name": "id", "type": "Int", "default": "autoincrement" },
//!       { "name": "email", "type": "Text" },
//!       { "name": "role", "type": "Role", "default": { "value": "staff" } }
//!     ],
//!     "relations": [
//!       { "name": "sessions", "target": "Session", "cardinality": "many", "inverse": "user" }
//!     ]
//!   }]
//! }
//! ```
//!
//! A `type` that is not a built-in scalar name refers to a declared enum.

use crate::{
    error::ConfigError,
    model::{
        entity::{EntityModel, UniqueModel},
        field::{DefaultValue, FieldModel, ScalarType},
        relation::{Cardinality, ReferentialAction, RelationLink, RelationModel},
        schema::{EnumModel, Schema},
    },
    value::Value,
};
use serde::Deserialize;
use serde_json::Value as Json;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaDto {
    #[serde(default)]
    enums: Vec<EnumDto>,
    entities: Vec<EntityDto>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EnumDto {
    name: String,
    variants: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct EntityDto {
    name: String,
    primary_key: Vec<String>,
    #[serde(default)]
    uniques: Vec<UniqueDto>,
    fields: Vec<FieldDto>,
    #[serde(default)]
    relations: Vec<RelationDto>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct UniqueDto {
    name: Option<String>,
    fields: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct FieldDto {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    nullable: bool,
    #[serde(default)]
    list: bool,
    default: Option<DefaultDto>,
    #[serde(default)]
    updated_at: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DefaultDto {
    Keyword(DefaultKeyword),
    Static { value: Json },
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum DefaultKeyword {
    Autoincrement,
    Now,
    Uuid,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum CardinalityDto {
    One,
    Many,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RelationDto {
    name: String,
    target: String,
    cardinality: CardinalityDto,
    #[serde(default)]
    nullable: bool,
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default)]
    references: Vec<String>,
    on_delete: Option<ReferentialAction>,
    inverse: Option<String>,
}

impl Schema {
    /// Build and validate a schema from its JSON descriptor.
    pub fn from_json(descriptor: &Json) -> Result<Self, ConfigError> {
        let dto = SchemaDto::deserialize(descriptor)
            .map_err(|err| ConfigError::InvalidDescriptor(err.to_string()))?;

        let mut builder = Self::builder();
        for model in dto.enums {
            builder = builder.enumeration(EnumModel {
                name: model.name,
                variants: model.variants,
            });
        }
        for entity in dto.entities {
            builder = builder.entity(entity_from_dto(entity)?);
        }

        builder.build()
    }

    /// Parse a JSON descriptor document.
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        let json: Json = serde_json::from_str(source)
            .map_err(|err| ConfigError::InvalidDescriptor(err.to_string()))?;

        Self::from_json(&json)
    }
}

fn entity_from_dto(dto: EntityDto) -> Result<EntityModel, ConfigError> {
    let mut entity = EntityModel::new(dto.name);
    entity.primary_key = dto.primary_key;
    entity.uniques = dto
        .uniques
        .into_iter()
        .map(|u| UniqueModel {
            name: u.name.unwrap_or_else(|| u.fields.join("_")),
            fields: u.fields,
        })
        .collect();

    for field in dto.fields {
        let model = field_from_dto(&entity.name, field)?;
        entity.fields.push(model);
    }
    for relation in dto.relations {
        let model = relation_from_dto(&entity.name, relation)?;
        entity.relations.push(model);
    }

    Ok(entity)
}

fn field_from_dto(entity: &str, dto: FieldDto) -> Result<FieldModel, ConfigError> {
    let ty = match dto.ty.as_str() {
        "Text" | "String" => ScalarType::Text,
        "Int" => ScalarType::Int,
        "Float" => ScalarType::Float,
        "Decimal" => ScalarType::Decimal,
        "Boolean" => ScalarType::Boolean,
        "DateTime" => ScalarType::DateTime,
        "Json" => ScalarType::Json,
        other => ScalarType::Enum(other.to_string()),
    };

    let default = match dto.default {
        None => None,
        Some(DefaultDto::Keyword(DefaultKeyword::Autoincrement)) => {
            Some(DefaultValue::AutoIncrement)
        }
        Some(DefaultDto::Keyword(DefaultKeyword::Now)) => Some(DefaultValue::Now),
        Some(DefaultDto::Keyword(DefaultKeyword::Uuid)) => Some(DefaultValue::Uuid),
        Some(DefaultDto::Static { value }) => {
            let parsed = if dto.list {
                Value::from_json_list(&value, &ty)
            } else {
                Value::from_json(&value, &ty)
            };
            let value = parsed.map_err(|err| ConfigError::InvalidDefault {
                entity: entity.to_string(),
                field: dto.name.clone(),
                reason: err.to_string(),
            })?;

            Some(DefaultValue::Static(value))
        }
    };

    Ok(FieldModel {
        name: dto.name,
        ty,
        nullable: dto.nullable,
        list: dto.list,
        default,
        updated_at: dto.updated_at,
    })
}

fn relation_from_dto(entity: &str, dto: RelationDto) -> Result<RelationModel, ConfigError> {
    let cardinality = match dto.cardinality {
        CardinalityDto::One => Cardinality::One,
        CardinalityDto::Many => Cardinality::Many,
    };

    let link = match dto.inverse {
        Some(relation) if dto.fields.is_empty() && dto.references.is_empty() => {
            RelationLink::Inverse { relation }
        }
        Some(_) => {
            return Err(ConfigError::InvalidRelation {
                entity: entity.to_string(),
                relation: dto.name,
                reason: "declares both 'inverse' and foreign key fields".to_string(),
            });
        }
        None => RelationLink::Owned {
            fields: dto.fields,
            references: dto.references,
            on_delete: dto.on_delete,
        },
    };

    Ok(RelationModel {
        name: dto.name,
        target: dto.target,
        cardinality,
        nullable: dto.nullable,
        link,
    })
}
