//! Typed reading of JSON operands against declared field types.

use crate::{
    db::query::ValidateError,
    model::{EntityModel, FieldModel, ScalarType, Schema},
    value::{JsonConvertError, Value},
};
use serde_json::Value as Json;

pub(crate) fn mismatch(
    entity: &EntityModel,
    field: &FieldModel,
    expected: impl Into<String>,
    found: impl Into<String>,
) -> ValidateError {
    ValidateError::TypeMismatch {
        entity: entity.name.clone(),
        field: field.name.clone(),
        expected: expected.into(),
        found: found.into(),
    }
}

fn convert_err(entity: &EntityModel, field: &FieldModel, err: JsonConvertError) -> ValidateError {
    mismatch(entity, field, err.expected, err.found)
}

/// One non-null element of the field's scalar type.
pub(crate) fn scalar(
    schema: &Schema,
    entity: &EntityModel,
    field: &FieldModel,
    json: &Json,
) -> Result<Value, ValidateError> {
    if json.is_null() {
        return Err(mismatch(entity, field, field.ty.to_string(), "null"));
    }

    let value = Value::from_json(json, &field.ty).map_err(|err| convert_err(entity, field, err))?;
    check_variants(schema, entity, field, &value)?;

    Ok(value)
}

/// A JSON array of non-null elements of the field's scalar type.
pub(crate) fn list(
    schema: &Schema,
    entity: &EntityModel,
    field: &FieldModel,
    json: &Json,
) -> Result<Value, ValidateError> {
    let value =
        Value::from_json_list(json, &field.ty).map_err(|err| convert_err(entity, field, err))?;
    check_variants(schema, entity, field, &value)?;

    Ok(value)
}

/// A whole field value as written: honours list shape and nullability.
pub(crate) fn field_value(
    schema: &Schema,
    entity: &EntityModel,
    field: &FieldModel,
    json: &Json,
) -> Result<Value, ValidateError> {
    if json.is_null() {
        return if field.nullable {
            Ok(Value::Null)
        } else {
            Err(mismatch(entity, field, field.type_label(), "null"))
        };
    }

    if field.list {
        list(schema, entity, field, json)
    } else {
        scalar(schema, entity, field, json)
    }
}

fn check_variants(
    schema: &Schema,
    entity: &EntityModel,
    field: &FieldModel,
    value: &Value,
) -> Result<(), ValidateError> {
    let ScalarType::Enum(name) = &field.ty else {
        return Ok(());
    };
    let Some(model) = schema.enum_model(name) else {
        return Ok(());
    };

    let items = value.as_list().map_or_else(|| vec![value], |items| items.iter().collect());
    for item in items {
        if let Value::Enum(variant) = item
            && !model.contains(variant)
        {
            return Err(mismatch(entity, field, name.clone(), format!("'{variant}'")));
        }
    }

    Ok(())
}
