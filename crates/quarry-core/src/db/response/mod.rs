//! Shaped results.
//!
//! A [`Record`] carries exactly the keys its selection asked for, in schema
//! order, with every scalar coerced to its declared type.

mod shape;


pub use shape::shape;

pub(crate) use shape::{shape_aggregate, shape_groups, shape_row};

use crate::{db::query::ValidateError, value::Value};
use serde::{Serialize, Serializer, de::DeserializeOwned, ser::SerializeMap};
use serde_json::{Map, Value as Json};

///
/// Record
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    entity: String,
    fields: Vec<(String, Field)>,
}

impl Record {
    #[must_use]
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            fields: Vec::new(),
        }
    }

    /// Entity the record was shaped for.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, f)| f)
    }

    /// Scalar under `key`.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        match self.get(key)? {
            Field::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Included to-one relation, or a nested object such as `_count`.
    #[must_use]
    pub fn one(&self, key: &str) -> Option<&Self> {
        match self.get(key)? {
            Field::One(record) => record.as_ref(),
            Field::Object(record) => Some(record),
            _ => None,
        }
    }

    /// Included to-many relation.
    #[must_use]
    pub fn many(&self, key: &str) -> Option<&[Self]> {
        match self.get(key)? {
            Field::Many(records) => Some(records),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(k, f)| (k.as_str(), f))
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn push(&mut self, key: impl Into<String>, field: Field) {
        self.fields.push((key.into(), field));
    }

    /// JSON form: decimals as strings, datetimes as RFC 3339.
    #[must_use]
    pub fn to_json(&self) -> Json {
        let map: Map<String, Json> = self
            .fields
            .iter()
            .map(|(key, field)| (key.clone(), field.to_json()))
            .collect();

        Json::Object(map)
    }

    /// Decode into a caller-defined row type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ValidateError> {
        serde_json::from_value(self.to_json()).map_err(|err| ValidateError::ResultDecode {
            entity: self.entity.clone(),
            message: err.to_string(),
        })
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, field) in &self.fields {
            map.serialize_entry(key, field)?;
        }

        map.end()
    }
}

///
/// Field
///
/// One → included to-one relation, `None` when absent
/// Many → included to-many relation, never absent
/// Object → nested aggregate or count object
///

#[derive(Clone, Debug, PartialEq)]
pub enum Field {
    Value(Value),
    One(Option<Record>),
    Many(Vec<Record>),
    Object(Record),
}

impl Field {
    #[must_use]
    pub fn to_json(&self) -> Json {
        match self {
            Self::Value(value) => value.to_json(),
            Self::One(None) => Json::Null,
            Self::One(Some(record)) | Self::Object(record) => record.to_json(),
            Self::Many(records) => Json::Array(records.iter().map(Record::to_json).collect()),
        }
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(value) => value.serialize(serializer),
            Self::One(record) => record.serialize(serializer),
            Self::Many(records) => records.serialize(serializer),
            Self::Object(record) => record.serialize(serializer),
        }
    }
}
