use crate::{model::ScalarType, value::Value};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde_json::{Number, Value as Json};
use std::{fmt, str::FromStr};

///
/// JsonConvertError
///
/// A JSON operand could not be read as the declared scalar type.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JsonConvertError {
    pub expected: String,
    pub found: String,
}

impl JsonConvertError {
    fn new(expected: &ScalarType, found: &Json) -> Self {
        Self {
            expected: expected.to_string(),
            found: json_kind(found).to_string(),
        }
    }
}

impl fmt::Display for JsonConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, found {}", self.expected, self.found)
    }
}

impl std::error::Error for JsonConvertError {}

impl Value {
    /// Read a JSON operand as one scalar of the given type.
    ///
    /// `null` maps to `Value::Null`; nullability is checked by the caller.
    pub fn from_json(json: &Json, ty: &ScalarType) -> Result<Self, JsonConvertError> {
        if json.is_null() {
            return Ok(Self::Null);
        }

        let err = || JsonConvertError::new(ty, json);

        match ty {
            ScalarType::Text => json.as_str().map(|s| Self::Text(s.to_string())).ok_or_else(err),
            ScalarType::Boolean => json.as_bool().map(Self::Bool).ok_or_else(err),
            ScalarType::Int => match json {
                Json::Number(n) => n.as_i64().map(Self::Int).ok_or_else(err),
                _ => Err(err()),
            },
            ScalarType::Float => match json {
                Json::Number(n) => n.as_f64().map(Self::Float).ok_or_else(err),
                _ => Err(err()),
            },
            ScalarType::Decimal => match json {
                Json::Number(n) => parse_decimal(&n.to_string()).ok_or_else(err),
                Json::String(s) => parse_decimal(s).ok_or_else(err),
                _ => Err(err()),
            },
            ScalarType::DateTime => json.as_str().and_then(parse_datetime).ok_or_else(err),
            ScalarType::Enum(_) => json.as_str().map(|s| Self::Enum(s.to_string())).ok_or_else(err),
            ScalarType::Json => Ok(Self::Json(json.clone())),
        }
    }

    /// Read a JSON array as a list of the given element type.
    pub fn from_json_list(json: &Json, ty: &ScalarType) -> Result<Self, JsonConvertError> {
        let Json::Array(items) = json else {
            return Err(JsonConvertError {
                expected: format!("{ty}[]"),
                found: json_kind(json).to_string(),
            });
        };

        items
            .iter()
            .map(|item| match Self::from_json(item, ty)? {
                Self::Null => Err(JsonConvertError {
                    expected: ty.to_string(),
                    found: "null".to_string(),
                }),
                value => Ok(value),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::List)
    }

    /// Read JSON without a declared type (raw-query parameters and rows).
    #[must_use]
    pub fn from_json_untyped(json: &Json) -> Self {
        match json {
            Json::Null => Self::Null,
            Json::Bool(v) => Self::Bool(*v),
            Json::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or(f64::NAN)), Self::Int),
            Json::String(s) => Self::Text(s.clone()),
            Json::Array(items) => Self::List(items.iter().map(Self::from_json_untyped).collect()),
            Json::Object(_) => Self::Json(json.clone()),
        }
    }

    /// Canonical JSON form. Decimals render as strings to keep their scale.
    #[must_use]
    pub fn to_json(&self) -> Json {
        match self {
            Self::Null => Json::Null,
            Self::Bool(v) => Json::Bool(*v),
            Self::Int(v) => Json::Number(Number::from(*v)),
            Self::Float(v) => Number::from_f64(*v).map_or(Json::Null, Json::Number),
            Self::Decimal(v) => Json::String(v.to_string()),
            Self::Text(v) | Self::Enum(v) => Json::String(v.clone()),
            Self::DateTime(v) => Json::String(format_datetime(v)),
            Self::Json(v) => v.clone(),
            Self::List(items) => Json::Array(items.iter().map(Self::to_json).collect()),
        }
    }

    /// Coerce an already-typed value into the declared scalar type.
    ///
    /// Used when shaping backend rows: backends may hand back decimals as
    /// text or integers, datetimes as text, and so on.
    #[must_use]
    pub fn coerce_to(self, ty: &ScalarType) -> Option<Self> {
        match (ty, self) {
            (_, Self::Null) => Some(Self::Null),
            (ScalarType::Text, Self::Text(v)) => Some(Self::Text(v)),
            (ScalarType::Boolean, Self::Bool(v)) => Some(Self::Bool(v)),
            (ScalarType::Boolean, Self::Int(v)) if v == 0 || v == 1 => Some(Self::Bool(v == 1)),
            (ScalarType::Int, Self::Int(v)) => Some(Self::Int(v)),
            (ScalarType::Float, Self::Float(v)) => Some(Self::Float(v)),
            #[allow(clippy::cast_precision_loss)]
            (ScalarType::Float, Self::Int(v)) => Some(Self::Float(v as f64)),
            (ScalarType::Float, Self::Decimal(v)) => v.to_string().parse().ok().map(Self::Float),
            (ScalarType::Decimal, Self::Decimal(v)) => Some(Self::Decimal(v)),
            (ScalarType::Decimal, Self::Int(v)) => Some(Self::Decimal(Decimal::from(v))),
            (ScalarType::Decimal, Self::Text(v)) => parse_decimal(&v),
            (ScalarType::Decimal, Self::Float(v)) => Decimal::from_str(&v.to_string())
                .ok()
                .map(Self::Decimal),
            (ScalarType::DateTime, Self::DateTime(v)) => Some(Self::DateTime(v)),
            (ScalarType::DateTime, Self::Text(v)) => parse_datetime(&v),
            (ScalarType::Enum(_), Self::Enum(v) | Self::Text(v)) => Some(Self::Enum(v)),
            (ScalarType::Json, Self::Json(v)) => Some(Self::Json(v)),
            (ScalarType::Json, other) => Some(Self::Json(other.to_json())),
            _ => None,
        }
    }
}

pub(super) fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_decimal(text: &str) -> Option<Value> {
    let parsed = if text.contains(['e', 'E']) {
        Decimal::from_scientific(text)
    } else {
        Decimal::from_str(text)
    };

    parsed.ok().map(Value::Decimal)
}

// RFC 3339 timestamps, or plain calendar dates at midnight UTC.
fn parse_datetime(text: &str) -> Option<Value> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(Value::DateTime(parsed.with_timezone(&Utc)));
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Value::DateTime(naive.and_utc()))
}

const fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
