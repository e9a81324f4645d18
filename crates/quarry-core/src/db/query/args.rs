//! Call arguments, one struct per delegate operation.
//!
//! Every struct deserializes from the camelCase argument document callers
//! pass as JSON, so `json!({ "where": { .. }, "take": 5 })` and a struct
//! literal are interchangeable.

use crate::db::query::ValidateError;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value as Json;

///
/// IntoArgs
///
/// Conversion from caller input into typed arguments. Implemented for raw
/// JSON documents and for each argument struct itself.
///

pub trait IntoArgs<A> {
    fn into_args(self, operation: &str) -> Result<A, ValidateError>;
}

impl<A: DeserializeOwned> IntoArgs<A> for Json {
    fn into_args(self, operation: &str) -> Result<A, ValidateError> {
        serde_json::from_value(self).map_err(|err| ValidateError::MalformedArguments {
            operation: operation.to_string(),
            message: err.to_string(),
        })
    }
}

macro_rules! impl_into_args {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoArgs<$ty> for $ty {
                fn into_args(self, _: &str) -> Result<$ty, ValidateError> {
                    Ok(self)
                }
            }
        )*
    };
}

impl_into_args!(
    FindUniqueArgs,
    FindManyArgs,
    CreateArgs,
    CreateManyArgs,
    UpdateArgs,
    UpdateManyArgs,
    UpsertArgs,
    DeleteArgs,
    DeleteManyArgs,
    CountArgs,
    AggregateArgs,
    GroupByArgs,
);

///
/// FindUniqueArgs
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FindUniqueArgs {
    #[serde(rename = "where")]
    pub filter: Json,
    pub select: Option<Json>,
    pub include: Option<Json>,
    pub omit: Option<Json>,
}

///
/// FindManyArgs
///
/// Also used by `find_first`.
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FindManyArgs {
    #[serde(rename = "where")]
    pub filter: Option<Json>,
    pub order_by: Option<Json>,
    pub cursor: Option<Json>,
    pub take: Option<i64>,
    pub skip: Option<u64>,
    pub distinct: Option<Json>,
    pub select: Option<Json>,
    pub include: Option<Json>,
    pub omit: Option<Json>,
}

///
/// CreateArgs
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateArgs {
    pub data: Json,
    pub select: Option<Json>,
    pub include: Option<Json>,
    pub omit: Option<Json>,
}

///
/// CreateManyArgs
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateManyArgs {
    pub data: Vec<Json>,
    #[serde(default)]
    pub skip_duplicates: bool,
}

///
/// UpdateArgs
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateArgs {
    #[serde(rename = "where")]
    pub filter: Json,
    pub data: Json,
    pub select: Option<Json>,
    pub include: Option<Json>,
    pub omit: Option<Json>,
}

///
/// UpdateManyArgs
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateManyArgs {
    #[serde(rename = "where")]
    pub filter: Option<Json>,
    pub data: Json,
    pub limit: Option<u64>,
    pub order_by: Option<Json>,
}

///
/// UpsertArgs
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpsertArgs {
    #[serde(rename = "where")]
    pub filter: Json,
    pub create: Json,
    pub update: Json,
    pub select: Option<Json>,
    pub include: Option<Json>,
    pub omit: Option<Json>,
}

///
/// DeleteArgs
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeleteArgs {
    #[serde(rename = "where")]
    pub filter: Json,
    pub select: Option<Json>,
    pub include: Option<Json>,
    pub omit: Option<Json>,
}

///
/// DeleteManyArgs
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeleteManyArgs {
    #[serde(rename = "where")]
    pub filter: Option<Json>,
    pub limit: Option<u64>,
    pub order_by: Option<Json>,
}

///
/// CountArgs
///
/// `select: { _all: true, field: true }` switches to per-field counts.
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CountArgs {
    #[serde(rename = "where")]
    pub filter: Option<Json>,
    pub order_by: Option<Json>,
    pub cursor: Option<Json>,
    pub take: Option<i64>,
    pub skip: Option<u64>,
    pub select: Option<Json>,
}

///
/// AggregateArgs
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AggregateArgs {
    #[serde(rename = "where")]
    pub filter: Option<Json>,
    pub order_by: Option<Json>,
    pub cursor: Option<Json>,
    pub take: Option<i64>,
    pub skip: Option<u64>,
    #[serde(rename = "_count")]
    pub count: Option<Json>,
    #[serde(rename = "_min")]
    pub min: Option<Json>,
    #[serde(rename = "_max")]
    pub max: Option<Json>,
    #[serde(rename = "_sum")]
    pub sum: Option<Json>,
    #[serde(rename = "_avg")]
    pub avg: Option<Json>,
}

///
/// GroupByArgs
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GroupByArgs {
    pub by: Json,
    #[serde(rename = "where")]
    pub filter: Option<Json>,
    pub order_by: Option<Json>,
    pub having: Option<Json>,
    pub take: Option<i64>,
    pub skip: Option<u64>,
    #[serde(rename = "_count")]
    pub count: Option<Json>,
    #[serde(rename = "_min")]
    pub min: Option<Json>,
    #[serde(rename = "_max")]
    pub max: Option<Json>,
    #[serde(rename = "_sum")]
    pub sum: Option<Json>,
    #[serde(rename = "_avg")]
    pub avg: Option<Json>,
}
