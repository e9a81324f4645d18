//! Client configuration.
//!
//! Configuration is supplied once at client construction and is immutable
//! afterwards. It can be assembled in code or loaded from TOML:
//!
//! ```toml
//! allow_omit_override = false
//! error_format = "pretty"
//!
//! [omit]
//! User = ["password"]
//!
//! [transaction]
//! max_wait_ms = 2000
//! timeout_ms = 5000
//! isolation_level = "read_committed"
//! ```

use crate::{error::ConfigError, model::Schema};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

///
/// ClientConfig
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Fields hidden from every default selection, keyed by entity.
    pub omit: OmitPolicy,

    /// Whether a call may re-include a globally omitted field with
    /// `omit: { field: false }`.
    pub allow_omit_override: bool,

    pub error_format: ErrorFormat,

    /// Defaults forwarded to the backend with every plan.
    pub transaction: TransactionOptions,
}

impl ClientConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|err| ConfigError::InvalidConfig(err.to_string()))
    }

    /// Read and parse a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;

        Self::from_toml_str(&source)
    }

    /// Always hide `field` on `entity` unless a call explicitly overrides it.
    #[must_use]
    pub fn omit(mut self, entity: impl Into<String>, field: impl Into<String>) -> Self {
        self.omit = self.omit.hide(entity, field);
        self
    }

    #[must_use]
    pub const fn allow_omit_override(mut self, allow: bool) -> Self {
        self.allow_omit_override = allow;
        self
    }

    #[must_use]
    pub const fn error_format(mut self, format: ErrorFormat) -> Self {
        self.error_format = format;
        self
    }

    #[must_use]
    pub const fn transaction(mut self, options: TransactionOptions) -> Self {
        self.transaction = options;
        self
    }

    /// Check every policy entry against the schema.
    pub fn validate(&self, schema: &Schema) -> Result<(), ConfigError> {
        for (entity, fields) in &self.omit.0 {
            let Some(model) = schema.entity(entity) else {
                return Err(ConfigError::UnknownOmitTarget {
                    entity: entity.clone(),
                    field: fields.iter().next().cloned().unwrap_or_default(),
                });
            };

            for field in fields {
                if model.field(field).is_none() {
                    return Err(ConfigError::UnknownOmitTarget {
                        entity: entity.clone(),
                        field: field.clone(),
                    });
                }
            }
        }

        if self.transaction.timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "transaction.timeout_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

///
/// OmitPolicy
///
/// Entity name → scalar fields that are never part of a default selection.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OmitPolicy(BTreeMap<String, BTreeSet<String>>);

impl OmitPolicy {
    #[must_use]
    pub fn hide(mut self, entity: impl Into<String>, field: impl Into<String>) -> Self {
        self.0.entry(entity.into()).or_default().insert(field.into());
        self
    }

    #[must_use]
    pub fn is_omitted(&self, entity: &str, field: &str) -> bool {
        self.0
            .get(entity)
            .is_some_and(|fields| fields.contains(field))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }
}

///
/// ErrorFormat
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorFormat {
    #[default]
    Minimal,
    Pretty,
}

///
/// TransactionOptions
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransactionOptions {
    pub max_wait_ms: u64,
    pub timeout_ms: u64,
    pub isolation_level: Option<IsolationLevel>,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            max_wait_ms: 2_000,
            timeout_ms: 5_000,
            isolation_level: None,
        }
    }
}

///
/// IsolationLevel
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_schema;

    #[test]
    fn toml_document_round_trips_into_config() {
        let config = ClientConfig::from_toml_str(
            r#"
            allow_omit_override = true
            error_format = "pretty"

            [omit]
            Employee = ["password"]

            [transaction]
            timeout_ms = 900
            isolation_level = "serializable"
            "#,
        )
        .expect("config should parse");

        assert!(config.allow_omit_override);
        assert_eq!(config.error_format, ErrorFormat::Pretty);
        assert!(config.omit.is_omitted("Employee", "password"));
        assert_eq!(config.transaction.timeout_ms, 900);
        assert_eq!(config.transaction.max_wait_ms, 2_000);
        assert_eq!(
            config.transaction.isolation_level,
            Some(IsolationLevel::Serializable)
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ClientConfig::from_toml_str("verbose = true").expect_err("unknown key");

        assert!(matches!(err, ConfigError::InvalidConfig(_)));
    }

    #[test]
    fn omit_policy_must_reference_declared_fields() {
        let schema = test_schema();

        ClientConfig::new()
            .omit("Employee", "password")
            .validate(&schema)
            .expect("declared field");

        let err = ClientConfig::new()
            .omit("Employee", "pin")
            .validate(&schema)
            .expect_err("unknown field");
        assert!(matches!(
            err,
            ConfigError::UnknownOmitTarget { ref field, .. } if field == "pin"
        ));

        let err = ClientConfig::new()
            .omit("Ghost", "password")
            .validate(&schema)
            .expect_err("unknown entity");
        assert!(matches!(err, ConfigError::UnknownOmitTarget { ref entity, .. } if entity == "Ghost"));
    }
}
