use crate::{
    config::ClientConfig,
    db::{
        backend::{Backend, RawRow},
        delegate::Delegate,
        dispatch::{Dispatcher, Interceptor},
        query::{PlanContext, ValidateError},
        typed::{EntityKind, TypedDelegate},
    },
    error::{ConfigError, Error},
    model::Schema,
    value::Value,
};
use std::sync::Arc;

///
/// Client
///
/// Entry point for every query. Cheap to clone; clones share the schema,
/// configuration, backend and interceptor chain.
///

#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    schema: Arc<Schema>,
    config: ClientConfig,
    dispatcher: Dispatcher,
}

impl Client {
    #[must_use]
    pub fn builder(schema: Arc<Schema>) -> ClientBuilder {
        ClientBuilder::new(schema)
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub(crate) fn context(&self) -> PlanContext<'_> {
        PlanContext::new(&self.inner.schema, &self.inner.config)
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// Delegate for one entity.
    pub fn entity(&self, name: &str) -> Result<Delegate<'_>, Error> {
        let entity = self
            .inner
            .schema
            .entity(name)
            .ok_or_else(|| ValidateError::UnknownEntity(name.to_string()))?;

        Ok(Delegate::new(self, entity))
    }

    /// Delegate that decodes rows into `E`.
    pub fn typed<E: EntityKind>(&self) -> Result<TypedDelegate<'_, E>, Error> {
        self.entity(E::ENTITY).map(TypedDelegate::new)
    }

    /// Run a raw statement. Parameters bind to `$1..$n`.
    pub async fn execute_raw(&self, sql: &str, params: &[Value]) -> Result<u64, Error> {
        check_placeholders(sql, params)?;

        self.inner.dispatcher.execute_raw(sql, params).await
    }

    /// Run a raw query. Rows come back unshaped.
    pub async fn query_raw(&self, sql: &str, params: &[Value]) -> Result<Vec<RawRow>, Error> {
        check_placeholders(sql, params)?;

        self.inner.dispatcher.query_raw(sql, params).await
    }
}

///
/// ClientBuilder
///

pub struct ClientBuilder {
    schema: Arc<Schema>,
    config: ClientConfig,
    backend: Option<Arc<dyn Backend>>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl ClientBuilder {
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            config: ClientConfig::default(),
            backend: None,
            interceptors: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Append an interceptor; the first one added runs outermost.
    #[must_use]
    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn build(self) -> Result<Client, Error> {
        let backend = self.backend.ok_or(ConfigError::MissingBackend)?;
        self.config.validate(&self.schema)?;

        tracing::debug!(
            entities = self.schema.entities().len(),
            interceptors = self.interceptors.len(),
            "client constructed"
        );
        let dispatcher = Dispatcher::new(backend, self.interceptors, self.config.transaction);

        Ok(Client {
            inner: Arc::new(ClientInner {
                schema: self.schema,
                config: self.config,
                dispatcher,
            }),
        })
    }
}

/// The highest `$n` placeholder must equal the parameter count.
fn check_placeholders(sql: &str, params: &[Value]) -> Result<(), ValidateError> {
    let placeholders = highest_placeholder(sql);
    if placeholders == params.len() {
        Ok(())
    } else {
        Err(ValidateError::RawParameterCount {
            placeholders,
            params: params.len(),
        })
    }
}

fn highest_placeholder(sql: &str) -> usize {
    let mut highest = 0;
    let mut rest = sql;

    while let Some(at) = rest.find('$') {
        rest = &rest[at + 1..];
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if let Ok(n) = rest[..digits].parse::<usize>() {
            highest = highest.max(n);
        }
        rest = &rest[digits..];
    }

    highest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_counted_by_highest_index() {
        assert_eq!(highest_placeholder("SELECT 1"), 0);
        assert_eq!(highest_placeholder("SELECT $1, $2, $1"), 2);
        assert_eq!(highest_placeholder("WHERE a = $10 AND b = '$'"), 10);
    }

    #[test]
    fn mismatched_parameter_count_is_rejected() {
        let err = check_placeholders("SELECT $1, $2", &[Value::Int(1)]).expect_err("count");
        assert!(matches!(
            err,
            ValidateError::RawParameterCount {
                placeholders: 2,
                params: 1
            }
        ));
        assert!(check_placeholders("SELECT $1", &[Value::Int(1)]).is_ok());
    }
}
