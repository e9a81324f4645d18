use crate::{config::ClientConfig, model::Schema};

///
/// PlanContext
///
/// Read-only inputs shared by every builder during one call.
///

#[derive(Clone, Copy, Debug)]
pub struct PlanContext<'a> {
    pub schema: &'a Schema,
    pub config: &'a ClientConfig,
}

impl<'a> PlanContext<'a> {
    #[must_use]
    pub const fn new(schema: &'a Schema, config: &'a ClientConfig) -> Self {
        Self { schema, config }
    }
}
