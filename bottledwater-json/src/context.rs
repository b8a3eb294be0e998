//! Explicit encode context.
//!
//! Everything an encoder would otherwise read from ambient session state
//! (current database name, session time zone, the catalog, the value
//! dispatch table) travels in an [`EncodeContext`] passed to each call.

use crate::value::ValueEncoder;
use bottledwater_catalog::Catalog;
use bottledwater_core::{
    BottledWaterResult, ContractViolation, EncoderConfig, Relation, RelationName, SessionZone,
};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct EncodeContext {
    database: String,
    zone: SessionZone,
    catalog: Arc<dyn Catalog>,
    values: Arc<ValueEncoder>,
    buffer_capacity: usize,
    exclude_child_tables: bool,
}

impl EncodeContext {
    /// Context for `database` with UTC session zone and the standard value handlers.
    pub fn new(database: impl Into<String>, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            database: database.into(),
            zone: SessionZone::utc(),
            catalog,
            values: ValueEncoder::shared_standard(),
            buffer_capacity: EncoderConfig::default().initial_buffer_capacity,
            exclude_child_tables: false,
        }
    }

    /// Context carrying the session zone, buffer sizing and snapshot scan
    /// default of `config`.
    pub fn from_config(
        database: impl Into<String>,
        catalog: Arc<dyn Catalog>,
        config: &EncoderConfig,
    ) -> Self {
        Self::new(database, catalog).with_config(config)
    }

    /// Replace the configurable parts of this context with those of `config`.
    pub fn with_config(self, config: &EncoderConfig) -> Self {
        let mut ctx = self
            .with_session_zone(config.session_zone.clone())
            .with_buffer_capacity(config.initial_buffer_capacity);
        ctx.exclude_child_tables = config.exclude_child_tables;
        ctx
    }

    pub fn with_session_zone(mut self, zone: SessionZone) -> Self {
        self.zone = zone;
        self
    }

    /// Replace the value dispatch table, e.g. one with extra handlers appended.
    pub fn with_value_encoder(mut self, values: ValueEncoder) -> Self {
        self.values = Arc::new(values);
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn session_zone(&self) -> &SessionZone {
        &self.zone
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    pub fn values(&self) -> &ValueEncoder {
        &self.values
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    /// Whether snapshots opened without an explicit choice skip child tables.
    pub fn exclude_child_tables(&self) -> bool {
        self.exclude_child_tables
    }

    /// Resolve a relation by name. An empty name is rejected before the
    /// catalog is consulted.
    pub fn relation_by_name(&self, name: &RelationName) -> BottledWaterResult<Arc<Relation>> {
        if name.name.is_empty() {
            return Err(ContractViolation::NullArgument { argument: "relname" }.into());
        }
        let oid = self.catalog.resolve(name)?;
        self.catalog.relation(oid)
    }
}

impl fmt::Debug for EncodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodeContext")
            .field("database", &self.database)
            .field("zone", &self.zone)
            .field("values", &self.values)
            .field("exclude_child_tables", &self.exclude_child_tables)
            .finish_non_exhaustive()
    }
}
