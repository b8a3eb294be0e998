//! Collaborator interfaces the encoders consume.

use bottledwater_core::{
    BottledWaterResult, IndexInfo, Oid, Relation, RelationName, Row,
};
use std::sync::Arc;

/// A catalog default-expression record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultExpression {
    /// Source text of the expression. A record may exist with no source.
    pub source: Option<String>,
}

/// An explicit conversion from a type's text form to JSON.
///
/// The output is embedded into documents verbatim, so it must already be
/// well-formed JSON.
pub trait JsonCast: Send + Sync {
    fn to_json(&self, text: &str) -> BottledWaterResult<String>;
}

impl<F> JsonCast for F
where
    F: Fn(&str) -> BottledWaterResult<String> + Send + Sync,
{
    fn to_json(&self, text: &str) -> BottledWaterResult<String> {
        self(text)
    }
}

/// Catalog/introspection subsystem.
///
/// Implementations must be safe to share; the encoders only read from it.
pub trait Catalog: Send + Sync {
    /// Fetch a relation by oid.
    fn relation(&self, oid: Oid) -> BottledWaterResult<Arc<Relation>>;

    /// Resolve a possibly unqualified name against the search path.
    fn resolve(&self, name: &RelationName) -> BottledWaterResult<Oid>;

    /// All indexes of a relation, in catalog order.
    fn indexes(&self, relation: Oid) -> BottledWaterResult<Vec<IndexInfo>>;

    /// Fetch a single index by oid.
    fn index(&self, oid: Oid) -> BottledWaterResult<IndexInfo>;

    /// The default-expression record for a column, `None` when no record exists.
    fn default_expression(
        &self,
        relation: Oid,
        attnum: i16,
    ) -> BottledWaterResult<Option<DefaultExpression>>;

    /// A registered JSON cast for the named type, `None` when there is none.
    fn json_cast(&self, type_name: &str) -> BottledWaterResult<Option<Arc<dyn JsonCast>>>;

    /// Every relation, in catalog order.
    fn relations(&self) -> BottledWaterResult<Vec<Arc<Relation>>>;

    /// Open a forward-only cursor over a relation's rows. With `only` set,
    /// rows of inheriting child tables are excluded.
    fn open_cursor(&self, relation: Oid, only: bool) -> BottledWaterResult<Box<dyn RowCursor>>;
}

/// Forward-only row cursor backed by a connection.
pub trait RowCursor: Send {
    /// Base relations the driving query scans.
    fn scanned_relations(&self) -> &[Oid];

    /// Fetch up to `max_rows` rows. An empty result means the scan is exhausted.
    fn fetch(&mut self, max_rows: usize) -> BottledWaterResult<Vec<Row>>;

    /// Release the cursor and its connection resources.
    fn close(&mut self) -> BottledWaterResult<()>;
}
