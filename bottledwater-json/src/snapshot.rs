//! Forward-only snapshot streaming.
//!
//! A [`SnapshotStream`] emits one INSERT-shaped document per table row. The
//! envelope up to `"newtuple":` is written once at open time; every row
//! rewinds the buffer to the end of that template before encoding, so
//! per-row work is proportional to the row alone.

use crate::buffer::{JsonBuffer, Mark};
use crate::change::write_header;
use crate::context::EncodeContext;
use crate::format::ensure_supported;
use crate::key::{describe_identity, write_key};
use crate::tuple::encode_tuple;
use bottledwater_catalog::{Catalog, RowCursor};
use bottledwater_core::{
    BottledWaterResult, ContractViolation, EncoderConfig, OutputFormat, Persistence, Relation,
    RelationKind, RelationName, UnsupportedInput,
};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Lifecycle of a [`SnapshotStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Uninitialized,
    Prepared,
    Streaming,
    /// Terminal. The cursor has been released.
    Done,
}

/// Single-pass stream of row documents over one table.
pub struct SnapshotStream {
    ctx: EncodeContext,
    relation: Option<Arc<Relation>>,
    cursor: Option<Box<dyn RowCursor>>,
    buffer: JsonBuffer,
    template_end: Mark,
    state: StreamState,
}

impl SnapshotStream {
    /// A stream that has not been opened yet.
    pub fn new(ctx: EncodeContext) -> Self {
        let buffer = JsonBuffer::with_capacity(ctx.buffer_capacity());
        Self {
            ctx,
            relation: None,
            cursor: None,
            template_end: buffer.mark(),
            buffer,
            state: StreamState::Uninitialized,
        }
    }

    /// Open a stream over the named table. With `exclude_child_tables`,
    /// rows of inheriting tables are left out.
    pub fn open(
        ctx: EncodeContext,
        name: &RelationName,
        exclude_child_tables: bool,
    ) -> BottledWaterResult<Self> {
        let mut stream = Self::new(ctx);
        stream.prepare(name, exclude_child_tables)?;
        Ok(stream)
    }

    /// Open a stream over the named table, taking the child-table choice
    /// from the context.
    pub fn open_default(ctx: EncodeContext, name: &RelationName) -> BottledWaterResult<Self> {
        let only = ctx.exclude_child_tables();
        Self::open(ctx, name, only)
    }

    /// Resolve the relation, open its cursor and build the template.
    pub fn prepare(
        &mut self,
        name: &RelationName,
        exclude_child_tables: bool,
    ) -> BottledWaterResult<()> {
        if self.state != StreamState::Uninitialized {
            return Err(ContractViolation::InvalidState {
                reason: format!("snapshot already opened ({:?})", self.state),
            }
            .into());
        }
        ensure_supported(OutputFormat::Json)?;

        let relation = self.ctx.relation_by_name(name)?;
        if relation.kind != RelationKind::Table {
            return Err(UnsupportedInput::NotATable {
                name: relation.qualified_name(),
                kind: relation.kind.label().to_string(),
            }
            .into());
        }

        let identity = describe_identity(self.ctx.catalog(), &relation)?;
        let mut cursor = self.ctx.catalog().open_cursor(relation.oid, exclude_child_tables)?;

        let scanned = cursor.scanned_relations().len();
        if scanned != 1 {
            release(cursor.as_mut(), &relation.qualified_name());
            return Err(UnsupportedInput::RelationCount { count: scanned }.into());
        }

        if let Err(err) = self.write_template(&relation, identity.key.as_deref()) {
            release(cursor.as_mut(), &relation.qualified_name());
            return Err(err);
        }

        tracing::debug!(
            relation = %relation.qualified_name(),
            only = exclude_child_tables,
            template_bytes = self.template_end.offset(),
            "snapshot opened"
        );
        self.cursor = Some(cursor);
        self.relation = Some(relation);
        self.state = StreamState::Prepared;
        Ok(())
    }

    fn write_template(
        &mut self,
        relation: &Relation,
        key: Option<&[String]>,
    ) -> BottledWaterResult<()> {
        self.buffer.clear();
        let mut obj = write_header(
            &mut self.buffer,
            &self.ctx,
            "INSERT",
            0,
            None,
            Some(relation),
        )?;
        if let Some(key) = key {
            write_key(key, obj.field("key")?)?;
        }
        obj.field("newtuple")?;
        obj.into_open();
        self.template_end = self.buffer.mark();
        Ok(())
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn relation(&self) -> Option<&Relation> {
        self.relation.as_deref()
    }

    /// The fixed envelope prefix shared by every document of this stream.
    pub fn template(&self) -> BottledWaterResult<&str> {
        let text = self.buffer.as_str()?;
        Ok(text.get(..self.template_end.offset()).unwrap_or(text))
    }

    /// Produce the next row document, or `None` once the table is exhausted.
    ///
    /// Any error releases the cursor and ends the stream.
    pub fn next_document(&mut self) -> BottledWaterResult<Option<String>> {
        match self.state {
            StreamState::Done => return Ok(None),
            StreamState::Uninitialized => {
                return Err(ContractViolation::InvalidState {
                    reason: "snapshot stream was never opened".to_string(),
                }
                .into())
            }
            StreamState::Prepared | StreamState::Streaming => {}
        }

        match self.step() {
            Ok(Some(doc)) => {
                self.state = StreamState::Streaming;
                Ok(Some(doc))
            }
            Ok(None) => {
                self.finish();
                tracing::debug!(relation = %self.relation_label(), "snapshot exhausted");
                Ok(None)
            }
            Err(err) => {
                tracing::debug!(relation = %self.relation_label(), error = %err, "snapshot aborted");
                self.finish();
                Err(err)
            }
        }
    }

    fn step(&mut self) -> BottledWaterResult<Option<String>> {
        let (Some(cursor), Some(relation)) = (self.cursor.as_mut(), self.relation.as_ref()) else {
            return Ok(None);
        };

        let mut rows = cursor.fetch(1)?;
        let row = match rows.len() {
            0 => return Ok(None),
            1 => rows.remove(0),
            n => return Err(ContractViolation::MultiRowFetch { rows: n }.into()),
        };

        self.buffer.truncate_to(self.template_end);
        encode_tuple(&self.ctx, &row, &relation.descriptor, &mut self.buffer)?;
        self.buffer.push_byte(b'}');

        tracing::trace!(bytes = self.buffer.len(), "snapshot row encoded");
        self.buffer.to_document().map(Some)
    }

    /// Release the cursor and end the stream. Idempotent.
    pub fn close(&mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            release(cursor.as_mut(), &self.relation_label());
        }
        self.buffer.truncate_to(self.template_end);
        self.state = StreamState::Done;
    }

    fn relation_label(&self) -> String {
        self.relation
            .as_deref()
            .map(Relation::qualified_name)
            .unwrap_or_default()
    }
}

fn release(cursor: &mut dyn RowCursor, relation: &str) {
    match cursor.close() {
        Ok(()) => tracing::debug!(relation, "snapshot cursor released"),
        Err(err) => tracing::warn!(relation, error = %err, "failed to release snapshot cursor"),
    }
}

impl Iterator for SnapshotStream {
    type Item = BottledWaterResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_document().transpose()
    }
}

impl Drop for SnapshotStream {
    fn drop(&mut self) {
        if self.cursor.is_some() {
            tracing::warn!(
                relation = %self.relation_label(),
                "snapshot stream dropped with open cursor"
            );
            self.finish();
        }
    }
}

impl fmt::Debug for SnapshotStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotStream")
            .field("relation", &self.relation_label())
            .field("state", &self.state)
            .field("template_end", &self.template_end)
            .finish_non_exhaustive()
    }
}

/// Convenience for [`SnapshotStream::open`].
pub fn open_snapshot(
    ctx: EncodeContext,
    name: &RelationName,
    exclude_child_tables: bool,
) -> BottledWaterResult<SnapshotStream> {
    SnapshotStream::open(ctx, name, exclude_child_tables)
}

// ============================================================================
// TABLE PLANNING
// ============================================================================

/// Decides whether a planned table is snapshotted.
pub trait SnapshotPolicy: Send + Sync {
    fn include(&self, relation: &Relation) -> bool;
}

/// Snapshot every table the planner finds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportAll;

impl SnapshotPolicy for ExportAll {
    fn include(&self, _relation: &Relation) -> bool {
        true
    }
}

impl<F> SnapshotPolicy for F
where
    F: Fn(&Relation) -> bool + Send + Sync,
{
    fn include(&self, relation: &Relation) -> bool {
        self(relation)
    }
}

/// The ordinary permanent tables to snapshot, in catalog order. Tables in
/// namespaces matched by the configured skip patterns are left out, as are
/// tables the policy rejects.
pub fn export_table_list(
    catalog: &dyn Catalog,
    config: &EncoderConfig,
    policy: &dyn SnapshotPolicy,
) -> BottledWaterResult<Vec<Arc<Relation>>> {
    let skip = config.skip_namespace_regexes()?;
    let tables: Vec<_> = catalog
        .relations()?
        .into_iter()
        .filter(|rel| rel.kind == RelationKind::Table && rel.persistence == Persistence::Permanent)
        .filter(|rel| !skipped(&skip, &rel.namespace))
        .filter(|rel| policy.include(rel))
        .collect();
    tracing::debug!(tables = tables.len(), "snapshot tables planned");
    Ok(tables)
}

fn skipped(patterns: &[Regex], namespace: &str) -> bool {
    patterns.iter().any(|re| re.is_match(namespace))
}
