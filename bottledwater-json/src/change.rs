//! Change and transaction envelopes.

use crate::buffer::{JsonBuffer, ObjectWriter};
use crate::context::EncodeContext;
use crate::key::{describe_key, write_key};
use crate::tuple::encode_tuple;
use bottledwater_core::{
    BottledWaterResult, ChangeEvent, ChangeKind, ContractViolation, Relation, Row, WalPosition,
    Xid,
};

/// Encodes change events into one JSON document each.
///
/// Owns a scratch buffer that is reused across calls. An instance is meant
/// for sequential use by one owner.
#[derive(Debug)]
pub struct ChangeEventEncoder {
    ctx: EncodeContext,
    buffer: JsonBuffer,
}

impl ChangeEventEncoder {
    pub fn new(ctx: EncodeContext) -> Self {
        let buffer = JsonBuffer::with_capacity(ctx.buffer_capacity());
        Self { ctx, buffer }
    }

    pub fn context(&self) -> &EncodeContext {
        &self.ctx
    }

    /// Encode any event, validating its shape against its kind first.
    pub fn encode(&mut self, event: &ChangeEvent) -> BottledWaterResult<String> {
        let command = command_of(event.kind)?;
        if !event.kind.is_row_change() {
            if event.relation.is_some() || event.new_row.is_some() || event.old_row.is_some() {
                return Err(ContractViolation::UnexpectedRelationFields { command }.into());
            }
            return self.encode_framing(command, event.xid, event.wal_pos);
        }

        let relation = event
            .relation
            .as_deref()
            .ok_or(ContractViolation::MissingRelation { command })?;
        self.encode_change(
            event.kind,
            event.xid,
            event.wal_pos,
            relation,
            event.new_row.as_ref(),
            event.old_row.as_ref(),
        )
    }

    /// `{"command":"BEGIN","xid":..,"dbname":..}`
    pub fn encode_begin(&mut self, xid: Xid) -> BottledWaterResult<String> {
        self.encode_framing("BEGIN", xid, None)
    }

    /// Commit envelope; `wal_pos` is emitted when given.
    pub fn encode_commit(
        &mut self,
        xid: Xid,
        wal_pos: Option<WalPosition>,
    ) -> BottledWaterResult<String> {
        self.encode_framing("COMMIT", xid, wal_pos)
    }

    /// Encode a row change.
    ///
    /// Insert emits only the new row and requires it. Update requires the
    /// new row and adds the old one when supplied. Delete emits only the old
    /// row, when supplied.
    pub fn encode_change(
        &mut self,
        kind: ChangeKind,
        xid: Xid,
        wal_pos: Option<WalPosition>,
        relation: &Relation,
        new_row: Option<&Row>,
        old_row: Option<&Row>,
    ) -> BottledWaterResult<String> {
        let command = command_of(kind)?;
        if !kind.is_row_change() {
            return Err(ContractViolation::UnexpectedRelationFields { command }.into());
        }
        let (new_row, old_row) = match kind {
            ChangeKind::Insert => (Some(required(command, new_row)?), None),
            ChangeKind::Update => (Some(required(command, new_row)?), old_row),
            _ => (None, old_row),
        };

        let key = describe_key(self.ctx.catalog(), relation)?;
        let desc = &relation.descriptor;

        self.buffer.clear();
        let mut obj = write_header(
            &mut self.buffer,
            &self.ctx,
            command,
            xid,
            wal_pos,
            Some(relation),
        )?;
        if let Some(key) = &key {
            write_key(key, obj.field("key")?)?;
        }
        if let Some(row) = new_row {
            encode_tuple(&self.ctx, row, desc, obj.field("newtuple")?)?;
        }
        if let Some(row) = old_row {
            encode_tuple(&self.ctx, row, desc, obj.field("oldtuple")?)?;
        }
        obj.finish();

        tracing::trace!(
            command,
            xid,
            relation = %relation.qualified_name(),
            bytes = self.buffer.len(),
            "change encoded"
        );
        self.buffer.to_document()
    }

    fn encode_framing(
        &mut self,
        command: &'static str,
        xid: Xid,
        wal_pos: Option<WalPosition>,
    ) -> BottledWaterResult<String> {
        self.buffer.clear();
        write_header(&mut self.buffer, &self.ctx, command, xid, wal_pos, None)?.finish();
        tracing::trace!(command, xid, "transaction framing encoded");
        self.buffer.to_document()
    }
}

/// Open an envelope and write the fields shared by every document:
/// `command`, `xid`, `wal_pos`, `dbname`, and the relation name fields.
pub(crate) fn write_header<'a>(
    out: &'a mut JsonBuffer,
    ctx: &EncodeContext,
    command: &str,
    xid: Xid,
    wal_pos: Option<WalPosition>,
    relation: Option<&Relation>,
) -> BottledWaterResult<ObjectWriter<'a>> {
    let mut obj = out.object();
    obj.string_field("command", command)?;
    obj.field("xid")?.push_display(xid)?;
    if let Some(pos) = wal_pos {
        obj.field("wal_pos")?.push_display_quoted(pos)?;
    }
    obj.string_field("dbname", ctx.database())?;
    if let Some(rel) = relation {
        obj.string_field("relname", &rel.name)?;
        obj.string_field("relnamespace", &rel.namespace)?;
    }
    Ok(obj)
}

fn required<'r>(command: &'static str, row: Option<&'r Row>) -> BottledWaterResult<&'r Row> {
    row.ok_or_else(|| ContractViolation::MissingNewTuple { command }.into())
}

/// The `command` value of a known kind; unknown kinds are a contract violation.
fn command_of(kind: ChangeKind) -> BottledWaterResult<&'static str> {
    match kind {
        ChangeKind::Unknown(code) => Err(ContractViolation::UnknownAction { code }.into()),
        known => Ok(known.command().unwrap_or_default()),
    }
}
