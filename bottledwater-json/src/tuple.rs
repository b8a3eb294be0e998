//! Row to JSON object encoding.

use crate::buffer::JsonBuffer;
use crate::context::EncodeContext;
use bottledwater_core::{BottledWaterResult, ContractViolation, Row, RowDescriptor};

/// Encode `row` as a JSON object with one field per live column of `desc`,
/// in declared order. Dropped columns are skipped; their slots still count
/// toward the row's arity.
pub fn encode_tuple(
    ctx: &EncodeContext,
    row: &Row,
    desc: &RowDescriptor,
    out: &mut JsonBuffer,
) -> BottledWaterResult<()> {
    if row.len() != desc.len() {
        return Err(ContractViolation::ArityMismatch {
            expected: desc.len(),
            got: row.len(),
        }
        .into());
    }

    let values = ctx.values();
    let mut obj = out.object();
    for (slot, column) in desc.visible() {
        let value = &row.values()[slot];
        let out = obj.field(&column.name)?;
        values.encode(value, &column.type_desc, ctx, out)?;
    }
    obj.finish();
    Ok(())
}
