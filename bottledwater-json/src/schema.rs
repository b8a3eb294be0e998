//! Relation schema documents.
//!
//! `{"relname":..,"relnamespace":..,"key":[..],"attributes":[..]}` with one
//! `{"name","type","notnull","default"}` entry per live column.

use crate::buffer::JsonBuffer;
use crate::context::EncodeContext;
use crate::format::ensure_supported;
use crate::key::{describe_key, write_key};
use bottledwater_core::{
    BottledWaterResult, ColumnDescriptor, LookupError, OutputFormat, Relation, RelationName,
};

/// Describe the named relation.
pub fn describe_schema(ctx: &EncodeContext, name: &RelationName) -> BottledWaterResult<String> {
    ensure_supported(OutputFormat::Json)?;
    let relation = ctx.relation_by_name(name)?;
    describe_relation(ctx, &relation)
}

/// Describe an already resolved relation.
pub fn describe_relation(ctx: &EncodeContext, relation: &Relation) -> BottledWaterResult<String> {
    let key = describe_key(ctx.catalog(), relation)?;

    let mut out = JsonBuffer::with_capacity(ctx.buffer_capacity());
    let mut obj = out.object();
    obj.string_field("relname", &relation.name)?;
    obj.string_field("relnamespace", &relation.namespace)?;
    if let Some(key) = &key {
        write_key(key, obj.field("key")?)?;
    }

    let attrs = obj.field("attributes")?;
    attrs.push_byte(b'[');
    for (n, (slot, column)) in relation.descriptor.visible().enumerate() {
        if n > 0 {
            attrs.push_byte(b',');
        }
        write_attribute(ctx, relation, slot, column, attrs)?;
    }
    attrs.push_byte(b']');
    obj.finish();

    tracing::debug!(relation = %relation.qualified_name(), bytes = out.len(), "schema described");
    out.into_document()
}

fn write_attribute(
    ctx: &EncodeContext,
    relation: &Relation,
    slot: usize,
    column: &ColumnDescriptor,
    out: &mut JsonBuffer,
) -> BottledWaterResult<()> {
    let mut obj = out.object();
    obj.string_field("name", &column.name)?;
    obj.string_field("type", &column.type_display())?;
    obj.raw_field("notnull", if column.nullable { "false" } else { "true" })?;

    if column.has_default {
        let attnum = slot as i16 + 1;
        let record = ctx
            .catalog()
            .default_expression(relation.oid, attnum)?
            .ok_or(LookupError::DefaultExpressionMissing {
                relation: relation.oid.0,
                attnum,
            })?;
        if let Some(source) = &record.source {
            obj.string_field("default", source)?;
        }
    }
    obj.finish();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bottledwater_catalog::InMemoryCatalog;
    use bottledwater_core::{
        BottledWaterError, ContractViolation, IndexInfo, Oid, RowDescriptor, TypeDescriptor,
        TypeModifier,
    };
    use std::sync::Arc;

    fn items() -> Relation {
        Relation::table(
            Oid(500),
            "shop",
            "items",
            RowDescriptor::new(vec![
                ColumnDescriptor::new("id", TypeDescriptor::int8())
                    .not_null()
                    .with_default(),
                ColumnDescriptor::new("legacy", TypeDescriptor::text()).dropped(),
                ColumnDescriptor::new("price", TypeDescriptor::numeric()).with_modifier(
                    TypeModifier::Precision {
                        precision: 10,
                        scale: Some(2),
                    },
                ),
                ColumnDescriptor::new("sku", TypeDescriptor::varchar())
                    .with_modifier(TypeModifier::Length(20))
                    .with_default(),
            ]),
        )
    }

    fn setup() -> (InMemoryCatalog, EncodeContext) {
        let catalog = InMemoryCatalog::new();
        let rel = catalog.add_relation(items()).unwrap();
        catalog
            .add_index(rel.oid, IndexInfo::new(Oid(501), "items_pkey", vec![1]).primary())
            .unwrap();
        catalog
            .set_default(rel.oid, 1, Some("nextval('items_id_seq'::regclass)"))
            .unwrap();
        catalog.set_default(rel.oid, 4, None).unwrap();
        let ctx = EncodeContext::new("shopdb", Arc::new(catalog.clone()));
        (catalog, ctx)
    }

    #[test]
    fn test_schema_document() {
        let (_, ctx) = setup();
        let doc = describe_schema(&ctx, &RelationName::qualified("shop", "items")).unwrap();
        assert_eq!(
            doc,
            concat!(
                r#"{"relname":"items","relnamespace":"shop","key":["id"],"attributes":["#,
                r#"{"name":"id","type":"bigint","notnull":true,"#,
                r#""default":"nextval('items_id_seq'::regclass)"},"#,
                r#"{"name":"price","type":"numeric(10,2)","notnull":false},"#,
                r#"{"name":"sku","type":"character varying(20)","notnull":false}]}"#
            )
        );
    }

    #[test]
    fn test_missing_default_record_is_lookup_error() {
        let catalog = InMemoryCatalog::new();
        catalog.add_relation(items()).unwrap();
        let ctx = EncodeContext::new("shopdb", Arc::new(catalog));
        let err = describe_schema(&ctx, &RelationName::qualified("shop", "items")).unwrap_err();
        assert_eq!(
            err,
            BottledWaterError::from(LookupError::DefaultExpressionMissing {
                relation: 500,
                attnum: 1
            })
        );
    }

    #[test]
    fn test_unkeyed_relation_omits_key() {
        let catalog = InMemoryCatalog::new();
        catalog
            .add_relation(Relation::table(
                Oid(1),
                "public",
                "log",
                RowDescriptor::new(vec![ColumnDescriptor::new("line", TypeDescriptor::text())]),
            ))
            .unwrap();
        let ctx = EncodeContext::new("db", Arc::new(catalog));
        let doc = describe_schema(&ctx, &RelationName::new("log")).unwrap();
        assert_eq!(
            doc,
            r#"{"relname":"log","relnamespace":"public","attributes":[{"name":"line","type":"text","notnull":false}]}"#
        );
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let (_, ctx) = setup();
        assert_eq!(
            describe_schema(&ctx, &RelationName::new("")).unwrap_err(),
            BottledWaterError::from(ContractViolation::NullArgument { argument: "relname" })
        );
    }

    #[test]
    fn test_unknown_relation() {
        let (_, ctx) = setup();
        let err = describe_schema(&ctx, &RelationName::new("nope")).unwrap_err();
        assert!(matches!(
            err,
            BottledWaterError::Lookup(LookupError::RelationNotFound { .. })
        ));
    }
}
