//! Identity-key resolution.

use crate::buffer::JsonBuffer;
use bottledwater_catalog::Catalog;
use bottledwater_core::{
    BottledWaterResult, IndexInfo, Relation, RelationIdentity, ReplicaIdentity,
};

/// Resolve the identity key of `relation` to column names in index order.
///
/// Replica identity `Nothing` means no key. An explicitly designated index
/// is used as is. Otherwise the first valid, ready primary index wins.
/// `None` when no usable key exists, including an index whose key
/// columns have all been dropped.
pub fn describe_key(
    catalog: &dyn Catalog,
    relation: &Relation,
) -> BottledWaterResult<Option<Vec<String>>> {
    let index = match relation.replica_identity {
        ReplicaIdentity::Nothing => return Ok(None),
        ReplicaIdentity::Index(Some(oid)) => Some(catalog.index(oid)?),
        ReplicaIdentity::Index(None) | ReplicaIdentity::Default | ReplicaIdentity::Full => {
            find_primary(catalog, relation)?
        }
    };

    Ok(index.and_then(|index| key_columns(relation, &index)))
}

/// Identity of `relation`: namespace, name and resolved key.
pub fn describe_identity(
    catalog: &dyn Catalog,
    relation: &Relation,
) -> BottledWaterResult<RelationIdentity> {
    Ok(RelationIdentity {
        namespace: relation.namespace.clone(),
        name: relation.name.clone(),
        key: describe_key(catalog, relation)?,
    })
}

/// Write a key as a JSON array of escaped column names.
pub fn write_key(key: &[String], out: &mut JsonBuffer) -> BottledWaterResult<()> {
    out.push_byte(b'[');
    for (i, column) in key.iter().enumerate() {
        if i > 0 {
            out.push_byte(b',');
        }
        out.push_escaped(column)?;
    }
    out.push_byte(b']');
    Ok(())
}

fn find_primary(catalog: &dyn Catalog, relation: &Relation) -> BottledWaterResult<Option<IndexInfo>> {
    Ok(catalog
        .indexes(relation.oid)?
        .into_iter()
        .find(IndexInfo::is_usable_primary))
}

fn key_columns(relation: &Relation, index: &IndexInfo) -> Option<Vec<String>> {
    let names: Vec<String> = index
        .key_attnums
        .iter()
        .filter_map(|attnum| relation.descriptor.attribute(*attnum))
        .filter(|column| !column.dropped)
        .map(|column| column.name.clone())
        .collect();
    (!names.is_empty()).then_some(names)
}
