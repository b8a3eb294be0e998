//! Relation metadata as supplied by the catalog.

use crate::RowDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Catalog object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Oid(pub u32);

impl Oid {
    pub const INVALID: Oid = Oid(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of relation a catalog entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    Table,
    View,
    MaterializedView,
    ForeignTable,
    PartitionedTable,
}

impl RelationKind {
    pub fn label(self) -> &'static str {
        match self {
            RelationKind::Table => "table",
            RelationKind::View => "view",
            RelationKind::MaterializedView => "materialized view",
            RelationKind::ForeignTable => "foreign table",
            RelationKind::PartitionedTable => "partitioned table",
        }
    }
}

/// Durability class of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Persistence {
    Permanent,
    Unlogged,
    Temporary,
}

/// How the change-capture subsystem identifies rows of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplicaIdentity {
    /// Use the primary key, if any.
    Default,
    /// The relation explicitly has no identity key.
    Nothing,
    /// Whole-row identity. Key resolution still falls back to the primary key.
    Full,
    /// An explicitly designated index. `None` when the designation is unset.
    Index(Option<Oid>),
}

/// One index of a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub oid: Oid,
    pub name: String,
    /// 1-based attribute numbers of the indexed table columns, in index definition order.
    pub key_attnums: Vec<i16>,
    pub is_valid: bool,
    pub is_ready: bool,
    pub is_primary: bool,
}

impl IndexInfo {
    /// A valid, ready, non-primary index.
    pub fn new(oid: Oid, name: impl Into<String>, key_attnums: Vec<i16>) -> Self {
        Self {
            oid,
            name: name.into(),
            key_attnums,
            is_valid: true,
            is_ready: true,
            is_primary: false,
        }
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    /// Usable as a primary-key fallback.
    pub fn is_usable_primary(&self) -> bool {
        self.is_valid && self.is_ready && self.is_primary
    }
}

/// A relation as seen by the encoders.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub oid: Oid,
    pub name: String,
    pub namespace: String,
    pub kind: RelationKind,
    pub persistence: Persistence,
    pub replica_identity: ReplicaIdentity,
    pub descriptor: Arc<RowDescriptor>,
}

impl Relation {
    /// An ordinary permanent table with default replica identity.
    pub fn table(
        oid: Oid,
        namespace: impl Into<String>,
        name: impl Into<String>,
        descriptor: RowDescriptor,
    ) -> Self {
        Self {
            oid,
            name: name.into(),
            namespace: namespace.into(),
            kind: RelationKind::Table,
            persistence: Persistence::Permanent,
            replica_identity: ReplicaIdentity::Default,
            descriptor: Arc::new(descriptor),
        }
    }

    pub fn with_replica_identity(mut self, identity: ReplicaIdentity) -> Self {
        self.replica_identity = identity;
        self
    }

    pub fn with_kind(mut self, kind: RelationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_persistence(mut self, persistence: Persistence) -> Self {
        self.persistence = persistence;
        self
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

/// A relation reference by name, as callers of the SQL-level entry points pass it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationName {
    pub name: String,
    /// Resolved against the search path when absent.
    pub namespace: Option<String>,
}

impl RelationName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    pub fn qualified(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }
}

impl fmt::Display for RelationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}.{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Namespace, name and resolved identity key of a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationIdentity {
    pub namespace: String,
    pub name: String,
    /// Key column names in index order; `None` when the relation is unkeyed.
    pub key: Option<Vec<String>>,
}
