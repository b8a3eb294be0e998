//! In-memory catalog for tests, benchmarks and embedders without a database.

use crate::{Catalog, DefaultExpression, JsonCast, RowCursor};
use bottledwater_core::{
    BottledWaterResult, IndexInfo, LookupError, Oid, Relation, RelationName, Row,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct CatalogState {
    relations: BTreeMap<Oid, Arc<Relation>>,
    indexes: BTreeMap<Oid, (Oid, IndexInfo)>,
    defaults: HashMap<(Oid, i16), DefaultExpression>,
    casts: HashMap<String, Arc<dyn JsonCast>>,
    rows: HashMap<Oid, Vec<Row>>,
    children: HashMap<Oid, Vec<Oid>>,
    search_path: Vec<String>,
}

#[derive(Debug, Default)]
struct CursorStats {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// Thread-safe in-memory [`Catalog`].
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
    stats: Arc<CursorStats>,
}

impl InMemoryCatalog {
    /// Create an empty catalog whose search path is `public`.
    pub fn new() -> Self {
        let catalog = Self::default();
        if let Ok(mut state) = catalog.state.write() {
            state.search_path = vec!["public".to_string()];
        }
        catalog
    }

    fn read(&self) -> BottledWaterResult<RwLockReadGuard<'_, CatalogState>> {
        self.state
            .read()
            .map_err(|_| LookupError::LockPoisoned.into())
    }

    fn write(&self) -> BottledWaterResult<RwLockWriteGuard<'_, CatalogState>> {
        self.state
            .write()
            .map_err(|_| LookupError::LockPoisoned.into())
    }

    /// Register a relation, replacing any relation with the same oid.
    pub fn add_relation(&self, relation: Relation) -> BottledWaterResult<Arc<Relation>> {
        let relation = Arc::new(relation);
        self.write()?
            .relations
            .insert(relation.oid, Arc::clone(&relation));
        Ok(relation)
    }

    /// Register an index on `relation`.
    pub fn add_index(&self, relation: Oid, index: IndexInfo) -> BottledWaterResult<()> {
        self.write()?.indexes.insert(index.oid, (relation, index));
        Ok(())
    }

    /// Record a default expression for a column. `None` stores a record without source.
    pub fn set_default(
        &self,
        relation: Oid,
        attnum: i16,
        source: Option<&str>,
    ) -> BottledWaterResult<()> {
        self.write()?.defaults.insert(
            (relation, attnum),
            DefaultExpression {
                source: source.map(str::to_string),
            },
        );
        Ok(())
    }

    /// Register an explicit JSON cast for a type name.
    pub fn register_cast(
        &self,
        type_name: impl Into<String>,
        cast: Arc<dyn JsonCast>,
    ) -> BottledWaterResult<()> {
        self.write()?.casts.insert(type_name.into(), cast);
        Ok(())
    }

    /// Append rows to a relation's heap.
    pub fn insert_rows(
        &self,
        relation: Oid,
        rows: impl IntoIterator<Item = Row>,
    ) -> BottledWaterResult<()> {
        self.write()?
            .rows
            .entry(relation)
            .or_default()
            .extend(rows);
        Ok(())
    }

    /// Declare `child` as inheriting from `parent`.
    pub fn add_child(&self, parent: Oid, child: Oid) -> BottledWaterResult<()> {
        self.write()?.children.entry(parent).or_default().push(child);
        Ok(())
    }

    pub fn set_search_path(&self, namespaces: &[&str]) -> BottledWaterResult<()> {
        self.write()?.search_path = namespaces.iter().map(|ns| ns.to_string()).collect();
        Ok(())
    }

    /// Cursors opened and not yet closed.
    pub fn open_cursor_count(&self) -> usize {
        self.stats.opened.load(Ordering::SeqCst) - self.stats.closed.load(Ordering::SeqCst)
    }

    /// Cursors closed so far.
    pub fn closed_cursor_count(&self) -> usize {
        self.stats.closed.load(Ordering::SeqCst)
    }

    fn collect_rows(state: &CatalogState, relation: Oid, only: bool, width: usize, out: &mut Vec<Row>) {
        if let Some(rows) = state.rows.get(&relation) {
            // Child tables lead with the parent's columns; project onto the parent shape.
            out.extend(
                rows.iter()
                    .map(|row| row.values().iter().take(width).cloned().collect::<Row>()),
            );
        }
        if only {
            return;
        }
        if let Some(children) = state.children.get(&relation) {
            for child in children {
                Self::collect_rows(state, *child, false, width, out);
            }
        }
    }
}

impl Catalog for InMemoryCatalog {
    fn relation(&self, oid: Oid) -> BottledWaterResult<Arc<Relation>> {
        self.read()?
            .relations
            .get(&oid)
            .cloned()
            .ok_or_else(|| LookupError::RelationOidNotFound { oid: oid.0 }.into())
    }

    fn resolve(&self, name: &RelationName) -> BottledWaterResult<Oid> {
        let state = self.read()?;
        let find = |namespace: &str| {
            state
                .relations
                .values()
                .find(|rel| rel.namespace == namespace && rel.name == name.name)
                .map(|rel| rel.oid)
        };

        let found = match &name.namespace {
            Some(namespace) => {
                if !state.relations.values().any(|rel| &rel.namespace == namespace) {
                    return Err(LookupError::NamespaceNotFound {
                        namespace: namespace.clone(),
                    }
                    .into());
                }
                find(namespace.as_str())
            }
            None => state.search_path.iter().find_map(|ns| find(ns.as_str())),
        };

        found.ok_or_else(|| {
            LookupError::RelationNotFound {
                name: name.to_string(),
            }
            .into()
        })
    }

    fn indexes(&self, relation: Oid) -> BottledWaterResult<Vec<IndexInfo>> {
        Ok(self
            .read()?
            .indexes
            .values()
            .filter(|(owner, _)| *owner == relation)
            .map(|(_, index)| index.clone())
            .collect())
    }

    fn index(&self, oid: Oid) -> BottledWaterResult<IndexInfo> {
        self.read()?
            .indexes
            .get(&oid)
            .map(|(_, index)| index.clone())
            .ok_or_else(|| LookupError::IndexNotFound { oid: oid.0 }.into())
    }

    fn default_expression(
        &self,
        relation: Oid,
        attnum: i16,
    ) -> BottledWaterResult<Option<DefaultExpression>> {
        Ok(self.read()?.defaults.get(&(relation, attnum)).cloned())
    }

    fn json_cast(&self, type_name: &str) -> BottledWaterResult<Option<Arc<dyn JsonCast>>> {
        Ok(self.read()?.casts.get(type_name).cloned())
    }

    fn relations(&self) -> BottledWaterResult<Vec<Arc<Relation>>> {
        Ok(self.read()?.relations.values().cloned().collect())
    }

    fn open_cursor(&self, relation: Oid, only: bool) -> BottledWaterResult<Box<dyn RowCursor>> {
        let state = self.read()?;
        let rel = state
            .relations
            .get(&relation)
            .ok_or(LookupError::RelationOidNotFound { oid: relation.0 })?;

        let mut rows = Vec::new();
        Self::collect_rows(&state, relation, only, rel.descriptor.len(), &mut rows);

        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(relation = %rel.qualified_name(), rows = rows.len(), only, "cursor opened");

        Ok(Box::new(VecCursor {
            scanned: vec![relation],
            rows: rows.into_iter(),
            stats: Arc::clone(&self.stats),
            closed: false,
        }))
    }
}

/// Cursor over rows materialized at open time.
struct VecCursor {
    scanned: Vec<Oid>,
    rows: std::vec::IntoIter<Row>,
    stats: Arc<CursorStats>,
    closed: bool,
}

impl RowCursor for VecCursor {
    fn scanned_relations(&self) -> &[Oid] {
        &self.scanned
    }

    fn fetch(&mut self, max_rows: usize) -> BottledWaterResult<Vec<Row>> {
        Ok(self.rows.by_ref().take(max_rows).collect())
    }

    fn close(&mut self) -> BottledWaterResult<()> {
        if !self.closed {
            self.closed = true;
            self.stats.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bottledwater_core::{
        BottledWaterError, ColumnDescriptor, RowDescriptor, TypeDescriptor, Value,
    };

    fn make_orders() -> Relation {
        Relation::table(
            Oid(100),
            "public",
            "orders",
            RowDescriptor::new(vec![
                ColumnDescriptor::new("id", TypeDescriptor::int4()).not_null(),
                ColumnDescriptor::new("note", TypeDescriptor::text()),
            ]),
        )
    }

    #[test]
    fn test_resolve_uses_search_path() {
        let catalog = InMemoryCatalog::new();
        catalog.add_relation(make_orders()).unwrap();

        assert_eq!(catalog.resolve(&RelationName::new("orders")).unwrap(), Oid(100));
        assert_eq!(
            catalog
                .resolve(&RelationName::qualified("public", "orders"))
                .unwrap(),
            Oid(100)
        );
    }

    #[test]
    fn test_resolve_unknown_relation() {
        let catalog = InMemoryCatalog::new();
        catalog.add_relation(make_orders()).unwrap();

        let err = catalog.resolve(&RelationName::new("missing")).unwrap_err();
        assert!(matches!(
            err,
            BottledWaterError::Lookup(LookupError::RelationNotFound { .. })
        ));
        let err = catalog
            .resolve(&RelationName::qualified("nowhere", "orders"))
            .unwrap_err();
        assert!(matches!(
            err,
            BottledWaterError::Lookup(LookupError::NamespaceNotFound { .. })
        ));
    }

    #[test]
    fn test_indexes_are_scoped_to_relation() {
        let catalog = InMemoryCatalog::new();
        catalog
            .add_index(Oid(100), IndexInfo::new(Oid(201), "orders_pkey", vec![1]).primary())
            .unwrap();
        catalog
            .add_index(Oid(300), IndexInfo::new(Oid(301), "other_pkey", vec![1]).primary())
            .unwrap();

        let indexes = catalog.indexes(Oid(100)).unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].name, "orders_pkey");
        assert!(catalog.index(Oid(999)).is_err());
    }

    #[test]
    fn test_cursor_tracks_open_and_close() {
        let catalog = InMemoryCatalog::new();
        catalog.add_relation(make_orders()).unwrap();
        catalog
            .insert_rows(
                Oid(100),
                vec![
                    Row::new(vec![Value::Int(1), Value::Null]),
                    Row::new(vec![Value::Int(2), Value::text("x")]),
                ],
            )
            .unwrap();

        let mut cursor = catalog.open_cursor(Oid(100), false).unwrap();
        assert_eq!(catalog.open_cursor_count(), 1);
        assert_eq!(cursor.scanned_relations(), &[Oid(100)]);
        assert_eq!(cursor.fetch(1).unwrap().len(), 1);
        assert_eq!(cursor.fetch(5).unwrap().len(), 1);
        assert!(cursor.fetch(1).unwrap().is_empty());

        cursor.close().unwrap();
        cursor.close().unwrap();
        assert_eq!(catalog.open_cursor_count(), 0);
        assert_eq!(catalog.closed_cursor_count(), 1);
    }

    #[test]
    fn test_only_excludes_children() {
        let catalog = InMemoryCatalog::new();
        catalog.add_relation(make_orders()).unwrap();
        let mut child = make_orders();
        child.oid = Oid(101);
        child.name = "orders_2024".to_string();
        catalog.add_relation(child).unwrap();
        catalog.add_child(Oid(100), Oid(101)).unwrap();
        catalog
            .insert_rows(Oid(100), vec![Row::new(vec![Value::Int(1), Value::Null])])
            .unwrap();
        catalog
            .insert_rows(Oid(101), vec![Row::new(vec![Value::Int(2), Value::Null])])
            .unwrap();

        let mut all = catalog.open_cursor(Oid(100), false).unwrap();
        assert_eq!(all.fetch(10).unwrap().len(), 2);
        let mut only = catalog.open_cursor(Oid(100), true).unwrap();
        assert_eq!(only.fetch(10).unwrap().len(), 1);
    }

    #[test]
    fn test_default_records() {
        let catalog = InMemoryCatalog::new();
        catalog.set_default(Oid(100), 1, Some("nextval('s')")).unwrap();
        catalog.set_default(Oid(100), 2, None).unwrap();

        let def = catalog.default_expression(Oid(100), 1).unwrap().unwrap();
        assert_eq!(def.source.as_deref(), Some("nextval('s')"));
        assert_eq!(
            catalog.default_expression(Oid(100), 2).unwrap(),
            Some(DefaultExpression { source: None })
        );
        assert!(catalog.default_expression(Oid(100), 3).unwrap().is_none());
    }

    #[test]
    fn test_json_cast_lookup() {
        let catalog = InMemoryCatalog::new();
        let cast: Arc<dyn JsonCast> =
            Arc::new(|text: &str| -> BottledWaterResult<String> { Ok(format!("[{}]", text)) });
        catalog.register_cast("point", cast).unwrap();

        let found = catalog.json_cast("point").unwrap().unwrap();
        assert_eq!(found.to_json("1,2").unwrap(), "[1,2]");
        assert!(catalog.json_cast("inet").unwrap().is_none());
    }

    #[test]
    fn test_poisoned_lock_surfaces_on_cast_lookup() {
        let catalog = InMemoryCatalog::new();
        let holder = catalog.clone();
        let panicked = std::thread::spawn(move || {
            let _guard = holder.state.write().unwrap();
            panic!("writer died holding the catalog lock");
        })
        .join()
        .is_err();
        assert!(panicked);

        assert_eq!(
            catalog.json_cast("jsonb").err().unwrap(),
            BottledWaterError::from(LookupError::LockPoisoned)
        );
        assert!(catalog.relations().is_err());
    }
}
