//! bottledwater Test Utilities
//!
//! Shared test infrastructure for the bottledwater workspace:
//! - Proptest generators for column types, descriptors, values and rows
//! - Fixtures for the relations the tests keep coming back to
//! - Catalog doubles whose cursors misbehave on purpose
//! - Assertions over encoded documents and error variants

// Re-export the in-memory catalog from its source crate
pub use bottledwater_catalog::InMemoryCatalog;

// Re-export core types for convenience
pub use bottledwater_core::{
    BottledWaterError, BottledWaterResult, ColumnDescriptor, ContractViolation, IndexInfo,
    LookupError, Oid, RangeError, Relation, ReplicaIdentity, Row, RowDescriptor, TypeDescriptor,
    TypeTag, UnsupportedInput, Value, DATE_INFINITY, DATE_NEG_INFINITY, TIMESTAMP_INFINITY, TIMESTAMP_NEG_INFINITY,
};

/// Install a test subscriber honouring `RUST_LOG`. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for descriptors, values and rows.

    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    // === Type Generators ===

    /// Generate one of the built-in scalar column types.
    pub fn arb_scalar_type() -> impl Strategy<Value = TypeDescriptor> {
        prop_oneof![
            Just(TypeDescriptor::boolean()),
            Just(TypeDescriptor::int4()),
            Just(TypeDescriptor::int8()),
            Just(TypeDescriptor::float8()),
            Just(TypeDescriptor::numeric()),
            Just(TypeDescriptor::date()),
            Just(TypeDescriptor::timestamp()),
            Just(TypeDescriptor::timestamptz()),
            Just(TypeDescriptor::text()),
            Just(TypeDescriptor::opaque("inet")),
        ]
    }

    /// Generate a scalar type, an array of one, or a composite.
    pub fn arb_column_type() -> impl Strategy<Value = TypeDescriptor> {
        prop_oneof![
            6 => arb_scalar_type(),
            2 => arb_scalar_type().prop_map(TypeDescriptor::array_of),
            1 => arb_composite_type(),
        ]
    }

    /// Generate a descriptor of 1..8 columns named `c0..`, some dropped.
    pub fn arb_row_descriptor() -> impl Strategy<Value = RowDescriptor> {
        prop::collection::vec(
            (arb_column_type(), prop::bool::weighted(0.25), any::<bool>()),
            1..8,
        )
        .prop_map(|columns| {
            columns
                .into_iter()
                .enumerate()
                .map(|(i, (ty, dropped, nullable))| {
                    let mut column = ColumnDescriptor::new(format!("c{}", i), ty);
                    column.nullable = nullable;
                    column.dropped = dropped;
                    column
                })
                .collect()
        })
    }

    /// Generate a composite type over scalar fields.
    pub fn arb_composite_type() -> impl Strategy<Value = TypeDescriptor> {
        prop::collection::vec(arb_scalar_type(), 1..4).prop_map(|fields| {
            let shape: RowDescriptor = fields
                .into_iter()
                .enumerate()
                .map(|(i, ty)| ColumnDescriptor::new(format!("f{}", i), ty))
                .collect();
            TypeDescriptor::composite("pair", Arc::new(shape))
        })
    }

    // === Value Generators ===

    /// Generate canonical decimal text, possibly wider than any native number.
    pub fn arb_decimal_text() -> impl Strategy<Value = String> {
        (
            any::<bool>(),
            "0|[1-9][0-9]{0,39}",
            proptest::option::of("[0-9]{1,20}"),
        )
            .prop_map(|(negative, int, frac)| {
                let sign = if negative && int != "0" { "-" } else { "" };
                match frac {
                    Some(frac) => format!("{}{}.{}", sign, int, frac),
                    None => format!("{}{}", sign, int),
                }
            })
    }

    /// Generate any float, the non-finite ones included.
    pub fn arb_float() -> impl Strategy<Value = f64> {
        prop_oneof![
            8 => any::<f64>(),
            1 => Just(f64::NAN),
            1 => Just(f64::INFINITY),
            1 => Just(f64::NEG_INFINITY),
        ]
    }

    /// Generate a day offset, sentinels included.
    pub fn arb_date_days() -> impl Strategy<Value = i32> {
        prop_oneof![
            8 => -700_000i32..700_000,
            1 => Just(DATE_INFINITY),
            1 => Just(DATE_NEG_INFINITY),
        ]
    }

    /// Generate a microsecond offset within a few centuries, sentinels included.
    pub fn arb_timestamp_micros() -> impl Strategy<Value = i64> {
        prop_oneof![
            8 => -10_000_000_000_000_000i64..10_000_000_000_000_000,
            1 => Just(TIMESTAMP_INFINITY),
            1 => Just(TIMESTAMP_NEG_INFINITY),
        ]
    }

    /// Generate a non-null payload matching `ty`.
    pub fn arb_payload(ty: &TypeDescriptor) -> BoxedStrategy<Value> {
        match &ty.tag {
            TypeTag::Bool => any::<bool>().prop_map(Value::Bool).boxed(),
            TypeTag::SmallInt => any::<i32>().prop_map(|n| Value::Int(n as i64)).boxed(),
            TypeTag::BigInt => any::<i64>().prop_map(Value::BigInt).boxed(),
            TypeTag::Float => arb_float().prop_map(Value::Float).boxed(),
            TypeTag::Real => any::<f32>().prop_map(|f| Value::Float(f64::from(f))).boxed(),
            TypeTag::Decimal => arb_decimal_text().prop_map(Value::Decimal).boxed(),
            TypeTag::Date => arb_date_days().prop_map(Value::Date).boxed(),
            TypeTag::Timestamp => arb_timestamp_micros().prop_map(Value::Timestamp).boxed(),
            TypeTag::TimestampTz => arb_timestamp_micros().prop_map(Value::TimestampTz).boxed(),
            TypeTag::Array(element) if matches!(element.tag, TypeTag::Array(_)) => {
                prop::collection::vec(arb_value(element), 0..4)
                    .prop_map(Value::Array)
                    .boxed()
            }
            TypeTag::Array(element) => prop_oneof![
                3 => prop::collection::vec(arb_value(element), 0..4).prop_map(Value::Array),
                1 => arb_matrix(element),
            ]
            .boxed(),
            TypeTag::Composite(shape) => arb_row(shape).prop_map(Value::Composite).boxed(),
            TypeTag::Opaque => any::<String>().prop_map(Value::Text).boxed(),
        }
    }

    /// Generate a rectangular two-dimensional array of `element` values.
    pub fn arb_matrix(element: &TypeDescriptor) -> BoxedStrategy<Value> {
        let element = element.clone();
        (1..4usize, 1..4usize)
            .prop_flat_map(move |(rows, columns)| {
                prop::collection::vec(prop::collection::vec(arb_value(&element), columns), rows)
            })
            .prop_map(|rows| Value::Array(rows.into_iter().map(Value::Array).collect()))
            .boxed()
    }

    /// Generate a value matching `ty`, null about one time in five.
    pub fn arb_value(ty: &TypeDescriptor) -> BoxedStrategy<Value> {
        prop_oneof![
            1 => Just(Value::Null),
            4 => arb_payload(ty),
        ]
        .boxed()
    }

    /// Generate a row matching `desc`, dropped slots included.
    pub fn arb_row(desc: &RowDescriptor) -> BoxedStrategy<Row> {
        desc.columns()
            .iter()
            .map(|column| arb_value(&column.type_desc))
            .collect::<Vec<_>>()
            .prop_map(Row::new)
            .boxed()
    }

    /// Generate a descriptor together with up to `max_rows` rows for it.
    pub fn arb_descriptor_with_rows(
        max_rows: usize,
    ) -> impl Strategy<Value = (RowDescriptor, Vec<Row>)> {
        arb_row_descriptor().prop_flat_map(move |desc| {
            let rows = prop::collection::vec(arb_row(&desc), 0..=max_rows);
            (Just(desc), rows)
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built relations and catalogs for common testing scenarios.

    use super::*;
    use bottledwater_catalog::JsonCast;
    use std::sync::Arc;

    pub const ORDERS_OID: Oid = Oid(16384);
    pub const ORDERS_PKEY_OID: Oid = Oid(16390);

    /// `orders(id int not null, amount numeric, note text)`.
    pub fn orders_descriptor() -> RowDescriptor {
        RowDescriptor::new(vec![
            ColumnDescriptor::new("id", TypeDescriptor::int4()).not_null(),
            ColumnDescriptor::new("amount", TypeDescriptor::numeric()),
            ColumnDescriptor::new("note", TypeDescriptor::text()),
        ])
    }

    pub fn orders_relation() -> Relation {
        Relation::table(ORDERS_OID, "public", "orders", orders_descriptor())
    }

    /// One `orders` row.
    pub fn orders_row(id: i32, amount: &str, note: Option<&str>) -> Row {
        Row::new(vec![
            Value::from(id),
            Value::decimal(amount),
            Value::from(note),
        ])
    }

    /// A catalog holding `public.orders` keyed on `id`, with `rows` in its heap.
    pub fn orders_catalog(rows: Vec<Row>) -> (InMemoryCatalog, Arc<Relation>) {
        let catalog = InMemoryCatalog::new();
        let relation = catalog
            .add_relation(orders_relation())
            .unwrap_or_else(|e| panic!("fixture catalog: {}", e));
        catalog
            .add_index(
                ORDERS_OID,
                IndexInfo::new(ORDERS_PKEY_OID, "orders_pkey", vec![1]).primary(),
            )
            .unwrap_or_else(|e| panic!("fixture catalog: {}", e));
        catalog
            .insert_rows(ORDERS_OID, rows)
            .unwrap_or_else(|e| panic!("fixture catalog: {}", e));
        (catalog, relation)
    }

    /// A catalog holding one relation `public.generated` over `desc`, unkeyed.
    pub fn catalog_for(desc: RowDescriptor, rows: Vec<Row>) -> (InMemoryCatalog, Arc<Relation>) {
        let catalog = InMemoryCatalog::new();
        let relation = catalog
            .add_relation(Relation::table(Oid(20000), "public", "generated", desc))
            .unwrap_or_else(|e| panic!("fixture catalog: {}", e));
        catalog
            .insert_rows(relation.oid, rows)
            .unwrap_or_else(|e| panic!("fixture catalog: {}", e));
        (catalog, relation)
    }

    /// A cast that passes already-JSON text through unchanged.
    pub fn passthrough_json_cast() -> Arc<dyn JsonCast> {
        Arc::new(|text: &str| -> BottledWaterResult<String> { Ok(text.to_string()) })
    }
}

// ============================================================================
// CATALOG DOUBLES
// ============================================================================

pub mod mocks {
    //! Catalog doubles for cursor contracts the in-memory catalog always keeps.

    use super::*;
    use bottledwater_catalog::{Catalog, DefaultExpression, JsonCast, RowCursor};
    use bottledwater_core::RelationName;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts cursors handed out and released.
    #[derive(Debug, Default)]
    pub struct CursorLedger {
        opened: AtomicUsize,
        closed: AtomicUsize,
    }

    impl CursorLedger {
        pub fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }

        pub fn closed(&self) -> usize {
            self.closed.load(Ordering::SeqCst)
        }

        /// Cursors opened and not yet released.
        pub fn open(&self) -> usize {
            self.opened().saturating_sub(self.closed())
        }
    }

    /// Serves metadata and rows from an [`InMemoryCatalog`], but its cursors
    /// can return more rows than asked for or report a different set of
    /// scanned relations.
    #[derive(Clone)]
    pub struct ScriptedCatalog {
        inner: InMemoryCatalog,
        rows_per_fetch: Option<usize>,
        scanned: Option<Vec<Oid>>,
        ledger: Arc<CursorLedger>,
    }

    impl ScriptedCatalog {
        /// A double that behaves like `inner` until scripted otherwise.
        pub fn new(inner: InMemoryCatalog) -> Self {
            Self {
                inner,
                rows_per_fetch: None,
                scanned: None,
                ledger: Arc::new(CursorLedger::default()),
            }
        }

        /// Every fetch returns up to `rows` rows, whatever the caller asked for.
        pub fn returning_batches_of(mut self, rows: usize) -> Self {
            self.rows_per_fetch = Some(rows);
            self
        }

        /// Cursors report exactly `oids` as their scanned relations.
        pub fn scanning(mut self, oids: impl IntoIterator<Item = Oid>) -> Self {
            self.scanned = Some(oids.into_iter().collect());
            self
        }

        pub fn ledger(&self) -> Arc<CursorLedger> {
            Arc::clone(&self.ledger)
        }
    }

    impl Catalog for ScriptedCatalog {
        fn relation(&self, oid: Oid) -> BottledWaterResult<Arc<Relation>> {
            self.inner.relation(oid)
        }

        fn resolve(&self, name: &RelationName) -> BottledWaterResult<Oid> {
            self.inner.resolve(name)
        }

        fn indexes(&self, relation: Oid) -> BottledWaterResult<Vec<IndexInfo>> {
            self.inner.indexes(relation)
        }

        fn index(&self, oid: Oid) -> BottledWaterResult<IndexInfo> {
            self.inner.index(oid)
        }

        fn default_expression(
            &self,
            relation: Oid,
            attnum: i16,
        ) -> BottledWaterResult<Option<DefaultExpression>> {
            self.inner.default_expression(relation, attnum)
        }

        fn json_cast(&self, type_name: &str) -> BottledWaterResult<Option<Arc<dyn JsonCast>>> {
            self.inner.json_cast(type_name)
        }

        fn relations(&self) -> BottledWaterResult<Vec<Arc<Relation>>> {
            self.inner.relations()
        }

        fn open_cursor(&self, relation: Oid, only: bool) -> BottledWaterResult<Box<dyn RowCursor>> {
            let mut source = self.inner.open_cursor(relation, only)?;
            let mut rows = Vec::new();
            loop {
                let batch = source.fetch(64)?;
                if batch.is_empty() {
                    break;
                }
                rows.extend(batch);
            }
            source.close()?;

            self.ledger.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedCursor {
                scanned: self.scanned.clone().unwrap_or_else(|| vec![relation]),
                rows: rows.into_iter(),
                rows_per_fetch: self.rows_per_fetch,
                ledger: Arc::clone(&self.ledger),
                closed: false,
            }))
        }
    }

    struct ScriptedCursor {
        scanned: Vec<Oid>,
        rows: std::vec::IntoIter<Row>,
        rows_per_fetch: Option<usize>,
        ledger: Arc<CursorLedger>,
        closed: bool,
    }

    impl RowCursor for ScriptedCursor {
        fn scanned_relations(&self) -> &[Oid] {
            &self.scanned
        }

        fn fetch(&mut self, max_rows: usize) -> BottledWaterResult<Vec<Row>> {
            let take = self.rows_per_fetch.unwrap_or(max_rows);
            Ok(self.rows.by_ref().take(take).collect())
        }

        fn close(&mut self) -> BottledWaterResult<()> {
            if !self.closed {
                self.closed = true;
                self.ledger.closed.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over encoded documents and error variants.

    use super::*;
    use serde_json::Value as Json;

    /// Parse a document, failing the test if it is not valid JSON.
    #[track_caller]
    pub fn parse_document(doc: &str) -> Json {
        match serde_json::from_str(doc) {
            Ok(json) => json,
            Err(e) => panic!("Expected valid JSON ({}), got: {}", e, doc),
        }
    }

    /// Assert a document is a JSON object with exactly `keys`, in that order.
    #[track_caller]
    pub fn assert_keys_in_order(doc: &str, keys: &[&str]) {
        let json = parse_document(doc);
        let Some(object) = json.as_object() else {
            panic!("Expected a JSON object, got: {}", doc);
        };
        let actual: Vec<&str> = object.keys().map(String::as_str).collect();
        assert_eq!(actual, keys, "Wrong fields in {}", doc);
    }

    /// Assert a BottledWaterResult is a ContractViolation.
    #[track_caller]
    pub fn assert_contract_violation<T: std::fmt::Debug>(result: &BottledWaterResult<T>) {
        match result {
            Err(BottledWaterError::ContractViolation(_)) => {}
            other => panic!("Expected ContractViolation, got: {:?}", other),
        }
    }

    /// Assert a BottledWaterResult is a RangeError.
    #[track_caller]
    pub fn assert_range_error<T: std::fmt::Debug>(result: &BottledWaterResult<T>) {
        match result {
            Err(BottledWaterError::Range(_)) => {}
            other => panic!("Expected RangeError, got: {:?}", other),
        }
    }

    /// Assert a BottledWaterResult is a LookupError.
    #[track_caller]
    pub fn assert_lookup_error<T: std::fmt::Debug>(result: &BottledWaterResult<T>) {
        match result {
            Err(BottledWaterError::Lookup(_)) => {}
            other => panic!("Expected LookupError, got: {:?}", other),
        }
    }

    /// Assert a BottledWaterResult is UnsupportedFeature with `message`.
    #[track_caller]
    pub fn assert_unsupported_feature<T: std::fmt::Debug>(
        result: &BottledWaterResult<T>,
        message: &str,
    ) {
        match result {
            Err(BottledWaterError::UnsupportedFeature { message: m }) => {
                assert_eq!(*m, message, "Wrong UnsupportedFeature message");
            }
            other => panic!("Expected UnsupportedFeature, got: {:?}", other),
        }
    }
}
