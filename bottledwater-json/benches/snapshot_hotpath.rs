use bottledwater_core::{ChangeEvent, RelationName, Row};
use bottledwater_json::{open_snapshot, ChangeEventEncoder, EncodeContext};
use bottledwater_test_utils::fixtures::{orders_catalog, orders_row};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;

const ROWS: i32 = 1_000;

fn bench_rows() -> Vec<Row> {
    (0..ROWS)
        .map(|id| orders_row(id, "1234.5678", Some("a \"quoted\" note\nwith a newline")))
        .collect()
}

fn bench_snapshot_stream(c: &mut Criterion) {
    let (catalog, _) = orders_catalog(bench_rows());
    let name = RelationName::qualified("public", "orders");

    c.bench_function("snapshot/stream_1000_rows", |b| {
        b.iter(|| {
            let ctx = EncodeContext::new("bench", Arc::new(catalog.clone()));
            let stream = open_snapshot(ctx, &name, true).expect("open snapshot");
            let bytes: usize = stream
                .map(|doc| doc.expect("encode row").len())
                .sum();
            black_box(bytes);
        });
    });
}

fn bench_change_encoder(c: &mut Criterion) {
    let (catalog, orders) = orders_catalog(Vec::new());
    let mut encoder = ChangeEventEncoder::new(EncodeContext::new("bench", Arc::new(catalog)));
    let event = ChangeEvent::update(
        7,
        orders,
        orders_row(1, "20.00", Some("after")),
        Some(orders_row(1, "10.00", Some("before"))),
    );

    c.bench_function("change/encode_update", |b| {
        b.iter(|| {
            let doc = encoder.encode(black_box(&event)).expect("encode update");
            black_box(doc.len());
        });
    });
}

criterion_group!(benches, bench_snapshot_stream, bench_change_encoder);
criterion_main!(benches);
