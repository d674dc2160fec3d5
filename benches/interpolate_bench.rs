//! Benchmarks for macro interpolation and wire decoding
//!
//! Run with: cargo bench

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use pgflux::convert::{oid, ColumnDescriptor, ConversionPipeline};
use pgflux::macros::{MacroEngine, SqlDialect, SqlMacroEngine};
use pgflux::query::{QueryModel, TimeRange};

const QUERY: &str = "SELECT $__timeGroupAlias(time, '5m', previous), avg(value) AS value \
    FROM metrics WHERE $__timeFilter(time) AND host = 'a' \
    GROUP BY 1 ORDER BY $__timeGroup(time, '5m'), 2";

fn range() -> TimeRange {
    TimeRange::new(
        Utc.with_ymd_and_hms(2018, 4, 12, 18, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2018, 4, 12, 19, 0, 0).unwrap(),
    )
}

fn bench_interpolate(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpolate");
    let range = range();

    for dialect in [SqlDialect::Postgres, SqlDialect::TimescaleDb] {
        let engine = SqlMacroEngine::new(dialect);
        let model = QueryModel::parse(&serde_json::json!({ "rawSql": QUERY })).unwrap();

        group.bench_function(format!("{:?}", dialect), |b| {
            b.iter(|| {
                let mut model = model.clone();
                engine.interpolate(&mut model, &range, black_box(QUERY)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let pipeline = ConversionPipeline::default();
    let columns = vec![
        ColumnDescriptor::binary("time", oid::TIMESTAMPTZ),
        ColumnDescriptor::binary("host", oid::TEXT),
        ColumnDescriptor::binary("value", oid::FLOAT8),
    ];

    for size in [100, 1000, 10000] {
        let rows: Vec<Vec<Option<Vec<u8>>>> = (0..size as i64)
            .map(|i| {
                vec![
                    Some((i * 1_000_000).to_be_bytes().to_vec()),
                    Some(b"host-a".to_vec()),
                    Some((i as f64).to_be_bytes().to_vec()),
                ]
            })
            .collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("rows_{}", size), |b| {
            b.iter(|| {
                for row in &rows {
                    black_box(pipeline.decode_row(row, &columns).unwrap());
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_interpolate, bench_decode);
criterion_main!(benches);
