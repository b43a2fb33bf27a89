use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tripbench::{
    keys::sequential_key,
    query::{HEAVY_QUERIES, NORMAL_QUERIES},
    record::synthetic_trip,
    store::MemStore,
    writer::BatchWriter,
    Record, Snapshot,
};

const SNAPSHOT_ROWS: usize = 10_000;

fn trips(count: usize) -> Vec<Record> {
    let mut rng = fastrand::Rng::with_seed(22);
    (0..count).map(|i| synthetic_trip(&mut rng, i)).collect()
}

fn encoded(records: &[Record]) -> Vec<Vec<u8>> {
    records
        .iter()
        .map(|record| serde_json::to_vec(record).unwrap())
        .collect()
}

fn normal_queries(c: &mut Criterion) {
    let snapshot = Snapshot::from_records(trips(SNAPSHOT_ROWS));
    let mut group = c.benchmark_group("normal");

    for query in NORMAL_QUERIES {
        let mut rng = fastrand::Rng::with_seed(22);
        group.bench_with_input(
            BenchmarkId::from_parameter(query.query_type()),
            &query,
            |b, query| b.iter(|| black_box(query.execute(&snapshot, &mut rng))),
        );
    }
    group.finish();
}

fn heavy_queries(c: &mut Criterion) {
    let snapshot = Snapshot::from_records(trips(SNAPSHOT_ROWS));
    let mut group = c.benchmark_group("heavy");
    group.sample_size(10);

    for query in HEAVY_QUERIES {
        let mut rng = fastrand::Rng::with_seed(22);
        group.bench_with_input(
            BenchmarkId::from_parameter(query.query_type()),
            &query,
            |b, query| b.iter(|| black_box(query.execute(&snapshot, &mut rng))),
        );
    }
    group.finish();
}

fn batch_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("write");

    for batch in [1, 16, 128, 10_000] {
        let values = encoded(&trips(batch));
        group.bench_with_input(BenchmarkId::new("memory", batch), &values, |b, values| {
            let mut store = MemStore::new();
            let mut next = 0u64;
            b.iter(|| {
                let mut writer = BatchWriter::new(&mut store);
                for value in values {
                    writer.put(sequential_key(next), value.clone());
                    next += 1;
                }
                black_box(writer.flush())
            })
        });

        #[cfg(feature = "sled")]
        {
            let dir = tempfile::tempdir().unwrap();
            let mut store =
                tripbench::store::sled::SledStore::open(dir.path(), &Default::default()).unwrap();
            group.bench_with_input(BenchmarkId::new("sled", batch), &values, |b, values| {
                let mut next = 0u64;
                b.iter(|| {
                    let mut writer = BatchWriter::new(&mut store);
                    for value in values {
                        writer.put(sequential_key(next), value.clone());
                        next += 1;
                    }
                    black_box(writer.flush())
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, normal_queries, heavy_queries, batch_writes);
criterion_main!(benches);
