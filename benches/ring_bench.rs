// In benches/ring_bench.rs

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ringwire::protocol::{decode_ring, encode_ring};
use ringwire::{AggFunc, Arena, Ring, Type, TypeKind, Vector};

// --- Data Generation ---

const ROWS: usize = 65536;
const GROUPS: usize = 1024;

fn generate_values(rng: &mut StdRng) -> Vector {
    let values: Vec<i64> = (0..ROWS).map(|_| rng.random_range(-1_000..1_000)).collect();
    let mut v = Vector::from_slice(&values);
    for row in (0..ROWS).step_by(17) {
        v.set_null(row);
    }
    v
}

fn grown_ring(func: AggFunc) -> Ring {
    let mut ring = Ring::new(func, Type::new(TypeKind::Int64)).unwrap();
    ring.grows(&Arena::unbounded(), GROUPS).unwrap();
    ring
}

// --- Benchmark Suite ---

fn bench_fill_paths(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let values = generate_values(&mut rng);
    let groups: Vec<u64> = (0..ROWS).map(|_| rng.random_range(0..GROUPS as u64)).collect();
    let mask = vec![1u8; ROWS];
    let zs = vec![1i64; ROWS];

    let mut group = c.benchmark_group("Ring Fill");
    group.throughput(criterion::Throughput::Elements(ROWS as u64));

    for func in [AggFunc::Sum, AggFunc::Min, AggFunc::Variance, AggFunc::ApproxCountDistinct] {
        group.bench_function(format!("batch_fill {}", func), |b| {
            b.iter_batched(
                || grown_ring(func),
                |mut ring| {
                    ring.batch_fill(0, &mask, &groups, &zs, black_box(&values)).unwrap();
                    ring
                },
                criterion::BatchSize::LargeInput,
            )
        });
    }

    group.bench_function("bulk_fill sum", |b| {
        b.iter_batched(
            || grown_ring(AggFunc::Sum),
            |mut ring| {
                ring.bulk_fill(0, &zs, black_box(&values)).unwrap();
                ring
            },
            criterion::BatchSize::LargeInput,
        )
    });

    group.finish();
}

fn bench_merge_and_wire(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let values = generate_values(&mut rng);
    let groups: Vec<u64> = (0..ROWS).map(|_| rng.random_range(0..GROUPS as u64)).collect();
    let mask = vec![1u8; ROWS];
    let zs = vec![1i64; ROWS];

    let mut partial = grown_ring(AggFunc::Sum);
    partial.batch_fill(0, &mask, &groups, &zs, &values).unwrap();
    let identity: Vec<u64> = (0..GROUPS as u64).collect();
    let merge_mask = vec![1u8; GROUPS];

    let mut encoded = Vec::new();
    encode_ring(&partial, &mut encoded).unwrap();

    let mut group = c.benchmark_group("Ring Merge");
    group.throughput(criterion::Throughput::Elements(GROUPS as u64));

    group.bench_function("batch_add sum", |b| {
        b.iter_batched(
            || grown_ring(AggFunc::Sum),
            |mut ring| {
                ring.batch_add(black_box(&partial), 0, &merge_mask, &identity).unwrap();
                ring
            },
            criterion::BatchSize::LargeInput,
        )
    });
    group.bench_function("encode sum", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(encoded.len());
            encode_ring(black_box(&partial), &mut out).unwrap();
            out
        })
    });
    group.bench_function("decode sum", |b| {
        b.iter(|| black_box(decode_ring(black_box(&encoded)).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_fill_paths, bench_merge_and_wire);
criterion_main!(benches);
