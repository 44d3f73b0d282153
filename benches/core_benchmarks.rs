//! Criterion micro-benchmarks for the quantization hot paths.
//!
//! Run all:     `cargo bench`
//! Run subset:  `cargo bench -- pq`
//! Save baseline: `cargo bench -- --save-baseline base`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;

use quantmem::index::distance::{cosine_distance, dot_product_distance, squared_l2};
use quantmem::index::quantization::sq::{ScalarBits, ScalarRanges};
use quantmem::{
    DistanceMetric, ProductCodec, ProductConfig, QuantizationType, QuantizedVectorStore,
    StoreConfig, VectorEntry,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn random_vectors(n: usize, dim: usize) -> Vec<Vec<f32>> {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect()
}

fn random_vector(dim: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

// ---------------------------------------------------------------------------
// 1. Distance benchmarks
// ---------------------------------------------------------------------------

fn bench_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance");

    for &dim in &[64, 384, 768, 1536] {
        let a = random_vector(dim);
        let b = random_vector(dim);

        group.throughput(Throughput::Elements(dim as u64));

        group.bench_with_input(BenchmarkId::new("squared_l2", dim), &dim, |bench, _| {
            bench.iter(|| squared_l2(black_box(&a), black_box(&b)));
        });

        group.bench_with_input(BenchmarkId::new("cosine", dim), &dim, |bench, _| {
            bench.iter(|| cosine_distance(black_box(&a), black_box(&b)));
        });

        group.bench_with_input(BenchmarkId::new("dot_product", dim), &dim, |bench, _| {
            bench.iter(|| dot_product_distance(black_box(&a), black_box(&b)));
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 2. Scalar quantization benchmarks
// ---------------------------------------------------------------------------

fn bench_scalar(c: &mut Criterion) {
    let mut group = c.benchmark_group("scalar");
    let dim = 384;

    let vectors = random_vectors(1000, dim);
    let vec_refs: Vec<&[f32]> = vectors.iter().map(|v| v.as_slice()).collect();
    let query = random_vector(dim);

    for bits in [ScalarBits::Eight, ScalarBits::Four] {
        let ranges = ScalarRanges::calibrate(&vec_refs, dim, bits);
        let encoded = ranges.encode(&vectors[0]);
        let label = format!("{}bit", bits.bits());

        group.bench_function(format!("encode_{label}_384d"), |bench| {
            bench.iter(|| ranges.encode(black_box(&vectors[0])));
        });

        group.bench_function(format!("decode_{label}_384d"), |bench| {
            bench.iter(|| ranges.decode(black_box(&encoded)));
        });

        group.bench_function(format!("asymmetric_l2_{label}_384d"), |bench| {
            bench.iter(|| ranges.asymmetric_l2_squared(black_box(&query), black_box(&encoded)));
        });
    }

    group.bench_function("calibrate_1k_384d", |bench| {
        bench.iter(|| ScalarRanges::calibrate(black_box(&vec_refs), dim, ScalarBits::Eight));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// 3. Product quantization benchmarks
// ---------------------------------------------------------------------------

fn bench_product(c: &mut Criterion) {
    let mut group = c.benchmark_group("pq");
    group.sample_size(10); // Training dominates; keep runs short.

    let dim = 128;
    let vectors = random_vectors(1000, dim);
    let config = ProductConfig::new(8, 64).with_max_iterations(10);

    group.bench_function("train_1k_128d_m8_k64", |bench| {
        bench.iter(|| {
            let mut codec = ProductCodec::new(dim, config.clone()).unwrap();
            codec.train(black_box(&vectors)).unwrap()
        });
    });

    let mut codec = ProductCodec::new(dim, config).unwrap();
    codec.train(&vectors).unwrap();
    let query = random_vector(dim);
    let encoded = codec.encode(&vectors[0]).unwrap();

    group.bench_function("encode_128d_m8", |bench| {
        bench.iter(|| codec.encode(black_box(&vectors[0])).unwrap());
    });

    group.bench_function("asymmetric_distance_m8", |bench| {
        bench.iter(|| {
            codec
                .asymmetric_distance(black_box(&query), black_box(&encoded))
                .unwrap()
        });
    });

    group.bench_function("build_tables_128d_m8", |bench| {
        bench.iter(|| codec.precompute_distance_tables(black_box(&query)).unwrap());
    });

    let tables = codec.precompute_distance_tables(&query).unwrap();
    group.bench_function("table_distance_m8", |bench| {
        bench.iter(|| {
            codec
                .distance_from_tables(black_box(&tables), black_box(&encoded))
                .unwrap()
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// 4. Store search benchmarks
// ---------------------------------------------------------------------------

fn bench_store_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_search");
    group.sample_size(20);

    let dim = 128;
    let n = 10_000;
    let vectors = random_vectors(n, dim);
    let entries: Vec<VectorEntry> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| VectorEntry::new(format!("v{i}"), v.clone()))
        .collect();
    let query = random_vector(dim);

    for qt in [QuantizationType::Scalar8, QuantizationType::Scalar4] {
        let mut store = QuantizedVectorStore::new(
            StoreConfig::new(dim, qt).with_metric(DistanceMetric::Cosine),
        )
        .unwrap();
        store.insert_batch(entries.clone()).unwrap();
        store.flush().unwrap();

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new(qt.as_str(), n), &n, |bench, _| {
            bench.iter(|| store.search_flushed(black_box(&query), 10, None).unwrap());
        });
    }

    let mut store = QuantizedVectorStore::new(
        StoreConfig::new(dim, QuantizationType::Product)
            .with_metric(DistanceMetric::L2)
            .with_product_config(ProductConfig::new(16, 64).with_max_iterations(10)),
    )
    .unwrap();
    store.train(&vectors[..2000]).unwrap();
    store.insert_batch(entries).unwrap();

    group.bench_with_input(BenchmarkId::new("product", n), &n, |bench, _| {
        bench.iter(|| store.search_flushed(black_box(&query), 10, None).unwrap());
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_distance,
    bench_scalar,
    bench_product,
    bench_store_search,
);
criterion_main!(benches);
