//! End-to-end tests for the quantized store across all three codecs.

use quantmem::index::distance::normalized;
use quantmem::index::quantization::sq::{dequantize, quantize};
use quantmem::{
    DistanceMetric, Metadata, ProductConfig, QuantError, QuantizationType, QuantizedVectorStore,
    ScalarBits, StoreConfig, VectorEntry,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::json;

fn random_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect())
        .collect()
}

fn product_store(dim: usize, m: usize, k: usize) -> QuantizedVectorStore {
    let config = StoreConfig::new(dim, QuantizationType::Product)
        .with_product_config(ProductConfig::new(m, k).with_seed(42));
    QuantizedVectorStore::new(config).unwrap()
}

#[test]
fn test_eight_bit_roundtrip_error() {
    let v = [0.1, 0.5, 0.9, -0.3, 0.0];
    let q = quantize(&v, ScalarBits::Eight).unwrap();
    let back = dequantize(&q).unwrap();
    for (a, b) in v.iter().zip(back.iter()) {
        assert!((a - b).abs() < 0.01, "{a} vs {b}");
    }
}

#[test]
fn test_scalar_store_finds_inserted_vector() {
    let vectors: Vec<Vec<f32>> = random_vectors(3, 64, 7)
        .iter()
        .map(|v| normalized(v))
        .collect();
    let mut store =
        QuantizedVectorStore::new(StoreConfig::new(64, QuantizationType::Scalar8)).unwrap();
    for (i, v) in vectors.iter().enumerate() {
        store.insert(format!("v{}", i + 1), v, None).unwrap();
    }

    let results = store.search(&vectors[0], 3, None).unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].id, "v1");
    assert!(results[0].similarity > 0.9);
    assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[test]
fn test_four_bit_compresses_more_than_eight_bit() {
    let vectors = random_vectors(100, 64, 11);
    let mut s8 =
        QuantizedVectorStore::new(StoreConfig::new(64, QuantizationType::Scalar8)).unwrap();
    let mut s4 =
        QuantizedVectorStore::new(StoreConfig::new(64, QuantizationType::Scalar4)).unwrap();
    for (i, v) in vectors.iter().enumerate() {
        s8.insert(format!("v{i}"), v, None).unwrap();
        s4.insert(format!("v{i}"), v, None).unwrap();
    }

    let r8 = s8.stats().compression_ratio;
    let r4 = s4.stats().compression_ratio;
    assert!(r4 > r8);
    assert!((r8 - 4.0).abs() < 0.1);
    assert!((r4 - 8.0).abs() < 0.1);
}

#[test]
fn test_product_store_lifecycle() {
    let vectors = random_vectors(50, 64, 42);
    let mut store = product_store(64, 8, 16);

    assert!(!store.is_ready());
    let err = store.insert("early", &vectors[0], None).unwrap_err();
    assert!(matches!(err, QuantError::NotTrained));

    let report = store.train(&vectors).unwrap().unwrap();
    assert_eq!(report.subspaces.len(), 8);
    assert!(store.is_ready());
    store.insert("v0", &vectors[0], None).unwrap();
    assert_eq!(store.len(), 1);

    let stats = store.stats();
    assert_eq!(stats.bytes_per_vector, 8 + 4);
    let expected = (64.0 * 4.0) / (8.0 + 4.0);
    assert!((stats.compression_ratio - expected).abs() < 1e-4);
    // Centroids plus their cached squared norms, independent of entry count.
    assert_eq!(stats.overhead_bytes, (8 * 16 * 8 + 8 * 16) * 4);
}

#[test]
fn test_product_store_training_needs_enough_vectors() {
    let mut store = product_store(16, 4, 32);
    let err = store.train(&random_vectors(10, 16, 1)).unwrap_err();
    assert!(matches!(err, QuantError::Validation(_)));
    assert!(!store.is_ready());
}

#[test]
fn test_product_search_ranks_self_first() {
    let vectors = random_vectors(200, 16, 3);
    let mut store = product_store(16, 4, 32);
    store.train(&vectors).unwrap();
    for (i, v) in vectors.iter().enumerate().take(50) {
        store.insert(format!("v{i}"), v, None).unwrap();
    }

    let mut hits = 0;
    for (i, v) in vectors.iter().enumerate().take(50) {
        let results = store.search(v, 5, None).unwrap();
        if results.iter().any(|r| r.id == format!("v{i}")) {
            hits += 1;
        }
    }
    assert!(hits >= 40, "recall@5 too low: {hits}/50");
}

#[test]
fn test_retraining_reencodes_entries() {
    let vectors = random_vectors(100, 8, 5);
    let mut store = product_store(8, 2, 8);
    store.train(&vectors).unwrap();
    store.insert("a", &vectors[0], None).unwrap();

    let shifted: Vec<Vec<f32>> = vectors
        .iter()
        .map(|v| v.iter().map(|x| x + 5.0).collect())
        .collect();
    store.train(&shifted).unwrap();

    // "a" now decodes against the new codebook, near the shifted cloud.
    let back = store.get_vector("a").unwrap().unwrap();
    assert!(back.iter().all(|x| *x > 3.0));
}

#[test]
fn test_remove_is_idempotent() {
    let mut store =
        QuantizedVectorStore::new(StoreConfig::new(4, QuantizationType::Scalar8)).unwrap();
    for (i, v) in random_vectors(5, 4, 9).iter().enumerate() {
        store.insert(format!("v{i}"), v, None).unwrap();
    }
    assert!(store.remove("v2"));
    assert_eq!(store.len(), 4);
    assert!(!store.remove("v2"));
    assert_eq!(store.len(), 4);
    assert!(store.get_vector("v2").unwrap().is_none());

    let results = store.search(&[0.0; 4], 10, None).unwrap();
    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.id != "v2"));
}

#[test]
fn test_batch_insert_matches_single_inserts() {
    let vectors = random_vectors(30, 8, 21);
    let mut single =
        QuantizedVectorStore::new(StoreConfig::new(8, QuantizationType::Scalar8)).unwrap();
    let mut batch =
        QuantizedVectorStore::new(StoreConfig::new(8, QuantizationType::Scalar8)).unwrap();
    for (i, v) in vectors.iter().enumerate() {
        single.insert(format!("v{i}"), v, None).unwrap();
    }
    let entries = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| VectorEntry::new(format!("v{i}"), v.clone()))
        .collect();
    assert_eq!(batch.insert_batch(entries).unwrap(), 30);

    let q = &vectors[4];
    let a = single.search(q, 3, None).unwrap();
    let b = batch.search(q, 3, None).unwrap();
    assert_eq!(a[0].id, "v4");
    assert_eq!(b[0].id, "v4");
}

#[test]
fn test_batch_capacity_counts_new_ids_only() {
    let mut store = QuantizedVectorStore::new(
        StoreConfig::new(2, QuantizationType::Scalar8).with_max_vectors(2),
    )
    .unwrap();
    store.insert("a", &[0.0, 1.0], None).unwrap();
    let err = store
        .insert_batch(vec![
            VectorEntry::new("b", vec![1.0, 0.0]),
            VectorEntry::new("c", vec![1.0, 1.0]),
        ])
        .unwrap_err();
    assert!(matches!(err, QuantError::Capacity { max: 2 }));
    assert_eq!(store.len(), 1);

    store
        .insert_batch(vec![
            VectorEntry::new("a", vec![0.5, 0.5]),
            VectorEntry::new("b", vec![1.0, 0.0]),
        ])
        .unwrap();
    assert_eq!(store.len(), 2);
}

#[test]
fn test_metadata_is_returned_with_results() {
    let mut store = QuantizedVectorStore::new(
        StoreConfig::new(3, QuantizationType::Scalar4).with_metric(DistanceMetric::L2),
    )
    .unwrap();
    let mut meta = Metadata::new();
    meta.insert("kind".to_string(), json!("note"));
    store.insert("a", &[1.0, 2.0, 3.0], Some(meta.clone())).unwrap();
    store.insert("b", &[-1.0, 0.0, 1.0], None).unwrap();

    let results = store.search(&[1.0, 2.0, 3.0], 1, None).unwrap();
    assert_eq!(results[0].id, "a");
    assert_eq!(results[0].metadata.as_ref(), Some(&meta));
    assert_eq!(store.get_metadata("a"), Some(&meta));
    assert!(store.get_metadata("b").is_none());
}

#[test]
fn test_inner_product_prefers_larger_dot() {
    let mut store = QuantizedVectorStore::new(
        StoreConfig::new(2, QuantizationType::Scalar8).with_metric(DistanceMetric::Ip),
    )
    .unwrap();
    store.insert("small", &[0.1, 0.1], None).unwrap();
    store.insert("large", &[1.0, 1.0], None).unwrap();
    store.insert("opposite", &[-1.0, -1.0], None).unwrap();

    let results = store.search(&[1.0, 1.0], 3, None).unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["large", "small", "opposite"]);
    assert!(results[0].similarity > results[1].similarity);
}

#[test]
fn test_empty_store_search() {
    let mut store =
        QuantizedVectorStore::new(StoreConfig::new(4, QuantizationType::Scalar8)).unwrap();
    assert!(store.search(&[0.0; 4], 5, None).unwrap().is_empty());
    assert!(matches!(
        store.search(&[0.0; 3], 5, None),
        Err(QuantError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_metadata_of_any_shape_survives_export() {
    let mut store =
        QuantizedVectorStore::new(StoreConfig::new(2, QuantizationType::Scalar8)).unwrap();
    let meta = json!({
        "missing": null,
        "nested": {"tags": ["a", 1, false], "score": 0.5},
        "mixed": [1, "two", {"three": 3}]
    });
    let meta: Metadata = meta.as_object().unwrap().clone();
    store.insert("a", &[0.0, 1.0], Some(meta.clone())).unwrap();

    let restored = QuantizedVectorStore::import(&store.export().unwrap()).unwrap();
    assert_eq!(restored.get_metadata("a"), Some(&meta));
}

#[test]
fn test_training_keeps_staged_outliers_in_range() {
    let mut store =
        QuantizedVectorStore::new(StoreConfig::new(2, QuantizationType::Scalar8)).unwrap();
    store
        .insert_batch(vec![VectorEntry::new("far", vec![10.0, -10.0])])
        .unwrap();
    store
        .train(&[vec![0.0, 0.0], vec![1.0, 1.0]])
        .unwrap();
    assert!(!store.is_dirty());

    let back = store.get_vector("far").unwrap().unwrap();
    let step = 20.0 / 255.0;
    assert!((back[0] - 10.0).abs() <= step, "{back:?}");
    assert!((back[1] + 10.0).abs() <= step, "{back:?}");

    let hit = store.search(&[10.0, -10.0], 1, None).unwrap();
    assert_eq!(hit[0].id, "far");
}

fn max_reconstruction_error(store: &QuantizedVectorStore, vectors: &[Vec<f32>]) -> f32 {
    vectors
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let back = store.get_vector(&format!("v{i}")).unwrap().unwrap();
            v.iter()
                .zip(back.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0f32, f32::max)
        })
        .fold(0.0f32, f32::max)
}

#[test]
fn test_single_inserts_do_not_compound_error() {
    let vectors = random_vectors(300, 16, 31);
    let entries: Vec<VectorEntry> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| VectorEntry::new(format!("v{i}"), v.clone()))
        .collect();

    for qt in [QuantizationType::Scalar4, QuantizationType::Scalar8] {
        let mut batch = QuantizedVectorStore::new(StoreConfig::new(16, qt)).unwrap();
        batch.insert_batch(entries.clone()).unwrap();
        batch.flush().unwrap();

        let mut one_by_one = QuantizedVectorStore::new(StoreConfig::new(16, qt)).unwrap();
        let mut interleaved = QuantizedVectorStore::new(StoreConfig::new(16, qt)).unwrap();
        for (i, v) in vectors.iter().enumerate() {
            one_by_one.insert(format!("v{i}"), v, None).unwrap();
            interleaved.insert(format!("v{i}"), v, None).unwrap();
            // Searching forces every widening to be applied as it happens.
            interleaved.search(v, 1, None).unwrap();
        }
        one_by_one.flush().unwrap();

        let batch_err = max_reconstruction_error(&batch, &vectors);
        // Values lie in [-1, 1), so half a step bounds the batch error.
        let half_step = 2.0 / f32::from(qt.scalar_bits().unwrap().max_code()) / 2.0;
        assert!(batch_err <= half_step + 1e-5, "{qt}: batch {batch_err}");
        for store in [&one_by_one, &interleaved] {
            let err = max_reconstruction_error(store, &vectors);
            assert!((err - batch_err).abs() <= 1e-5, "{qt}: {err} vs batch {batch_err}");
        }
    }
}
