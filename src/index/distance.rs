//! Distance functions for vector comparison.
//!
//! Provides cosine, euclidean, and inner-product metrics plus the norm and
//! normalization helpers the codecs share. Kernels are plain scalar loops
//! chunked by 8 so LLVM can auto-vectorize them.

use crate::types::DistanceMetric;

/// Dispatch to the appropriate distance function based on the metric.
///
/// All distance functions return a *distance* (lower is closer) so that
/// callers can sort ascending and take the first `k` results.
#[inline]
pub fn compute_distance(a: &[f32], b: &[f32], metric: DistanceMetric) -> f32 {
    match metric {
        DistanceMetric::Cosine => cosine_distance(a, b),
        DistanceMetric::L2 => euclidean_distance(a, b),
        DistanceMetric::Ip => dot_product_distance(a, b),
    }
}

/// Map a metric distance onto the similarity score reported with search
/// results.
///
/// - cosine: `1 - distance` (the cosine similarity itself)
/// - l2: `1 / (1 + distance)`, in `(0, 1]`
/// - ip: `-distance` (the raw inner product)
#[inline]
pub fn similarity_from_distance(distance: f32, metric: DistanceMetric) -> f32 {
    match metric {
        DistanceMetric::Cosine => 1.0 - distance,
        DistanceMetric::L2 => 1.0 / (1.0 + distance.max(0.0)),
        DistanceMetric::Ip => -distance,
    }
}

/// Cosine distance: `1.0 - cosine_similarity(a, b)`.
///
/// Returns 0.0 for identical directions and 2.0 for opposite directions.
/// If either vector has zero magnitude, returns 1.0 (orthogonal).
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Cosine similarity clamped to `[-1, 1]`; 0.0 when either side is a zero
/// vector.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vector dimensions must match");

    let (dot, norm_a, norm_b) = cosine_components(a, b);
    cosine_from_components(dot, norm_a, norm_b)
}

/// Cosine similarity from a dot product and two *squared* norms.
#[inline]
pub fn cosine_from_components(dot: f32, norm_a_sq: f32, norm_b_sq: f32) -> f32 {
    let denom = (norm_a_sq * norm_b_sq).sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    // Clamp to [-1, 1] to handle floating-point drift.
    (dot / denom).clamp(-1.0, 1.0)
}

/// Euclidean distance `sqrt(sum((a_i - b_i)^2))`.
#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    squared_l2(a, b).sqrt()
}

/// Squared Euclidean distance: `sum((a_i - b_i)^2)`.
///
/// This is the quantity the codecs and k-means work in; it preserves
/// ordering without the sqrt.
#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vector dimensions must match");

    let mut sum: f32 = 0.0;

    let chunks = a.len() / 8;
    let remainder = a.len() % 8;

    for i in 0..chunks {
        let base = i * 8;
        let mut tmp = [0.0f32; 8];
        for j in 0..8 {
            let d = a[base + j] - b[base + j];
            tmp[j] = d * d;
        }
        for val in tmp {
            sum += val;
        }
    }

    let base = chunks * 8;
    for i in 0..remainder {
        let d = a[base + i] - b[base + i];
        sum += d * d;
    }

    sum
}

/// Dot-product distance: `-dot(a, b)`.
///
/// Negated so that higher similarity (larger dot product) yields a
/// smaller distance value, keeping the "lower is closer" invariant.
#[inline]
pub fn dot_product_distance(a: &[f32], b: &[f32]) -> f32 {
    -dot(a, b)
}

/// Inner product of two equal-length vectors.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vector dimensions must match");

    let mut sum: f32 = 0.0;

    let chunks = a.len() / 8;
    let remainder = a.len() % 8;

    for i in 0..chunks {
        let base = i * 8;
        let mut tmp = [0.0f32; 8];
        for j in 0..8 {
            tmp[j] = a[base + j] * b[base + j];
        }
        for val in tmp {
            sum += val;
        }
    }

    let base = chunks * 8;
    for i in 0..remainder {
        sum += a[base + i] * b[base + i];
    }

    sum
}

/// Compute (dot, ||a||^2, ||b||^2) in a single pass.
#[inline]
fn cosine_components(a: &[f32], b: &[f32]) -> (f32, f32, f32) {
    let mut dot: f32 = 0.0;
    let mut norm_a: f32 = 0.0;
    let mut norm_b: f32 = 0.0;

    let chunks = a.len() / 8;
    let remainder = a.len() % 8;

    for i in 0..chunks {
        let base = i * 8;
        let mut d = [0.0f32; 8];
        let mut na = [0.0f32; 8];
        let mut nb = [0.0f32; 8];
        for j in 0..8 {
            let ai = a[base + j];
            let bi = b[base + j];
            d[j] = ai * bi;
            na[j] = ai * ai;
            nb[j] = bi * bi;
        }
        for j in 0..8 {
            dot += d[j];
            norm_a += na[j];
            norm_b += nb[j];
        }
    }

    let base = chunks * 8;
    for i in 0..remainder {
        let ai = a[base + i];
        let bi = b[base + i];
        dot += ai * bi;
        norm_a += ai * ai;
        norm_b += bi * bi;
    }

    (dot, norm_a, norm_b)
}

/// Compute the L2 norm of a vector.
#[inline]
pub fn l2_norm(v: &[f32]) -> f32 {
    let mut sum: f32 = 0.0;
    for &x in v {
        sum += x * x;
    }
    sum.sqrt()
}

/// Normalize a vector in-place to unit length. Zero vectors are left as-is.
#[inline]
pub fn normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > f32::EPSILON {
        let inv = 1.0 / norm;
        for x in v.iter_mut() {
            *x *= inv;
        }
    }
}

/// Return a unit-length copy of `v`.
pub fn normalized(v: &[f32]) -> Vec<f32> {
    let mut out = v.to_vec();
    normalize(&mut out);
    out
}
