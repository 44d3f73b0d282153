//! k-means++ initialization and Lloyd's iteration for codebook training.
//!
//! Centroid storage is a single flat buffer reused across iterations. All
//! randomness comes from the caller's RNG, so a seeded generator makes
//! training reproducible.

use rand::Rng;
use tracing::{debug, warn};

use crate::error::{QuantError, Result};
use crate::index::distance::squared_l2;

/// Stopping rules for Lloyd's iterations.
#[derive(Debug, Clone, Copy)]
pub struct KMeansParams {
    /// Number of centroids to produce.
    pub k: usize,
    /// Upper bound on Lloyd iterations.
    pub max_iterations: usize,
    /// Stop when the relative change in inertia drops below this.
    pub convergence_threshold: f64,
}

/// Outcome of a k-means run.
#[derive(Debug, Clone)]
pub struct KMeansResult {
    /// `k * dim` centroid values, row-major.
    pub centroids: Vec<f32>,
    /// Lloyd iterations actually run.
    pub iterations: usize,
    /// Sum of squared distances from each point to its assigned centroid,
    /// measured in the final assignment pass.
    pub inertia: f64,
    /// Whether a convergence rule fired before the iteration cap.
    pub converged: bool,
}

impl KMeansResult {
    /// Centroid `c` as a slice of length `dim`.
    #[inline]
    pub fn centroid(&self, c: usize, dim: usize) -> &[f32] {
        &self.centroids[c * dim..(c + 1) * dim]
    }
}

/// Train `params.k` centroids from `vectors` (each of length `dim`).
///
/// Requires at least `k` points. Converges when no point changes cluster
/// or the relative inertia change falls below the threshold; otherwise
/// stops at `max_iterations`.
pub fn train_kmeans<R: Rng + ?Sized>(
    vectors: &[&[f32]],
    dim: usize,
    params: &KMeansParams,
    rng: &mut R,
) -> Result<KMeansResult> {
    let n = vectors.len();
    let k = params.k;

    if k == 0 {
        return Err(QuantError::Validation("k must be > 0".into()));
    }
    if n < k {
        return Err(QuantError::Validation(format!(
            "k-means needs at least {k} points, got {n}"
        )));
    }

    debug!(n = n, k = k, dim = dim, "starting k-means++ initialization");

    let mut centroids = kmeans_pp_init(vectors, dim, k, rng);

    let mut assignments = vec![usize::MAX; n];
    let mut counts = vec![0usize; k];
    let mut sums = vec![0.0f32; k * dim];
    let mut prev_inertia = f64::INFINITY;
    let mut inertia = 0.0f64;
    let mut iterations = 0usize;
    let mut converged = false;

    for iter in 0..params.max_iterations {
        iterations = iter + 1;

        // Assignment step. Ties go to the lower centroid index.
        let mut changed = 0usize;
        inertia = 0.0;
        for (i, vec) in vectors.iter().enumerate() {
            let (best_idx, best_dist) = nearest(vec, &centroids, dim);
            if assignments[i] != best_idx {
                assignments[i] = best_idx;
                changed += 1;
            }
            inertia += best_dist as f64;
        }

        // Update step.
        counts.iter_mut().for_each(|c| *c = 0);
        sums.iter_mut().for_each(|s| *s = 0.0);
        for (i, vec) in vectors.iter().enumerate() {
            let c = assignments[i];
            counts[c] += 1;
            for (s, &v) in sums[c * dim..(c + 1) * dim].iter_mut().zip(vec.iter()) {
                *s += v;
            }
        }
        for c in 0..k {
            if counts[c] == 0 {
                // Empty cluster: keep old centroid.
                continue;
            }
            let inv = 1.0 / counts[c] as f32;
            for d in 0..dim {
                centroids[c * dim + d] = sums[c * dim + d] * inv;
            }
        }

        let relative_change = if prev_inertia.is_finite() && prev_inertia > 0.0 {
            (prev_inertia - inertia).abs() / prev_inertia
        } else if prev_inertia.is_finite() {
            0.0
        } else {
            f64::INFINITY
        };

        debug!(
            iter = iterations,
            inertia = inertia,
            changed = changed,
            "k-means iteration complete"
        );

        if changed == 0 || relative_change < params.convergence_threshold {
            converged = true;
            break;
        }
        prev_inertia = inertia;
    }

    if !converged {
        warn!(
            max_iterations = params.max_iterations,
            inertia = inertia,
            "k-means did not converge within iteration limit, using current centroids"
        );
    }

    Ok(KMeansResult {
        centroids,
        iterations,
        inertia,
        converged,
    })
}

/// Index of the nearest centroid and its squared distance.
#[inline]
pub fn nearest(vector: &[f32], centroids: &[f32], dim: usize) -> (usize, f32) {
    let mut best_dist = f32::INFINITY;
    let mut best_idx = 0usize;
    for (c, centroid) in centroids.chunks_exact(dim.max(1)).enumerate() {
        let d = squared_l2(vector, &centroid[..dim]);
        if d < best_dist {
            best_dist = d;
            best_idx = c;
        }
    }
    (best_idx, best_dist)
}

/// k-means++ seeding: pick initial centroids with probability proportional
/// to squared distance from the nearest already-chosen centroid.
fn kmeans_pp_init<R: Rng + ?Sized>(
    vectors: &[&[f32]],
    dim: usize,
    k: usize,
    rng: &mut R,
) -> Vec<f32> {
    let n = vectors.len();
    let mut centroids: Vec<f32> = Vec::with_capacity(k * dim);

    let first_idx = rng.gen_range(0..n);
    centroids.extend_from_slice(vectors[first_idx]);

    let mut min_dists = vec![f32::INFINITY; n];

    for c in 1..k {
        let last = &centroids[(c - 1) * dim..c * dim];
        let mut total_dist: f64 = 0.0;
        for (i, vec) in vectors.iter().enumerate() {
            let d = squared_l2(vec, last);
            if d < min_dists[i] {
                min_dists[i] = d;
            }
            total_dist += min_dists[i] as f64;
        }

        if total_dist <= 0.0 {
            // All remaining points coincide with existing centroids.
            warn!(
                chosen = c,
                k = k,
                "all remaining distances are zero, duplicating last centroid"
            );
            while centroids.len() < k * dim {
                let start = centroids.len() - dim;
                centroids.extend_from_within(start..start + dim);
            }
            return centroids;
        }

        // Weighted random selection over points not already chosen.
        let threshold = rng.gen::<f64>() * total_dist;
        let mut cumulative: f64 = 0.0;
        let mut chosen = None;
        let mut last_positive = 0;
        for (i, &d) in min_dists.iter().enumerate() {
            if d <= 0.0 {
                continue;
            }
            last_positive = i;
            cumulative += d as f64;
            if cumulative >= threshold {
                chosen = Some(i);
                break;
            }
        }
        let chosen = chosen.unwrap_or(last_positive);

        centroids.extend_from_slice(vectors[chosen]);
    }

    debug_assert_eq!(centroids.len(), k * dim);
    centroids
}
